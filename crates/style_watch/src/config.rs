//! Configuration for style tracking.
//!
//! Values can be constructed programmatically or loaded from environment
//! variables.

use std::env;

/// Attribute whose changes mark a style reference as updated.
pub const DEFAULT_TRACKED_ATTRIBUTE: &str = "rel";

/// Settings shared by the watcher and the default classifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchConfig {
    /// The single attribute observed for in-place updates
    pub tracked_attribute: String,
    /// Elements carrying any of these classes are never managed
    pub ignored_classes: Vec<String>,
    /// Elements whose `media` attribute equals one of these are never managed
    pub ignored_media: Vec<String>,
    /// Whether a `<link>` needs an `href` to be managed
    pub require_href: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            tracked_attribute: DEFAULT_TRACKED_ATTRIBUTE.to_owned(),
            ignored_classes: Vec::new(),
            ignored_media: vec!["print".to_owned()],
            require_href: true,
        }
    }
}

impl WatchConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `STYLE_WATCH_ATTRIBUTE`: tracked attribute name (default: `rel`)
    /// - `STYLE_WATCH_IGNORED_CLASSES`: comma-separated class names (default: none)
    /// - `STYLE_WATCH_IGNORED_MEDIA`: comma-separated media types (default: `print`)
    /// - `STYLE_WATCH_REQUIRE_HREF`: set to "0" to manage links without `href`
    #[inline]
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup, falling back to
    /// defaults for missing or empty values.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let tracked_attribute = lookup("STYLE_WATCH_ATTRIBUTE")
            .map(|value| value.trim().to_ascii_lowercase())
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.tracked_attribute);
        let ignored_classes = lookup("STYLE_WATCH_IGNORED_CLASSES")
            .map(|value| split_list(&value))
            .unwrap_or(defaults.ignored_classes);
        let ignored_media = lookup("STYLE_WATCH_IGNORED_MEDIA")
            .map(|value| {
                split_list(&value)
                    .into_iter()
                    .map(|media| media.to_ascii_lowercase())
                    .collect()
            })
            .unwrap_or(defaults.ignored_media);
        let require_href = lookup("STYLE_WATCH_REQUIRE_HREF")
            .map_or(defaults.require_href, |value| value.trim() != "0");
        Self {
            tracked_attribute,
            ignored_classes,
            ignored_media,
            require_href,
        }
    }

    /// Replace the tracked attribute, keeping everything else.
    #[must_use]
    pub fn with_tracked_attribute(mut self, attribute: &str) -> Self {
        self.tracked_attribute = attribute.to_ascii_lowercase();
        self
    }

    /// Add a class that excludes elements from management.
    #[must_use]
    pub fn with_ignored_class(mut self, class_name: &str) -> Self {
        self.ignored_classes.push(class_name.to_owned());
        self
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}
