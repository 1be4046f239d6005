//! Deciding which nodes are manageable style resources.

use crate::config::WatchConfig;
use html::{DOM, NodeId};

/// Classifier seam between the watcher and whatever decides what a style
/// resource is.
pub trait StyleClassifier {
    /// Whether `node` is a style container or style reference worth tracking.
    fn is_manageable(&self, dom: &DOM, node: NodeId) -> bool;

    /// Candidate descendants of `root` in document order, excluding `root`.
    ///
    /// Results are still passed through [`StyleClassifier::is_manageable`],
    /// so implementations may over-approximate. The default returns every
    /// element descendant.
    fn query_descendants(&self, dom: &DOM, root: NodeId) -> Vec<NodeId> {
        dom.descendants(root)
            .into_iter()
            .filter(|node| dom.is_element(*node))
            .collect()
    }
}

/// The default classifier: `<style>` elements plus `<link>` elements that
/// reference a stylesheet.
///
/// A link is managed when its `rel` contains `stylesheet`, it
/// is not `disabled`, and (unless configured otherwise) it has an `href`.
/// Elements with an ignored class or an ignored `media` value are never
/// managed.
#[derive(Clone, Debug, Default)]
pub struct StyleSelector {
    config: WatchConfig,
}

impl StyleSelector {
    pub fn new(config: WatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    fn is_stylesheet_link(&self, dom: &DOM, node: NodeId) -> bool {
        let references_stylesheet = dom
            .get_attribute(node, "rel")
            .is_some_and(|rel| rel.to_ascii_lowercase().contains("stylesheet"));
        references_stylesheet
            && !dom.has_attribute(node, "disabled")
            && (!self.config.require_href
                || dom.get_attribute(node, "href").is_some_and(|href| !href.is_empty()))
    }

    fn is_excluded(&self, dom: &DOM, node: NodeId) -> bool {
        if self
            .config
            .ignored_classes
            .iter()
            .any(|class_name| dom.has_class(node, class_name))
        {
            return true;
        }
        dom.get_attribute(node, "media").is_some_and(|media| {
            let media = media.trim();
            self.config
                .ignored_media
                .iter()
                .any(|ignored| ignored.eq_ignore_ascii_case(media))
        })
    }
}

impl StyleClassifier for StyleSelector {
    fn is_manageable(&self, dom: &DOM, node: NodeId) -> bool {
        let kind_matches = match dom.tag_name(node) {
            Some("style") => true,
            Some("link") => self.is_stylesheet_link(dom, node),
            _ => false,
        };
        kind_matches && !self.is_excluded(dom, node)
    }

    fn query_descendants(&self, dom: &DOM, root: NodeId) -> Vec<NodeId> {
        dom.descendants(root)
            .into_iter()
            .filter(|node| matches!(dom.tag_name(*node), Some("style" | "link")))
            .collect()
    }
}
