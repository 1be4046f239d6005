//! The style change watcher.
//!
//! A [`StyleWatcher`] owns at most one mutation subscription on the
//! document element. Each checkpoint that has records for it becomes at most
//! one [`ChangedStyles`] callback; batches with nothing style-related in them
//! are dropped.

use crate::changes::{ChangedStyles, collect_changes};
use crate::classifier::{StyleClassifier, StyleSelector};
use crate::config::{DEFAULT_TRACKED_ATTRIBUTE, WatchConfig};
use anyhow::{Error, anyhow};
use core::mem;
use html::{DOM, MutationObserverInit, MutationSubscription};
use log::{debug, trace, warn};
use std::rc::Rc;

enum WatchState {
    Stopped,
    Watching(MutationSubscription),
}

/// Watches a document for created, updated and removed style resources.
pub struct StyleWatcher {
    classifier: Rc<dyn StyleClassifier>,
    tracked_attribute: String,
    state: WatchState,
}

impl Default for StyleWatcher {
    fn default() -> Self {
        Self::with_config(WatchConfig::default())
    }
}

impl StyleWatcher {
    /// A stopped watcher using `classifier` and the default tracked attribute.
    pub fn new<C>(classifier: C) -> Self
    where
        C: StyleClassifier + 'static,
    {
        Self {
            classifier: Rc::new(classifier),
            tracked_attribute: DEFAULT_TRACKED_ATTRIBUTE.to_owned(),
            state: WatchState::Stopped,
        }
    }

    /// A stopped watcher using [`StyleSelector`] configured by `config`.
    pub fn with_config(config: WatchConfig) -> Self {
        let tracked_attribute = config.tracked_attribute.clone();
        Self::new(StyleSelector::new(config)).with_tracked_attribute(&tracked_attribute)
    }

    /// Change the attribute whose edits count as in-place updates. Takes
    /// effect on the next [`StyleWatcher::start`].
    #[must_use]
    pub fn with_tracked_attribute(mut self, attribute: &str) -> Self {
        self.tracked_attribute = attribute.to_ascii_lowercase();
        self
    }

    pub fn tracked_attribute(&self) -> &str {
        &self.tracked_attribute
    }

    pub fn is_watching(&self) -> bool {
        matches!(self.state, WatchState::Watching(_))
    }

    /// Start watching `dom`, replacing any subscription this watcher holds.
    ///
    /// Only the latest `on_change` is ever called. It runs inside
    /// [`DOM::notify_mutation_observers`] and may call `start` or `stop`
    /// again; its errors propagate out of that checkpoint.
    ///
    /// # Errors
    /// Returns an error if the document has no document element. The
    /// watcher is stopped in that case.
    pub fn start<F>(&mut self, dom: &DOM, on_change: F) -> Result<(), Error>
    where
        F: FnMut(&DOM, ChangedStyles) -> Result<(), Error> + 'static,
    {
        self.stop();

        let Some(target) = dom.document_element() else {
            warn!("Style watcher not started: document has no document element");
            return Err(anyhow!("Document has no document element to watch"));
        };
        let options = MutationObserverInit {
            child_list: true,
            attributes: true,
            subtree: true,
            attribute_filter: Some(vec![self.tracked_attribute.clone()]),
        };

        let classifier = Rc::clone(&self.classifier);
        let mut on_change = on_change;
        let subscription = dom.observe(target, options, move |records, dom| {
            let Some(changes) = collect_changes(dom, classifier.as_ref(), records) else {
                trace!("No style changes in {} record(s)", records.len());
                return Ok(());
            };
            trace!(
                "Style changes: {} created, {} updated, {} removed",
                changes.created.len(),
                changes.updated.len(),
                changes.removed.len()
            );
            on_change(dom, changes)
        })?;

        debug!(
            "Watching style changes under {target:?} (tracked attribute `{}`)",
            self.tracked_attribute
        );
        self.state = WatchState::Watching(subscription);
        Ok(())
    }

    /// Cancel the active subscription, if any. Records queued for it are
    /// discarded.
    pub fn stop(&mut self) {
        if let WatchState::Watching(subscription) =
            mem::replace(&mut self.state, WatchState::Stopped)
        {
            subscription.disconnect();
            debug!("Stopped watching style changes");
        }
    }
}
