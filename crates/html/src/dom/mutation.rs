//! Mutation observation for [`DOM`].
//!
//! Observers register a callback against a target node. Edits queue
//! [`MutationRecord`]s on every interested observer; nothing is delivered
//! until [`DOM::notify_mutation_observers`] runs, so a burst of edits between
//! two checkpoints reaches each observer as a single batch.

use super::DOM;
use anyhow::{Error, anyhow};
use core::cell::{Cell, RefCell};
use indextree::NodeId;
use log::trace;
use std::rc::{Rc, Weak};

/// Callback invoked with one observer's pending records at a checkpoint.
pub type MutationCallback = Box<dyn FnMut(&[MutationRecord], &DOM) -> Result<(), Error>>;

/// Identifier of a registered observer, unique per document.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ObserverId(pub u64);

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum MutationKind {
    /// Children were inserted into or removed from `target`.
    ChildList,
    /// An attribute of `target` changed.
    Attributes,
}

/// One observed change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutationRecord {
    pub kind: MutationKind,
    pub target: NodeId,
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
    pub previous_sibling: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    /// Lowercased name of the changed attribute, for `Attributes` records.
    pub attribute_name: Option<String>,
    /// Attribute value before the change, `None` if it was absent.
    pub old_value: Option<String>,
}

/// What an observer wants to hear about.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MutationObserverInit {
    pub child_list: bool,
    pub attributes: bool,
    /// Extend observation from the target to all of its descendants.
    pub subtree: bool,
    /// Restrict attribute records to these (lowercase) names.
    pub attribute_filter: Option<Vec<String>>,
}

impl MutationObserverInit {
    fn validate(&self) -> Result<(), Error> {
        if self.attribute_filter.is_some() && !self.attributes {
            return Err(anyhow!("attribute_filter requires attributes to be observed"));
        }
        if !self.child_list && !self.attributes {
            return Err(anyhow!("Observer must watch child_list or attributes"));
        }
        Ok(())
    }

    fn accepts(&self, record: &MutationRecord) -> bool {
        match record.kind {
            MutationKind::ChildList => self.child_list,
            MutationKind::Attributes => {
                self.attributes
                    && match (&self.attribute_filter, &record.attribute_name) {
                        (None, _) => true,
                        (Some(filter), Some(name)) => {
                            filter.iter().any(|allowed| allowed.eq_ignore_ascii_case(name))
                        }
                        (Some(_), None) => false,
                    }
            }
        }
    }
}

struct RegisteredObserver {
    id: ObserverId,
    target: NodeId,
    options: MutationObserverInit,
    callback: RefCell<MutationCallback>,
    records: RefCell<Vec<MutationRecord>>,
    active: Cell<bool>,
}

#[derive(Default)]
pub(super) struct ObserverRegistry {
    next_id: u64,
    observers: Vec<Rc<RegisteredObserver>>,
    delivering: bool,
}

impl ObserverRegistry {
    fn remove(&mut self, id: ObserverId) {
        self.observers.retain(|observer| observer.id != id);
    }
}

/// Live registration returned by [`DOM::observe`].
///
/// Dropping the subscription disconnects it.
pub struct MutationSubscription {
    id: ObserverId,
    registry: Weak<RefCell<ObserverRegistry>>,
    observer: Weak<RegisteredObserver>,
}

impl MutationSubscription {
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Whether the registration still receives records.
    pub fn is_active(&self) -> bool {
        self.observer
            .upgrade()
            .is_some_and(|observer| observer.active.get())
    }

    /// Drain the records queued for this observer without invoking its callback.
    pub fn take_records(&self) -> Vec<MutationRecord> {
        self.observer
            .upgrade()
            .map(|observer| observer.records.take())
            .unwrap_or_default()
    }

    /// Stop receiving records and drop any that are still queued. Idempotent.
    pub fn disconnect(&self) {
        if let Some(observer) = self.observer.upgrade() {
            if !observer.active.replace(false) {
                return;
            }
            observer.records.borrow_mut().clear();
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.borrow_mut().remove(self.id);
        }
        trace!("Disconnected mutation observer {:?}", self.id);
    }
}

impl Drop for MutationSubscription {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Clears the delivery flag when a checkpoint ends, including on error.
struct DeliveryGuard<'dom> {
    registry: &'dom RefCell<ObserverRegistry>,
}

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        self.registry.borrow_mut().delivering = false;
    }
}

impl DOM {
    /// Register `callback` for changes at `target` (and below it when
    /// `options.subtree` is set).
    ///
    /// # Errors
    /// Returns an error if `target` is unknown or `options` watches nothing.
    pub fn observe<F>(
        &self,
        target: NodeId,
        options: MutationObserverInit,
        callback: F,
    ) -> Result<MutationSubscription, Error>
    where
        F: FnMut(&[MutationRecord], &Self) -> Result<(), Error> + 'static,
    {
        options.validate()?;
        if self.node(target).is_none() {
            return Err(anyhow!("Cannot observe unknown node {target:?}"));
        }
        let MutationObserverInit {
            child_list,
            attributes,
            subtree,
            attribute_filter,
        } = options;
        let options = MutationObserverInit {
            child_list,
            attributes,
            subtree,
            attribute_filter: attribute_filter.map(|filter| {
                filter
                    .into_iter()
                    .map(|name| name.to_ascii_lowercase())
                    .collect()
            }),
        };

        let mut registry = self.observers.borrow_mut();
        let id = ObserverId(registry.next_id);
        registry.next_id += 1;
        let observer = Rc::new(RegisteredObserver {
            id,
            target,
            options,
            callback: RefCell::new(Box::new(callback)),
            records: RefCell::new(Vec::new()),
            active: Cell::new(true),
        });
        let subscription = MutationSubscription {
            id,
            registry: Rc::downgrade(&self.observers),
            observer: Rc::downgrade(&observer),
        };
        registry.observers.push(observer);
        trace!("Registered mutation observer {id:?} on {target:?}");
        Ok(subscription)
    }

    /// Whether any active observer has records waiting for the next checkpoint.
    pub fn has_pending_mutations(&self) -> bool {
        self.observers
            .borrow()
            .observers
            .iter()
            .any(|observer| observer.active.get() && !observer.records.borrow().is_empty())
    }

    /// Deliver queued records: each active observer with pending records gets
    /// exactly one callback, in registration order.
    ///
    /// Callbacks may register or disconnect observers. A nested call made
    /// from inside a callback returns immediately.
    ///
    /// # Errors
    /// Returns the first error produced by a callback. Observers after it keep
    /// their records for the next checkpoint.
    pub fn notify_mutation_observers(&self) -> Result<(), Error> {
        let snapshot: Vec<Rc<RegisteredObserver>> = {
            let mut registry = self.observers.borrow_mut();
            if registry.delivering {
                return Ok(());
            }
            registry.delivering = true;
            registry.observers.clone()
        };
        let _guard = DeliveryGuard {
            registry: &self.observers,
        };

        for observer in snapshot {
            if !observer.active.get() {
                continue;
            }
            let records = observer.records.take();
            if records.is_empty() {
                continue;
            }
            trace!(
                "Delivering {} mutation record(s) to observer {:?}",
                records.len(),
                observer.id
            );
            let mut callback = observer.callback.borrow_mut();
            (*callback)(&records, self)?;
        }
        Ok(())
    }

    /// Queue `record` on every observer interested in its target.
    pub(super) fn queue_record(&self, record: MutationRecord) {
        let ancestors = self.inclusive_ancestors(record.target);
        let registry = self.observers.borrow();
        for observer in &registry.observers {
            if !observer.active.get() || !observer.options.accepts(&record) {
                continue;
            }
            let interested = ancestors.iter().any(|node| {
                *node == observer.target && (*node == record.target || observer.options.subtree)
            });
            if interested {
                observer.records.borrow_mut().push(record.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Rc<RefCell<Vec<Vec<MutationRecord>>>>;

    fn recorder() -> (Log, impl FnMut(&[MutationRecord], &DOM) -> Result<(), Error> + 'static) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        (log, move |records: &[MutationRecord], _: &DOM| {
            sink.borrow_mut().push(records.to_vec());
            Ok(())
        })
    }

    fn document() -> (DOM, NodeId, NodeId) {
        let mut dom = DOM::new();
        let html = dom.create_element("html");
        let body = dom.create_element("body");
        let root = dom.root();
        dom.append_child(root, html).unwrap();
        dom.append_child(html, body).unwrap();
        (dom, html, body)
    }

    fn subtree_init() -> MutationObserverInit {
        MutationObserverInit {
            child_list: true,
            attributes: true,
            subtree: true,
            attribute_filter: Some(vec!["REL".to_owned()]),
        }
    }

    #[test]
    fn inserting_before_itself_still_queues_a_move() {
        let (mut dom, html, body) = document();
        let before = dom.create_element("div");
        let style = dom.create_element("style");
        let after = dom.create_element("div");
        for node in [before, style, after] {
            dom.append_child(body, node).unwrap();
        }
        let (log, callback) = recorder();
        let _subscription = dom.observe(html, subtree_init(), callback).unwrap();

        dom.insert_before(body, style, Some(style)).unwrap();
        dom.notify_mutation_observers().unwrap();
        assert_eq!(dom.children(body), vec![before, style, after]);
        let batches = log.borrow();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[0][0].removed_nodes, vec![style]);
        assert_eq!(batches[0][1].added_nodes, vec![style]);
        assert_eq!(batches[0][1].previous_sibling, Some(before));
        assert_eq!(batches[0][1].next_sibling, Some(after));
    }

    #[test]
    fn edits_coalesce_until_checkpoint() {
        let (mut dom, html, body) = document();
        let (log, callback) = recorder();
        let _subscription = dom.observe(html, subtree_init(), callback).unwrap();

        let style = dom.create_element("style");
        let link = dom.create_element("link");
        dom.append_child(body, style).unwrap();
        dom.append_child(body, link).unwrap();
        assert!(log.borrow().is_empty());
        assert!(dom.has_pending_mutations());

        dom.notify_mutation_observers().unwrap();
        let batches = log.borrow();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[0][0].added_nodes, vec![style]);
        assert_eq!(batches[0][1].added_nodes, vec![link]);
        assert_eq!(batches[0][1].previous_sibling, Some(style));
        drop(batches);
        assert!(!dom.has_pending_mutations());
    }

    #[test]
    fn attribute_filter_limits_records() {
        let (mut dom, html, body) = document();
        let link = dom.create_element("link");
        dom.append_child(body, link).unwrap();
        let (log, callback) = recorder();
        let _subscription = dom.observe(html, subtree_init(), callback).unwrap();

        dom.set_attribute(link, "href", "a.css").unwrap();
        dom.set_attribute(link, "rel", "stylesheet").unwrap();
        dom.set_attribute(link, "rel", "alternate stylesheet").unwrap();
        dom.notify_mutation_observers().unwrap();

        let batches = log.borrow();
        assert_eq!(batches.len(), 1);
        let records = &batches[0];
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|record| record.kind == MutationKind::Attributes));
        assert_eq!(records[0].attribute_name.as_deref(), Some("rel"));
        assert_eq!(records[0].old_value, None);
        assert_eq!(records[1].old_value.as_deref(), Some("stylesheet"));
    }

    #[test]
    fn without_subtree_only_direct_changes_are_seen() {
        let (mut dom, html, body) = document();
        let (log, callback) = recorder();
        let options = MutationObserverInit {
            child_list: true,
            ..MutationObserverInit::default()
        };
        let _subscription = dom.observe(html, options, callback).unwrap();

        let deep = dom.create_element("div");
        dom.append_child(body, deep).unwrap();
        dom.notify_mutation_observers().unwrap();
        assert!(log.borrow().is_empty());

        let head = dom.create_element("head");
        dom.insert_before(html, head, Some(body)).unwrap();
        dom.notify_mutation_observers().unwrap();
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn detached_edits_are_not_observed() {
        let (mut dom, html, body) = document();
        let (log, callback) = recorder();
        let _subscription = dom.observe(html, subtree_init(), callback).unwrap();

        let fragment = dom.create_element("div");
        let style = dom.create_element("style");
        dom.append_child(fragment, style).unwrap();
        dom.notify_mutation_observers().unwrap();
        assert!(log.borrow().is_empty());

        dom.append_child(body, fragment).unwrap();
        dom.notify_mutation_observers().unwrap();
        assert_eq!(log.borrow()[0][0].added_nodes, vec![fragment]);
    }

    #[test]
    fn moving_a_node_records_removal_then_insertion() {
        let (mut dom, html, body) = document();
        let head = dom.create_element("head");
        dom.insert_before(html, head, Some(body)).unwrap();
        let style = dom.create_element("style");
        dom.append_child(head, style).unwrap();

        let (log, callback) = recorder();
        let _subscription = dom.observe(html, subtree_init(), callback).unwrap();
        dom.append_child(body, style).unwrap();
        dom.notify_mutation_observers().unwrap();

        let batches = log.borrow();
        let records = &batches[0];
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].target, head);
        assert_eq!(records[0].removed_nodes, vec![style]);
        assert_eq!(records[1].target, body);
        assert_eq!(records[1].added_nodes, vec![style]);
    }

    #[test]
    fn disconnect_drops_pending_records() {
        let (mut dom, html, body) = document();
        let (log, callback) = recorder();
        let subscription = dom.observe(html, subtree_init(), callback).unwrap();
        let div = dom.create_element("div");
        dom.append_child(body, div).unwrap();
        subscription.disconnect();
        subscription.disconnect();
        assert!(!subscription.is_active());
        dom.notify_mutation_observers().unwrap();
        assert!(log.borrow().is_empty());
        assert!(subscription.take_records().is_empty());
    }

    #[test]
    fn dropping_subscription_disconnects() {
        let (mut dom, html, body) = document();
        let (log, callback) = recorder();
        let subscription = dom.observe(html, subtree_init(), callback).unwrap();
        drop(subscription);
        let div = dom.create_element("div");
        dom.append_child(body, div).unwrap();
        dom.notify_mutation_observers().unwrap();
        assert!(log.borrow().is_empty());
        assert!(!dom.has_pending_mutations());
    }

    #[test]
    fn take_records_empties_the_queue() {
        let (mut dom, html, body) = document();
        let (log, callback) = recorder();
        let subscription = dom.observe(html, subtree_init(), callback).unwrap();
        let div = dom.create_element("div");
        dom.append_child(body, div).unwrap();
        let taken = subscription.take_records();
        assert_eq!(taken.len(), 1);
        dom.notify_mutation_observers().unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn invalid_options_are_rejected() {
        let (dom, html, _) = document();
        let nothing = MutationObserverInit::default();
        assert!(dom.observe(html, nothing, |_, _| Ok(())).is_err());
        let filter_only = MutationObserverInit {
            child_list: true,
            attribute_filter: Some(vec!["rel".to_owned()]),
            ..MutationObserverInit::default()
        };
        assert!(dom.observe(html, filter_only, |_, _| Ok(())).is_err());
    }

    #[test]
    fn callback_errors_propagate() {
        let (mut dom, html, body) = document();
        let _subscription = dom
            .observe(html, subtree_init(), |_, _| Err(anyhow!("classifier failed")))
            .unwrap();
        let div = dom.create_element("div");
        dom.append_child(body, div).unwrap();
        let error = dom.notify_mutation_observers().unwrap_err();
        assert_eq!(error.to_string(), "classifier failed");
        // The failed delivery does not wedge later checkpoints.
        dom.notify_mutation_observers().unwrap();
    }

    #[test]
    fn callbacks_can_register_observers_during_delivery() {
        let (mut dom, html, body) = document();
        let (late_log, late_callback) = recorder();
        let late_slot: Rc<RefCell<Option<MutationSubscription>>> = Rc::new(RefCell::new(None));
        let pending_callback = RefCell::new(Some(late_callback));
        let slot = Rc::clone(&late_slot);
        let _first = dom
            .observe(html, subtree_init(), move |_, dom| {
                if let Some(callback) = pending_callback.borrow_mut().take() {
                    let html = dom.document_element().unwrap();
                    *slot.borrow_mut() = Some(dom.observe(html, subtree_init(), callback)?);
                }
                Ok(())
            })
            .unwrap();

        let first = dom.create_element("div");
        dom.append_child(body, first).unwrap();
        dom.notify_mutation_observers().unwrap();
        assert!(late_log.borrow().is_empty());

        let second = dom.create_element("div");
        dom.append_child(body, second).unwrap();
        dom.notify_mutation_observers().unwrap();
        assert_eq!(late_log.borrow().len(), 1);
        assert_eq!(late_log.borrow()[0][0].added_nodes, vec![second]);
    }
}
