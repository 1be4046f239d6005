//! Folding a delivery of mutation records into one classified batch.

use crate::classifier::StyleClassifier;
use crate::scanner::expand;
use html::{DOM, MutationRecord, NodeId};

/// Style resources touched by one delivery, each list in discovery order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangedStyles {
    pub created: Vec<NodeId>,
    pub updated: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

impl ChangedStyles {
    /// Total number of entries across the three lists.
    pub fn len(&self) -> usize {
        self.created.len() + self.updated.len() + self.removed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Classify one delivery of records.
///
/// - `created`: added nodes of every record, expanded, in record order.
/// - `removed`: removed nodes of every record, expanded, in record order.
/// - `updated`: the target of every record whose target is itself
///   manageable. No dedupe across records.
///
/// Returns `None` when all three lists are empty.
pub fn collect_changes<C>(
    dom: &DOM,
    classifier: &C,
    records: &[MutationRecord],
) -> Option<ChangedStyles>
where
    C: StyleClassifier + ?Sized,
{
    let created = records
        .iter()
        .flat_map(|record| expand(dom, classifier, &record.added_nodes))
        .collect();
    let removed = records
        .iter()
        .flat_map(|record| expand(dom, classifier, &record.removed_nodes))
        .collect();
    let updated = records
        .iter()
        .map(|record| record.target)
        .filter(|target| classifier.is_manageable(dom, *target))
        .collect();

    let changes = ChangedStyles {
        created,
        updated,
        removed,
    };
    (!changes.is_empty()).then_some(changes)
}
