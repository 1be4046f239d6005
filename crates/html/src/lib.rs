//! Live document tree for style tracking.
//!
//! [`dom::DOM`] is an arena-backed tree with a mutation-observer primitive:
//! edits queue records, and [`dom::DOM::notify_mutation_observers`] delivers
//! them in batches. [`parser`] fills the tree from markup.

#![allow(
    clippy::missing_docs_in_private_items,
    reason = "Internal implementation details don't need public documentation"
)]
#![allow(
    clippy::missing_inline_in_public_items,
    reason = "Inlining decisions left to compiler for this crate"
)]
#![allow(
    clippy::module_name_repetitions,
    reason = "DOMNode and MutationRecord read better than Node and Record"
)]

pub mod dom;
pub mod parser;

pub use dom::{
    DOM, DOMNode, MutationKind, MutationObserverInit, MutationRecord, MutationSubscription,
    NodeKind, ObserverId,
};
pub use indextree::NodeId;
