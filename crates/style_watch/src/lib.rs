//! Change tracking for style resources in a live document.
//!
//! Pages add, remove and rewrite their own stylesheets long after load. This
//! crate turns the raw mutation stream of an [`html::DOM`] into one
//! [`ChangedStyles`] batch per delivery, split into created, updated and
//! removed style resources, without rescanning the whole document.
//!
//! # Example
//!
//! ```ignore
//! use html::DOM;
//! use style_watch::StyleWatcher;
//!
//! let mut dom = DOM::parse("<html><head></head><body></body></html>")?;
//! let mut watcher = StyleWatcher::default();
//! watcher.start(&dom, |_dom, changes| {
//!     log::info!("{} style change(s)", changes.len());
//!     Ok(())
//! })?;
//!
//! let body = dom.children(dom.document_element().unwrap())[1];
//! let style = dom.create_element("style");
//! dom.append_child(body, style)?;
//! dom.notify_mutation_observers()?; // callback sees `created: [style]`
//! ```

#![allow(
    clippy::missing_docs_in_private_items,
    reason = "Internal implementation details don't need public documentation"
)]
#![allow(
    clippy::module_name_repetitions,
    reason = "StyleWatcher and StyleClassifier are clearer than Watcher and Classifier"
)]
#![allow(clippy::missing_errors_doc, reason = "Internal crate")]

pub mod changes;
pub mod classifier;
pub mod config;
pub mod scanner;
pub mod watcher;

pub use changes::{ChangedStyles, collect_changes};
pub use classifier::{StyleClassifier, StyleSelector};
pub use config::WatchConfig;
pub use scanner::expand;
pub use watcher::StyleWatcher;
