#![allow(dead_code)]
use anyhow::{Result, anyhow};
use core::cell::RefCell;
use html::{DOM, NodeId};
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use style_watch::ChangedStyles;

/// Returns the directory containing HTML fixtures for integration tests.
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Parse a fixture file into a fresh document.
pub fn load_fixture(name: &str) -> Result<DOM> {
    let path = fixtures_dir().join(name);
    let markup = fs::read_to_string(&path)
        .map_err(|e| anyhow!("Failed to read fixture {}: {}", path.display(), e))?;
    DOM::parse(&markup)
}

pub fn element_by_id(dom: &DOM, id: &str) -> Result<NodeId> {
    dom.descendants(dom.root())
        .into_iter()
        .find(|node| dom.get_attribute(*node, "id") == Some(id))
        .ok_or_else(|| anyhow!("No element with id `{id}`"))
}

fn child_with_tag(dom: &DOM, tag: &str) -> Result<NodeId> {
    let html = dom
        .document_element()
        .ok_or_else(|| anyhow!("Document has no document element"))?;
    dom.children(html)
        .into_iter()
        .find(|node| dom.tag_name(*node) == Some(tag))
        .ok_or_else(|| anyhow!("Document has no <{tag}>"))
}

pub fn head(dom: &DOM) -> Result<NodeId> {
    child_with_tag(dom, "head")
}

pub fn body(dom: &DOM) -> Result<NodeId> {
    child_with_tag(dom, "body")
}

/// Collects every batch handed to a watcher callback.
#[derive(Clone, Default)]
pub struct Recorder {
    batches: Rc<RefCell<Vec<ChangedStyles>>>,
}

impl Recorder {
    pub fn callback(&self) -> impl FnMut(&DOM, ChangedStyles) -> Result<()> + 'static {
        let batches = Rc::clone(&self.batches);
        move |_: &DOM, changes: ChangedStyles| {
            batches.borrow_mut().push(changes);
            Ok(())
        }
    }

    pub fn batches(&self) -> Vec<ChangedStyles> {
        self.batches.borrow().clone()
    }

    pub fn count(&self) -> usize {
        self.batches.borrow().len()
    }
}
