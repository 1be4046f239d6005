//! Arena-backed document tree.
//!
//! Every structural or attribute edit made through [`DOM`] queues
//! [`MutationRecord`]s for the observers registered on the affected part of
//! the tree. Records are handed out at the next
//! [`DOM::notify_mutation_observers`] checkpoint.

mod mutation;
mod printing;

pub use mutation::{
    MutationCallback, MutationKind, MutationObserverInit, MutationRecord, MutationSubscription,
    ObserverId,
};

use anyhow::{Error, anyhow};
use core::cell::RefCell;
use core::mem;
use indextree::{Arena, Node, NodeId};
use mutation::ObserverRegistry;
use smallvec::SmallVec;
use std::rc::Rc;

/// Node payload variants the tree distinguishes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NodeKind {
    #[default]
    Document,
    Element {
        tag: String,
    },
    Text {
        text: String,
    },
    Comment {
        text: String,
    },
}

/// Data stored in each arena slot.
#[derive(Debug, Clone, Default)]
pub struct DOMNode {
    pub kind: NodeKind,
    pub attrs: SmallVec<(String, String), 4>,
}

impl DOMNode {
    fn element(tag: &str) -> Self {
        Self {
            kind: NodeKind::Element {
                tag: tag.to_ascii_lowercase(),
            },
            attrs: SmallVec::new(),
        }
    }
}

/// A live document tree.
///
/// The tree is single-threaded: the observer registry is shared through
/// `Rc<RefCell<_>>` so subscriptions can cancel themselves on drop.
pub struct DOM {
    dom: Arena<DOMNode>,
    root: NodeId,
    observers: Rc<RefCell<ObserverRegistry>>,
}

impl Default for DOM {
    fn default() -> Self {
        Self::new()
    }
}

impl DOM {
    /// Create an empty document holding only the document node.
    pub fn new() -> Self {
        let mut dom = Arena::new();
        Self {
            root: dom.new_node(DOMNode::default()),
            dom,
            observers: Rc::new(RefCell::new(ObserverRegistry::default())),
        }
    }

    /// The document node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The first element child of the document node (`<html>` for parsed documents).
    pub fn document_element(&self) -> Option<NodeId> {
        self.root
            .children(&self.dom)
            .find(|child| self.is_element(*child))
    }

    // ------------------------------------------------------------------
    // Node creation. New nodes are detached and produce no records.
    // ------------------------------------------------------------------

    /// Create a detached element. The tag name is stored lowercased.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.dom.new_node(DOMNode::element(tag))
    }

    /// Create a detached element with initial attributes.
    pub fn create_element_with_attrs(&mut self, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let mut node = DOMNode::element(tag);
        for (name, value) in attrs {
            node.attrs
                .push(((*name).to_ascii_lowercase(), (*value).to_owned()));
        }
        self.dom.new_node(node)
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.dom.new_node(DOMNode {
            kind: NodeKind::Text {
                text: text.to_owned(),
            },
            attrs: SmallVec::new(),
        })
    }

    /// Create a detached comment node.
    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.dom.new_node(DOMNode {
            kind: NodeKind::Comment {
                text: text.to_owned(),
            },
            attrs: SmallVec::new(),
        })
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Borrow the payload of a node.
    pub fn node(&self, node: NodeId) -> Option<&DOMNode> {
        self.dom
            .get(node)
            .filter(|entry| !entry.is_removed())
            .map(Node::get)
    }

    /// The kind of a node, if it exists.
    pub fn kind(&self, node: NodeId) -> Option<&NodeKind> {
        self.node(node).map(|data| &data.kind)
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        matches!(self.kind(node), Some(NodeKind::Element { .. }))
    }

    /// Lowercased tag name for elements.
    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        match self.kind(node)? {
            NodeKind::Element { tag } => Some(tag.as_str()),
            _ => None,
        }
    }

    /// Attribute value lookup; attribute names are matched case-insensitively.
    pub fn get_attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.node(node)?
            .attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.get_attribute(node, name).is_some()
    }

    /// Whether the whitespace-separated `class` attribute contains `class_name`.
    pub fn has_class(&self, node: NodeId, class_name: &str) -> bool {
        self.get_attribute(node, "class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|token| token == class_name))
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.dom.get(node)?.parent()
    }

    /// Children of a node in tree order.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        if self.node(node).is_none() {
            return Vec::new();
        }
        node.children(&self.dom).collect()
    }

    /// All descendants of `node` in document (pre-)order, excluding `node` itself.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        if self.node(node).is_none() {
            return Vec::new();
        }
        node.descendants(&self.dom).skip(1).collect()
    }

    /// Whether `other` is `node` or one of its descendants.
    pub fn contains(&self, node: NodeId, other: NodeId) -> bool {
        self.node(other).is_some() && other.ancestors(&self.dom).any(|ancestor| ancestor == node)
    }

    /// Whether the node is connected to the document node.
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.contains(self.root, node)
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Append `child` as the last child of `parent`.
    ///
    /// # Errors
    /// Returns an error if either node is unknown, `parent` cannot have
    /// children, or `child` is an inclusive ancestor of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), Error> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` into `parent` before `reference`, or last when `reference` is `None`.
    ///
    /// An attached `child` is first removed from its current parent, which
    /// queues a removal record there.
    ///
    /// # Errors
    /// Returns an error on the same conditions as [`DOM::append_child`], or if
    /// `reference` is not a child of `parent`.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), Error> {
        self.ensure_pre_insert(parent, child, reference)?;
        let reference = if reference == Some(child) {
            self.dom.get(child).and_then(Node::next_sibling)
        } else {
            reference
        };

        if let Some(old_parent) = self.parent(child) {
            self.detach_with_record(old_parent, child);
        }

        match reference {
            Some(sibling) => sibling.checked_insert_before(child, &mut self.dom)?,
            None => parent.checked_append(child, &mut self.dom)?,
        }

        let previous_sibling = self.dom.get(child).and_then(Node::previous_sibling);
        let next_sibling = self.dom.get(child).and_then(Node::next_sibling);
        self.queue_record(MutationRecord {
            kind: MutationKind::ChildList,
            target: parent,
            added_nodes: vec![child],
            removed_nodes: Vec::new(),
            previous_sibling,
            next_sibling,
            attribute_name: None,
            old_value: None,
        });
        Ok(())
    }

    /// Remove `child` from `parent`. The child and its subtree stay in the
    /// arena as a detached subtree.
    ///
    /// # Errors
    /// Returns an error if `child` is not a child of `parent`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), Error> {
        if self.parent(child) != Some(parent) {
            return Err(anyhow!("{child:?} is not a child of {parent:?}"));
        }
        self.detach_with_record(parent, child);
        Ok(())
    }

    /// Remove a node from its parent. Removing a detached node is a no-op.
    pub fn remove(&mut self, node: NodeId) {
        if let Some(parent) = self.parent(node) {
            self.detach_with_record(parent, node);
        }
    }

    /// Set an attribute, replacing any previous value.
    ///
    /// # Errors
    /// Returns an error if `node` is not an element.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), Error> {
        let name = name.to_ascii_lowercase();
        let attrs = self.element_attrs_mut(node)?;
        let old_value = match attrs.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => Some(mem::replace(&mut entry.1, value.to_owned())),
            None => {
                attrs.push((name.clone(), value.to_owned()));
                None
            }
        };
        self.queue_attribute_record(node, name, old_value);
        Ok(())
    }

    /// Remove an attribute. Returns whether it was present; no record is
    /// queued when it was not.
    ///
    /// # Errors
    /// Returns an error if `node` is not an element.
    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<bool, Error> {
        let name = name.to_ascii_lowercase();
        let attrs = self.element_attrs_mut(node)?;
        let Some(index) = attrs.iter().position(|(key, _)| *key == name) else {
            return Ok(false);
        };
        let (_, old_value) = attrs.remove(index);
        self.queue_attribute_record(node, name, Some(old_value));
        Ok(true)
    }

    /// Replace all children of `node` with a single text node (none when
    /// `text` is empty). Queues one child-list record on `node`.
    ///
    /// # Errors
    /// Returns an error if `node` is unknown or cannot have children.
    pub fn set_text_content(&mut self, node: NodeId, text: &str) -> Result<(), Error> {
        self.ensure_container(node)?;
        let removed_nodes = self.children(node);
        for child in &removed_nodes {
            child.detach(&mut self.dom);
        }
        let mut added_nodes = Vec::new();
        if !text.is_empty() {
            let text_node = self.create_text(text);
            node.checked_append(text_node, &mut self.dom)?;
            added_nodes.push(text_node);
        }
        if removed_nodes.is_empty() && added_nodes.is_empty() {
            return Ok(());
        }
        self.queue_record(MutationRecord {
            kind: MutationKind::ChildList,
            target: node,
            added_nodes,
            removed_nodes,
            previous_sibling: None,
            next_sibling: None,
            attribute_name: None,
            old_value: None,
        });
        Ok(())
    }

    /// Attach a node without queueing records. Used while building trees
    /// from markup.
    pub(crate) fn attach_silently(&mut self, parent: NodeId, child: NodeId) -> Result<(), Error> {
        parent.checked_append(child, &mut self.dom)?;
        Ok(())
    }

    pub(crate) fn node_mut(&mut self, node: NodeId) -> Option<&mut DOMNode> {
        self.dom
            .get_mut(node)
            .filter(|entry| !entry.is_removed())
            .map(Node::get_mut)
    }

    fn element_attrs_mut(
        &mut self,
        node: NodeId,
    ) -> Result<&mut SmallVec<(String, String), 4>, Error> {
        match self.node_mut(node) {
            Some(DOMNode {
                kind: NodeKind::Element { .. },
                attrs,
            }) => Ok(attrs),
            Some(_) => Err(anyhow!("{node:?} is not an element")),
            None => Err(anyhow!("Unknown node {node:?}")),
        }
    }

    fn ensure_container(&self, node: NodeId) -> Result<(), Error> {
        match self.kind(node) {
            Some(NodeKind::Document | NodeKind::Element { .. }) => Ok(()),
            Some(_) => Err(anyhow!("{node:?} cannot have children")),
            None => Err(anyhow!("Unknown node {node:?}")),
        }
    }

    fn ensure_pre_insert(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), Error> {
        self.ensure_container(parent)?;
        match self.kind(child) {
            None => return Err(anyhow!("Unknown node {child:?}")),
            Some(NodeKind::Document) => {
                return Err(anyhow!("The document node cannot be inserted"));
            }
            Some(_) => {}
        }
        if self.contains(child, parent) {
            return Err(anyhow!("{child:?} is an inclusive ancestor of {parent:?}"));
        }
        if let Some(sibling) = reference {
            if self.parent(sibling) != Some(parent) {
                return Err(anyhow!("{sibling:?} is not a child of {parent:?}"));
            }
        }
        Ok(())
    }

    fn detach_with_record(&mut self, parent: NodeId, child: NodeId) {
        let previous_sibling = self.dom.get(child).and_then(Node::previous_sibling);
        let next_sibling = self.dom.get(child).and_then(Node::next_sibling);
        child.detach(&mut self.dom);
        self.queue_record(MutationRecord {
            kind: MutationKind::ChildList,
            target: parent,
            added_nodes: Vec::new(),
            removed_nodes: vec![child],
            previous_sibling,
            next_sibling,
            attribute_name: None,
            old_value: None,
        });
    }

    fn queue_attribute_record(&self, node: NodeId, name: String, old_value: Option<String>) {
        self.queue_record(MutationRecord {
            kind: MutationKind::Attributes,
            target: node,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
            previous_sibling: None,
            next_sibling: None,
            attribute_name: Some(name),
            old_value,
        });
    }

    /// Ancestors of `node`, starting with the node itself.
    fn inclusive_ancestors(&self, node: NodeId) -> Vec<NodeId> {
        if self.dom.get(node).is_none() {
            return Vec::new();
        }
        node.ancestors(&self.dom).collect()
    }
}
