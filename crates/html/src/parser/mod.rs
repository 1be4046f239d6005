//! Markup parsing into [`DOM`] via html5ever.
//!
//! html5ever builds an `RcDom` first; the result is then copied into the
//! arena. Copied nodes never queue mutation records: documents are built
//! before anyone observes them, and fragments are built detached.

use crate::dom::{DOM, DOMNode, NodeKind};
use anyhow::{Error, anyhow};
use html5ever::tendril::TendrilSink as _;
use html5ever::{LocalName, Namespace, ParseOpts, QualName, parse_document, parse_fragment};
use indextree::NodeId;
use log::trace;
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

impl DOM {
    /// Parse a complete HTML document.
    ///
    /// # Errors
    /// Returns an error if html5ever fails to read the input.
    pub fn parse(markup: &str) -> Result<Self, Error> {
        let rcdom = parse_document(RcDom::default(), ParseOpts::default())
            .from_utf8()
            .read_from(&mut markup.as_bytes())?;
        let mut dom = Self::new();
        let root = dom.root();
        for child in rcdom.document.children.borrow().iter() {
            if let Some(node) = dom.convert_node(child)? {
                dom.attach_silently(root, node)?;
            }
        }
        trace!("Parsed document with {} top-level node(s)", dom.children(root).len());
        Ok(dom)
    }

    /// Parse `markup` as the contents of a `<body>` element.
    ///
    /// Returns the detached top-level nodes in source order, ready to be
    /// inserted with [`DOM::append_child`] or [`DOM::insert_before`].
    ///
    /// # Errors
    /// Returns an error if html5ever fails to read the input.
    pub fn parse_fragment(&mut self, markup: &str) -> Result<Vec<NodeId>, Error> {
        let context = QualName::new(
            None,
            Namespace::from(HTML_NAMESPACE),
            LocalName::from("body"),
        );
        let rcdom = parse_fragment(RcDom::default(), ParseOpts::default(), context, Vec::new())
            .from_utf8()
            .read_from(&mut markup.as_bytes())?;

        // The fragment parser wraps its output in a synthetic <html> element.
        let wrapper = rcdom
            .document
            .children
            .borrow()
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("Fragment parser produced no root"))?;
        let mut nodes = Vec::new();
        for child in wrapper.children.borrow().iter() {
            if let Some(node) = self.convert_node(child)? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    /// Copy an html5ever node and its subtree into the arena as a detached subtree.
    fn convert_node(&mut self, handle: &Handle) -> Result<Option<NodeId>, Error> {
        let node = match &handle.data {
            RcNodeData::Document
            | RcNodeData::Doctype { .. }
            | RcNodeData::ProcessingInstruction { .. } => return Ok(None),
            RcNodeData::Text { contents } => self.create_text(&contents.borrow()),
            RcNodeData::Comment { contents } => self.create_comment(contents),
            RcNodeData::Element { name, attrs, .. } => {
                let element = self.create_element(&name.local);
                if let Some(DOMNode {
                    kind: NodeKind::Element { .. },
                    attrs: element_attrs,
                }) = self.node_mut(element)
                {
                    for attr in attrs.borrow().iter() {
                        element_attrs.push((
                            attr.name.local.as_ref().to_ascii_lowercase(),
                            attr.value.to_string(),
                        ));
                    }
                }
                element
            }
        };
        for child in handle.children.borrow().iter() {
            if let Some(converted) = self.convert_node(child)? {
                self.attach_silently(node, converted)?;
            }
        }
        Ok(Some(node))
    }
}
