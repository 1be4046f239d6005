use core::fmt;

use super::{DOM, DOMNode, NodeKind};
use indextree::NodeId;

use serde_json::{Map, Value, json};

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out
}

fn sorted_attrs(node: &DOMNode) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = node.attrs.iter().cloned().collect();
    pairs.sort_by(|left, right| left.0.cmp(&right.0));
    pairs
}

fn node_to_json(dom: &DOM, id: NodeId) -> Value {
    let Some(node) = dom.node(id) else {
        return Value::Null;
    };
    let children = || -> Vec<Value> {
        dom.children(id)
            .into_iter()
            .map(|child| node_to_json(dom, child))
            .filter(|value| !value.is_null())
            .collect()
    };
    match &node.kind {
        NodeKind::Document => json!({ "type": "document", "children": children() }),
        NodeKind::Element { tag } => {
            let mut attrs_obj = Map::new();
            for (key, value) in sorted_attrs(node) {
                attrs_obj.insert(key, Value::String(value));
            }
            json!({
                "type": "element",
                "tag": tag,
                "attrs": Value::Object(attrs_obj),
                "children": children(),
            })
        }
        NodeKind::Text { text } => json!({ "type": "text", "text": text }),
        NodeKind::Comment { text } => json!({ "type": "comment", "text": text }),
    }
}

fn write_indent(formatter: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        formatter.write_str("  ")?;
    }
    Ok(())
}

fn fmt_node(
    dom: &DOM,
    id: NodeId,
    formatter: &mut fmt::Formatter<'_>,
    depth: usize,
) -> fmt::Result {
    let Some(node) = dom.node(id) else {
        return Ok(());
    };
    write_indent(formatter, depth)?;
    match &node.kind {
        NodeKind::Document => writeln!(formatter, "#document")?,
        NodeKind::Element { tag } => {
            write!(formatter, "<{tag}")?;
            for (key, value) in sorted_attrs(node) {
                write!(formatter, " {key}=\"{}\"", escape_text(&value))?;
            }
            writeln!(formatter, ">")?;
        }
        NodeKind::Text { text } => writeln!(formatter, "\"{}\"", escape_text(text))?,
        NodeKind::Comment { text } => writeln!(formatter, "<!-- {} -->", escape_text(text))?,
    }
    for child in dom.children(id) {
        fmt_node(dom, child, formatter, depth + 1)?;
    }
    Ok(())
}

impl fmt::Debug for DOM {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_node(self, self.root, formatter, 0)
    }
}

impl DOM {
    /// Build a deterministic JSON representation of the subtree at `node`.
    /// Schema:
    /// - Document: { "type":"document", "children":[ ... ] }
    /// - Element: { "type":"element", "tag": "div", "attrs": {..}, "children":[ ... ] }
    /// - Text / Comment: { "type":"text", "text":"..." }
    pub fn to_json_value(&self, node: NodeId) -> Value {
        node_to_json(self, node)
    }

    /// Pretty JSON string of the whole document for snapshots and test comparisons.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string_pretty(&self.to_json_value(self.root))
            .unwrap_or_else(|_| String::from("{}"))
    }
}
