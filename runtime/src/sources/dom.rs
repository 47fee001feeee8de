//! Owned element tree for isolated sub-application documents.
//!
//! Fetched HTML is parsed with `scraper` and immediately copied into an
//! index-addressed arena. The flattening pass replaces, removes, and rewrites
//! nodes mid-walk; an arena keeps those mutations well-defined because node
//! identity is an index, not a live DOM handle.

use scraper::Html;
use serde::{Deserialize, Serialize};
use url::Url;

/// Index of a node inside an [`ElementTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(usize);

/// What a node is.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Synthetic root wrapping the parsed fragment.
    Root,
    /// An element with its tag name and attributes in source order.
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    /// A text node.
    Text(String),
    /// A comment node.
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Detached document fragment owned by a single extraction pass.
#[derive(Debug, Clone)]
pub struct ElementTree {
    nodes: Vec<Node>,
}

/// Elements serialized without a closing tag.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text content is serialized verbatim.
const RAW_TEXT_TAGS: &[&str] = &["script", "style"];

impl ElementTree {
    /// Create an empty tree containing only the synthetic root.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Parse an HTML fragment into an owned tree.
    ///
    /// The fragment parser wraps content in a synthetic `<html>` element;
    /// that wrapper is skipped so the fragment's own top-level nodes become
    /// children of [`ElementTree::root`]. Doctypes and processing
    /// instructions are dropped.
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_fragment(html);
        let mut tree = Self::new();

        let mut stack: Vec<(_, NodeId)> = document
            .root_element()
            .children()
            .rev()
            .map(|child| (child, tree.root()))
            .collect();

        while let Some((node, parent)) = stack.pop() {
            match node.value() {
                scraper::Node::Element(element) => {
                    let attrs = element
                        .attrs()
                        .map(|(name, value)| (name.to_string(), value.to_string()))
                        .collect();
                    let id = tree.append_child(
                        parent,
                        NodeKind::Element {
                            tag: element.name().to_string(),
                            attrs,
                        },
                    );
                    for child in node.children().rev() {
                        stack.push((child, id));
                    }
                }
                scraper::Node::Text(text) => {
                    tree.append_child(parent, NodeKind::Text(text.text.to_string()));
                }
                scraper::Node::Comment(comment) => {
                    tree.append_child(parent, NodeKind::Comment(comment.comment.to_string()));
                }
                _ => {}
            }
        }

        tree
    }

    /// The synthetic root node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Node kind accessor.
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    /// Tag name if `id` is an element.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    /// Parent of `id`, `None` for the root and detached nodes.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Snapshot of the children of `id`.
    ///
    /// A copied list: callers iterate it while mutating the tree underneath.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes[id.0].children.clone()
    }

    /// Append a new node under `parent`.
    pub fn append_child(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Attribute value on an element node.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(attr, _)| attr == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    /// Whether an element carries the attribute at all.
    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        match &self.nodes[id.0].kind {
            NodeKind::Element { attrs, .. } => attrs.iter().any(|(attr, _)| attr == name),
            _ => false,
        }
    }

    /// Set (or add) an attribute on an element node.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id.0].kind {
            if let Some(slot) = attrs.iter_mut().find(|(attr, _)| attr == name) {
                slot.1 = value.to_string();
            } else {
                attrs.push((name.to_string(), value.to_string()));
            }
        }
    }

    /// Detach `id` from its parent. The node stays in the arena but is no
    /// longer reachable from the root.
    pub fn remove(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|child| *child != id);
        }
    }

    /// Turn `id` into an inert comment, dropping its subtree.
    ///
    /// The node keeps its index, so callers holding the id (placeholder
    /// bookkeeping) can later rewrite it again.
    pub fn replace_with_comment(&mut self, id: NodeId, text: &str) {
        for child in self.children(id) {
            self.nodes[child.0].parent = None;
        }
        self.nodes[id.0].children.clear();
        self.nodes[id.0].kind = NodeKind::Comment(text.to_string());
    }

    /// Rewrite `id` into an element with the given tag and no attributes.
    pub fn replace_with_element(&mut self, id: NodeId, tag: &str) {
        for child in self.children(id) {
            self.nodes[child.0].parent = None;
        }
        self.nodes[id.0].children.clear();
        self.nodes[id.0].kind = NodeKind::Element {
            tag: tag.to_string(),
            attrs: Vec::new(),
        };
    }

    /// Replace the children of `id` with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        for child in self.children(id) {
            self.nodes[child.0].parent = None;
        }
        self.nodes[id.0].children.clear();
        self.append_child(id, NodeKind::Text(text.to_string()));
    }

    /// Concatenated text of all descendants of `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        if let NodeKind::Text(text) = &self.nodes[id.0].kind {
            out.push_str(text);
        }
        for child in &self.nodes[id.0].children {
            self.collect_text(*child, out);
        }
    }

    /// First element with the given tag name, depth-first.
    pub fn first_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.find_by_tag(self.root(), tag)
    }

    fn find_by_tag(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        if self.tag(id) == Some(tag) {
            return Some(id);
        }
        for child in &self.nodes[id.0].children {
            if let Some(found) = self.find_by_tag(*child, tag) {
                return Some(found);
            }
        }
        None
    }

    /// All reachable elements with the given tag name, in document order.
    pub fn all_by_tag(&self, tag: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        self.collect_by_tag(self.root(), tag, &mut found);
        found
    }

    fn collect_by_tag(&self, id: NodeId, tag: &str, found: &mut Vec<NodeId>) {
        if self.tag(id) == Some(tag) {
            found.push(id);
        }
        for child in &self.nodes[id.0].children {
            self.collect_by_tag(*child, tag, found);
        }
    }

    /// Serialize the tree back to HTML text.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for child in &self.nodes[0].children {
            self.write_node(*child, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Root => {}
            NodeKind::Text(text) => escape_text(text, out),
            NodeKind::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
            NodeKind::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_attr(value, out);
                    out.push('"');
                }
                out.push('>');
                if VOID_TAGS.contains(&tag.as_str()) {
                    return;
                }
                if RAW_TEXT_TAGS.contains(&tag.as_str()) {
                    out.push_str(&self.text_content(id));
                } else {
                    for child in &self.nodes[id.0].children {
                        self.write_node(*child, out);
                    }
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

impl Default for ElementTree {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            _ => out.push(ch),
        }
    }
}

/// Resolve a possibly-relative path against the document base URL.
///
/// Already-absolute URLs (anything with a scheme, including `data:`) pass
/// through untouched. Unresolvable input is returned unchanged rather than
/// dropped.
pub fn complete_path(path: &str, base_url: &str) -> String {
    if path.is_empty() || Url::parse(path).is_ok() {
        return path.to_string();
    }
    match Url::parse(base_url).and_then(|base| base.join(path)) {
        Ok(url) => url.to_string(),
        Err(_) => path.to_string(),
    }
}
