// src/document/mod.rs
//! Arena-backed document tree shared by every extractor.
//!
//! Nodes are allocated in preorder, so comparing two `NodeId`s compares their
//! document positions, and a node's subtree is the contiguous id range
//! `id..=last_descendant`. Parent links exist for upward lookups only.

pub mod html;
pub mod xml;

use std::collections::BTreeMap;
use std::path::Path;

use crate::utils::error::DocumentError;
use crate::utils::text::clean_text;

/// HTML attributes that hold whitespace separated token lists.
const MULTI_VALUED_ATTRS: &[&str] = &[
    "class",
    "rel",
    "rev",
    "headers",
    "accesskey",
    "accept-charset",
    "dropzone",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An attribute value as the parser saw it: either one string or a token list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Single(String),
    Multi(Vec<String>),
}

impl AttrValue {
    fn parse(name: &str, raw: String) -> Self {
        if MULTI_VALUED_ATTRS.contains(&name) {
            AttrValue::Multi(raw.split_whitespace().map(str::to_string).collect())
        } else {
            AttrValue::Single(raw)
        }
    }

    /// The value as it appeared in the markup (tokens re-joined with spaces).
    pub fn joined(&self) -> String {
        match self {
            AttrValue::Single(value) => value.clone(),
            AttrValue::Multi(values) => values.join(" "),
        }
    }

    pub fn contains_token(&self, token: &str) -> bool {
        match self {
            AttrValue::Single(value) => value.split_whitespace().any(|t| t == token),
            AttrValue::Multi(values) => values.iter().any(|t| t == token),
        }
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Document,
    Element {
        tag: String,
        attrs: BTreeMap<String, AttrValue>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    last_descendant: NodeId,
}

/// Read-only parsed document. Built once per input file by a loader.
#[derive(Debug, Clone)]
pub struct DocumentTree {
    nodes: Vec<NodeData>,
}

impl DocumentTree {
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.data(id).kind
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.data(id).kind {
            NodeKind::Element { tag, .. } => Some(tag.as_str()),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.data(id).kind, NodeKind::Element { .. })
    }

    pub fn attrs(&self, id: NodeId) -> Option<&BTreeMap<String, AttrValue>> {
        match &self.data(id).kind {
            NodeKind::Element { attrs, .. } => Some(attrs),
            _ => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&AttrValue> {
        self.attrs(id).and_then(|attrs| attrs.get(name))
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .map_or(false, |value| value.contains_token(class))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.data(id).children
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |child| self.is_element(*child))
    }

    /// Walks parent links upwards, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |current| self.parent(*current))
    }

    /// All nodes strictly below `id`, in document order.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> {
        let last = self.data(id).last_descendant.0;
        (id.0 + 1..=last).map(NodeId)
    }

    /// True when `node` is `ancestor` or lies inside its subtree.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        ancestor <= node && node <= self.data(ancestor).last_descendant
    }

    /// Concatenated text of every text node under `id`, untouched.
    pub fn raw_text(&self, id: NodeId) -> String {
        if let NodeKind::Text(text) = &self.data(id).kind {
            return text.clone();
        }
        let mut out = String::new();
        for node in self.descendants(id) {
            if let NodeKind::Text(text) = &self.data(node).kind {
                out.push_str(text);
            }
        }
        out
    }

    /// Cleaned text content of `id` (whitespace collapsed, trimmed).
    pub fn text(&self, id: NodeId) -> String {
        clean_text(&self.raw_text(id))
    }

    pub fn has_text(&self, id: NodeId) -> bool {
        if let NodeKind::Text(text) = &self.data(id).kind {
            return !text.trim().is_empty();
        }
        self.descendants(id).any(|node| match &self.data(node).kind {
            NodeKind::Text(text) => !text.trim().is_empty(),
            _ => false,
        })
    }

    /// Nearest ancestor-or-self element carrying `tag`, stopping at `bound`.
    pub fn closest_tag(&self, id: NodeId, tag: &str, bound: NodeId) -> Option<NodeId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .take_while(|node| self.contains(bound, *node))
            .find(|node| self.tag(*node).map_or(false, |t| t.eq_ignore_ascii_case(tag)))
    }
}

/// Builds a `DocumentTree` in preorder. Loaders drive it while walking their
/// own parser's tree.
#[derive(Debug)]
pub struct TreeBuilder {
    nodes: Vec<NodeData>,
    open: Vec<NodeId>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        let root = NodeData {
            kind: NodeKind::Document,
            parent: None,
            children: Vec::new(),
            last_descendant: NodeId(0),
        };
        Self {
            nodes: vec![root],
            open: vec![NodeId(0)],
        }
    }

    fn current(&self) -> NodeId {
        *self.open.last().unwrap_or(&NodeId(0))
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let parent = self.current();
        self.nodes.push(NodeData {
            kind,
            parent: Some(parent),
            children: Vec::new(),
            last_descendant: id,
        });
        self.nodes[parent.index()].children.push(id);
        id
    }

    pub fn open_element<I>(&mut self, tag: &str, attrs: I) -> NodeId
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let attrs = attrs
            .into_iter()
            .map(|(name, value)| {
                let parsed = AttrValue::parse(&name, value);
                (name, parsed)
            })
            .collect();
        let id = self.push(NodeKind::Element {
            tag: tag.to_string(),
            attrs,
        });
        self.open.push(id);
        id
    }

    pub fn close_element(&mut self) {
        if self.open.len() <= 1 {
            return;
        }
        if let Some(id) = self.open.pop() {
            self.nodes[id.index()].last_descendant = NodeId(self.nodes.len() as u32 - 1);
        }
    }

    /// Appends text, merging with an immediately preceding sibling text node.
    pub fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let parent = self.current();
        let last_index = self.nodes.len() - 1;
        if self.nodes[parent.index()].children.last() == Some(&NodeId(last_index as u32)) {
            if let NodeKind::Text(existing) = &mut self.nodes[last_index].kind {
                existing.push_str(text);
                return;
            }
        }
        self.push(NodeKind::Text(text.to_string()));
    }

    pub fn finish(mut self) -> DocumentTree {
        while self.open.len() > 1 {
            self.close_element();
        }
        self.nodes[0].last_descendant = NodeId(self.nodes.len() as u32 - 1);
        DocumentTree { nodes: self.nodes }
    }
}

/// Loads a document from disk, choosing the parser from the file extension.
pub fn load_document(path: &Path) -> Result<DocumentTree, DocumentError> {
    let content = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let is_xml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("xml") || ext.eq_ignore_ascii_case("nxml"));
    if is_xml {
        xml::parse_xml(&content, &path.display().to_string())
    } else {
        Ok(html::parse_html(&content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DocumentTree {
        let mut b = TreeBuilder::new();
        b.open_element("div", vec![("class".to_string(), "sec intro".to_string())]);
        b.open_element("h2", Vec::new());
        b.text("Intro");
        b.close_element();
        b.open_element("p", vec![("id".to_string(), "p1".to_string())]);
        b.text("Hello ");
        b.text("world");
        b.close_element();
        b.close_element();
        b.open_element("p", Vec::new());
        b.text("Tail");
        b.finish()
    }

    #[test]
    fn test_preorder_ids_and_containment() {
        let tree = sample();
        let div = tree.children(tree.root())[0];
        let h2 = tree.children(div)[0];
        let p = tree.children(div)[1];
        let tail = tree.children(tree.root())[1];
        assert!(div < h2 && h2 < p && p < tail);
        assert!(tree.contains(div, p));
        assert!(tree.contains(div, div));
        assert!(!tree.contains(div, tail));
        assert_eq!(tree.descendants(div).count(), 4);
        assert_eq!(tree.ancestors(p).collect::<Vec<_>>(), vec![div, tree.root()]);
    }

    #[test]
    fn test_attr_variants_and_text() {
        let tree = sample();
        let div = tree.children(tree.root())[0];
        let p = tree.children(div)[1];
        assert_eq!(
            tree.attr(div, "class"),
            Some(&AttrValue::Multi(vec!["sec".to_string(), "intro".to_string()]))
        );
        assert_eq!(tree.attr(p, "id"), Some(&AttrValue::Single("p1".to_string())));
        assert!(tree.has_class(div, "intro"));
        // adjacent text merged into one node
        assert_eq!(tree.children(p).len(), 1);
        assert_eq!(tree.text(div), "IntroHello world");
        assert_eq!(tree.text(tree.root()), "IntroHello worldTail");
    }
}
