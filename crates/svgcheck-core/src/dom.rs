//! Index-addressed document tree.
//!
//! Nodes live in a single arena owned by [`Document`]; parent and child links are [`NodeId`]s.
//! Removing a node only unlinks it, so ids handed out earlier stay valid for diagnostics.

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

pub const SVG_NS: &str = "http://www.w3.org/2000/svg";
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
pub const XINCLUDE_NS: &str = "http://www.w3.org/2001/XInclude";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Namespace URI plus local name. Prefixes are a serialization concern and are not part of
/// the identity of a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExpandedName {
    pub ns: Option<String>,
    pub local: String,
}

impl ExpandedName {
    pub fn new(ns: Option<&str>, local: &str) -> Self {
        Self {
            ns: ns.map(str::to_string),
            local: local.to_string(),
        }
    }

    pub fn local(local: &str) -> Self {
        Self::new(None, local)
    }

    pub fn is(&self, ns: Option<&str>, local: &str) -> bool {
        self.ns.as_deref() == ns && self.local == local
    }

    /// Name as an author would write it, using the conventional prefixes for the namespaces
    /// the profile knows about.
    pub fn display_name(&self) -> String {
        match self.ns.as_deref() {
            None | Some(SVG_NS) => self.local.clone(),
            Some(XLINK_NS) => format!("xlink:{}", self.local),
            Some(XML_NS) => format!("xml:{}", self.local),
            Some(other) => format!("{{{other}}}{}", self.local),
        }
    }
}

impl fmt::Display for ExpandedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    pub file: Arc<str>,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(file: Arc<str>, line: u32, column: u32) -> Self {
        Self { file, line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub prefix: Option<String>,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: ExpandedName,
    pub prefix: Option<String>,
    /// Namespace declarations made on this element (not the whole in-scope set).
    pub namespaces: Vec<Namespace>,
    pub attributes: IndexMap<ExpandedName, String>,
}

impl Element {
    pub fn new(name: ExpandedName) -> Self {
        Self {
            name,
            prefix: None,
            namespaces: Vec::new(),
            attributes: IndexMap::new(),
        }
    }

    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attributes
            .get(&ExpandedName::local(local))
            .map(String::as_str)
    }

    pub fn attr_ns(&self, ns: &str, local: &str) -> Option<&str> {
        self.attributes
            .get(&ExpandedName::new(Some(ns), local))
            .map(String::as_str)
    }

    /// `href` or `xlink:href`, whichever is present (plain `href` wins).
    pub fn href(&self) -> Option<&str> {
        self.attr("href").or_else(|| self.attr_ns(XLINK_NS, "href"))
    }

    pub fn set_attr(&mut self, name: ExpandedName, value: impl Into<String>) {
        self.attributes.insert(name, value.into());
    }

    pub fn remove_attr(&mut self, name: &ExpandedName) -> Option<String> {
        self.attributes.shift_remove(name)
    }

    pub fn is_svg(&self, local: &str) -> bool {
        self.name.is(Some(SVG_NS), local)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Synthetic container for the root element and any top-level comments / PIs.
    Document,
    Element(Element),
    Text(String),
    Comment(String),
    ProcessingInstruction { target: String, value: Option<String> },
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    location: Location,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    pub doctype: Option<String>,
}

impl Document {
    pub fn new(file: Arc<str>) -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
                location: Location::new(file, 1, 1),
            }],
            doctype: None,
        }
    }

    pub fn document_node(&self) -> NodeId {
        NodeId(0)
    }

    pub fn root_element(&self) -> Option<NodeId> {
        self.children(self.document_node())
            .iter()
            .copied()
            .find(|&id| self.element(id).is_some())
    }

    pub fn source_name(&self) -> &Arc<str> {
        &self.nodes[0].location.file
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.0].kind
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn location(&self, id: NodeId) -> &Location {
        &self.nodes[id.0].location
    }

    pub fn append(&mut self, parent: NodeId, kind: NodeKind, location: Location) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: Some(parent),
            children: Vec::new(),
            location,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Unlinks `id` from its parent. The node and its subtree stay in the arena.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.nodes[id.0].parent.take() else {
            return;
        };
        self.nodes[parent.0].children.retain(|&c| c != id);
    }

    /// Replaces `old` in its parent's child list with `new`, preserving position.
    pub fn replace_with(&mut self, old: NodeId, new: &[NodeId]) {
        let Some(parent) = self.nodes[old.0].parent.take() else {
            return;
        };
        for &n in new {
            self.detach(n);
            self.nodes[n.0].parent = Some(parent);
        }
        let siblings = &mut self.nodes[parent.0].children;
        if let Some(pos) = siblings.iter().position(|&c| c == old) {
            siblings.splice(pos..=pos, new.iter().copied());
        }
    }

    /// Deep-copies `src` from another document as a new detached subtree of `self`.
    pub fn import(&mut self, other: &Document, src: NodeId) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind: other.kind(src).clone(),
            parent: None,
            children: Vec::new(),
            location: other.location(src).clone(),
        });
        for &child in other.children(src) {
            let copy = self.import(other, child);
            self.nodes[copy.0].parent = Some(id);
            self.nodes[id.0].children.push(copy);
        }
        id
    }

    pub fn is_attached(&self, mut id: NodeId) -> bool {
        while let Some(p) = self.nodes[id.0].parent {
            id = p;
        }
        id == self.document_node()
    }

    /// Pre-order traversal of the subtree rooted at `id` (including `id`).
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }

    /// Resolves a namespace prefix for `uri` as declared on `id` or one of its ancestors.
    pub fn lookup_prefix(&self, id: NodeId, uri: &str) -> Option<Option<&str>> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .filter_map(|n| self.element(n))
            .flat_map(|el| el.namespaces.iter())
            .find(|ns| ns.uri == uri)
            .map(|ns| ns.prefix.as_deref())
    }

    /// Checks the parent/child link invariant over the attached tree.
    pub fn links_are_consistent(&self) -> bool {
        self.descendants(self.document_node()).into_iter().all(|id| {
            self.children(id)
                .iter()
                .all(|&c| self.nodes[c.0].parent == Some(id))
        })
    }
}
