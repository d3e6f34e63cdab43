//! Arena-backed document tree.
//!
//! Nodes live in a flat `Vec` and are addressed by [`NodeId`]. Detaching a
//! node unlinks it from its parent but keeps it in the arena, so ids held by
//! callers stay valid for the lifetime of the document. A [`Document`] is
//! `Clone`, which is how base snapshots are taken for replay-from-clean.

use super::style;

/// Index of a node inside its owning [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// An element: lower-cased tag name plus attributes in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    attrs: Vec<(String, String)>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attrs: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn attrs(&self) -> &[(String, String)] {
        &self.attrs
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .attrs
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name.to_ascii_lowercase(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let pos = self
            .attrs
            .iter()
            .position(|(key, _)| key.eq_ignore_ascii_case(name))?;
        Some(self.attrs.remove(pos).1)
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attr("class")
            .map(|value| value.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, class_name: &str) -> bool {
        self.classes().iter().any(|c| *c == class_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// A headless HTML document.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Document,
            }],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The first `<body>` element, if the document has one.
    pub fn body(&self) -> Option<NodeId> {
        self.elements_under(self.root)
            .into_iter()
            .find(|id| self.tag_name(*id) == Some("body"))
    }

    // -- Construction -------------------------------------------------------

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            kind,
        });
        id
    }

    /// Create a detached element.
    pub fn create_element(&mut self, element: Element) -> NodeId {
        self.push_node(NodeKind::Element(element))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push_node(NodeKind::Text(text.into()))
    }

    // -- Inspection ---------------------------------------------------------

    fn is_valid(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.0).map(|node| &node.kind)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.kind(id) {
            Some(NodeKind::Element(element)) => Some(element),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match self.nodes.get_mut(id.0).map(|node| &mut node.kind) {
            Some(NodeKind::Element(element)) => Some(element),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|element| element.tag.as_str())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|element| element.attr(name))
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        if let Some(element) = self.element_mut(id) {
            element.set_attr(name, value);
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(element) = self.element_mut(id) {
            element.remove_attr(name);
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|node| node.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|child| self.is_element(*child))
            .collect()
    }

    /// Element ancestors from the parent upwards (the document root excluded).
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = self.parent(id);
        while let Some(node) = cursor {
            if self.is_element(node) {
                out.push(node);
            }
            cursor = self.parent(node);
        }
        out
    }

    /// `true` when `ancestor == node` or `ancestor` is above `node`.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        self.contains(self.root, id)
    }

    /// All elements below `from` in document (pre-)order, `from` excluded.
    pub fn elements_under(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(from).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            if self.is_element(node) {
                out.push(node);
            }
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Connected elements in document order.
    pub fn all_elements(&self) -> Vec<NodeId> {
        self.elements_under(self.root)
    }

    /// Element siblings sharing the node's tag, including the node itself.
    pub fn same_tag_siblings(&self, id: NodeId) -> Vec<NodeId> {
        let (Some(parent), Some(tag)) = (self.parent(id), self.tag_name(id)) else {
            return Vec::new();
        };
        self.element_children(parent)
            .into_iter()
            .filter(|sibling| self.tag_name(*sibling) == Some(tag))
            .collect()
    }

    // -- Tree mutation ------------------------------------------------------

    /// Unlink a node from its parent. No-op for the root or detached nodes.
    pub fn detach(&mut self, id: NodeId) {
        if id == self.root || !self.is_valid(id) {
            return;
        }
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|child| *child != id);
        }
    }

    fn insert_at(&mut self, parent: NodeId, index: usize, child: NodeId) {
        if !self.is_valid(parent) || !self.is_valid(child) || self.contains(child, parent) {
            return;
        }
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let len = self.children(parent).len();
        self.insert_at(parent, len, child);
    }

    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_at(parent, 0, child);
    }

    /// Insert `node` immediately before `reference` under the same parent.
    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) {
        if reference == node {
            return;
        }
        self.detach(node);
        let Some(parent) = self.parent(reference) else {
            return;
        };
        if let Some(index) = self.index_in_parent(reference) {
            self.insert_at(parent, index, node);
        }
    }

    /// Insert `node` immediately after `reference` under the same parent.
    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) {
        if reference == node {
            return;
        }
        self.detach(node);
        let Some(parent) = self.parent(reference) else {
            return;
        };
        if let Some(index) = self.index_in_parent(reference) {
            self.insert_at(parent, index + 1, node);
        }
    }

    fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|child| *child == id)
    }

    /// Deep-copy a subtree; the copy is detached.
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let kind = match self.kind(id) {
            Some(kind) => kind.clone(),
            None => NodeKind::Text(String::new()),
        };
        let copy = self.push_node(kind);
        let children = self.children(id).to_vec();
        for child in children {
            let child_copy = self.deep_clone(child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    // -- Text ---------------------------------------------------------------

    pub fn text_content(&self, id: NodeId) -> String {
        match self.kind(id) {
            Some(NodeKind::Text(text)) => text.clone(),
            Some(_) => self
                .children(id)
                .iter()
                .map(|child| self.text_content(*child))
                .collect(),
            None => String::new(),
        }
    }

    /// Replace all children with a single text node (or none for `""`).
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            if let NodeKind::Text(existing) = &mut node.kind {
                *existing = text.to_string();
                return;
            }
        }
        for child in self.children(id).to_vec() {
            self.detach(child);
        }
        if !text.is_empty() {
            let text_node = self.create_text(text);
            self.append_child(id, text_node);
        }
    }

    // -- Classes ------------------------------------------------------------

    pub fn add_class(&mut self, id: NodeId, class_name: &str) {
        let Some(element) = self.element_mut(id) else {
            return;
        };
        if class_name.is_empty() || element.has_class(class_name) {
            return;
        }
        let mut classes: Vec<String> = element.classes().iter().map(|c| c.to_string()).collect();
        classes.push(class_name.to_string());
        element.set_attr("class", classes.join(" "));
    }

    pub fn remove_class(&mut self, id: NodeId, class_name: &str) {
        let Some(element) = self.element_mut(id) else {
            return;
        };
        if !element.has_class(class_name) {
            return;
        }
        let classes: Vec<String> = element
            .classes()
            .iter()
            .filter(|c| **c != class_name)
            .map(|c| c.to_string())
            .collect();
        if classes.is_empty() {
            element.remove_attr("class");
        } else {
            element.set_attr("class", classes.join(" "));
        }
    }

    // -- Inline style -------------------------------------------------------

    pub fn style(&self, id: NodeId) -> Vec<(String, String)> {
        style::parse_declarations(self.attr(id, "style").unwrap_or(""))
    }

    pub fn style_property(&self, id: NodeId, property: &str) -> Option<String> {
        self.style(id)
            .into_iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value)
    }

    /// Set (or overwrite) one inline style property. An empty value removes it.
    pub fn set_style_property(&mut self, id: NodeId, property: &str, value: &str) {
        let mut decls = self.style(id);
        let property = style::normalize_property(property);
        let value = value.trim();
        match decls.iter().position(|(name, _)| *name == property) {
            Some(pos) if value.is_empty() => {
                decls.remove(pos);
            }
            Some(pos) => decls[pos].1 = value.to_string(),
            None if value.is_empty() => {}
            None => decls.push((property, value.to_string())),
        }
        if decls.is_empty() {
            self.remove_attr(id, "style");
        } else {
            self.set_attr(id, "style", style::serialize_declarations(&decls));
        }
    }

    /// Merge declarations from a raw `a: b; c: d` string into the inline style.
    pub fn merge_style_text(&mut self, id: NodeId, css_text: &str) {
        for (name, value) in style::parse_declarations(css_text) {
            self.set_style_property(id, &name, &value);
        }
    }
}
