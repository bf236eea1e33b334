//! Arena-backed node tree: elements, text nodes, attributes, focus.
//!
//! Nodes are addressed by copyable [`NodeId`]s. Detaching a node keeps its
//! subtree intact (so it can be re-inserted or inspected) but removes it from
//! the attached document; attached-ness is always judged by walking to the
//! root. The arena never frees slots - documents handled by the editor core
//! are small and engine-bounded.

use std::collections::BTreeMap;

use smol_str::SmolStr;
use thiserror::Error;

use crate::range::{Boundary, SelectionState};

/// Handle to a node in a [`Dom`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Errors from tree manipulation.
///
/// These never cross the editor core's public API; callers there degrade to
/// safe defaults instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("node {0:?} does not exist in this arena")]
    InvalidNode(NodeId),
    #[error("offset {offset} out of bounds for node of length {len}")]
    OffsetOutOfBounds { offset: usize, len: usize },
    #[error("expected a text node")]
    NotAText,
    #[error("expected an element node")]
    NotAnElement,
    #[error("node would become its own ancestor")]
    CycleDetected,
}

/// What a node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
}

/// Selection state of a native text input (`<input>` / `<textarea>`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputState {
    pub value: String,
    pub selection_start: usize,
    pub selection_end: usize,
}

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: SmolStr,
        attrs: BTreeMap<SmolStr, SmolStr>,
        /// Present for native form inputs, absent for ordinary elements.
        input: Option<InputState>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Tags that behave like native form inputs.
const NATIVE_INPUT_TAGS: &[&str] = &["input", "textarea"];

/// The headless document: node arena, single-range selection, focus.
#[derive(Debug, Clone)]
pub struct Dom {
    nodes: Vec<Node>,
    root: NodeId,
    selection: Option<SelectionState>,
    focused: Option<NodeId>,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    /// Create a document with an empty `body` root element.
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            selection: None,
            focused: None,
        };
        let root = dom.create_element("body");
        dom.root = root;
        dom
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    // === Node creation ===

    pub fn create_element(&mut self, tag: impl Into<SmolStr>) -> NodeId {
        let tag = tag.into();
        let input = NATIVE_INPUT_TAGS
            .contains(&tag.as_str())
            .then(InputState::default);
        self.push_node(NodeData::Element {
            tag,
            attrs: BTreeMap::new(),
            input,
        })
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push_node(NodeData::Text(text.into()))
    }

    fn push_node(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn node(&self, id: NodeId) -> Result<&Node, DomError> {
        self.nodes.get(id.index()).ok_or(DomError::InvalidNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.nodes
            .get_mut(id.index())
            .ok_or(DomError::InvalidNode(id))
    }

    pub fn exists(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    // === Structure ===

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.node(id).ok().map(|n| match n.data {
            NodeData::Element { .. } => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
        })
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.kind(id), Some(NodeKind::Element))
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.kind(id), Some(NodeKind::Text))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).ok().and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id).map(|n| n.children.clone()).unwrap_or_default()
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.node(id).map(|n| n.children.len()).unwrap_or(0)
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).ok().and_then(|n| n.children.first().copied())
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).ok().and_then(|n| n.children.last().copied())
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.node(parent)
            .ok()?
            .children
            .iter()
            .position(|&c| c == id)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let ix = self.index_in_parent(id)?;
        self.node(parent).ok()?.children.get(ix + 1).copied()
    }

    /// True when the node is reachable from the document root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut cur = id;
        loop {
            if cur == self.root {
                return true;
            }
            match self.parent(cur) {
                Some(p) => cur = p,
                None => return false,
            }
        }
    }

    /// True when `node` is `ancestor` or a descendant of it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = self.parent(id);
        }
        false
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let len = self.node(parent)?.children.len();
        self.insert_child_at(parent, child, len)
    }

    /// Insert `child` into `parent` before `reference` (append when `None`).
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        let at = match reference {
            Some(r) => self
                .node(parent)?
                .children
                .iter()
                .position(|&c| c == r)
                .ok_or(DomError::InvalidNode(r))?,
            None => self.node(parent)?.children.len(),
        };
        self.insert_child_at(parent, child, at)
    }

    pub fn insert_child_at(
        &mut self,
        parent: NodeId,
        child: NodeId,
        at: usize,
    ) -> Result<(), DomError> {
        if self.contains(child, parent) {
            return Err(DomError::CycleDetected);
        }
        if matches!(self.node(parent)?.data, NodeData::Text(_)) {
            return Err(DomError::NotAnElement);
        }
        self.detach(child);
        let at = at.min(self.node(parent)?.children.len());
        self.node_mut(parent)?.children.insert(at, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Remove a node from its parent. The subtree stays intact.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Ok(p) = self.node_mut(parent) {
            p.children.retain(|&c| c != id);
        }
        if let Ok(n) = self.node_mut(id) {
            n.parent = None;
        }
        if self.focused == Some(id) {
            self.focused = None;
        }
    }

    // === Elements ===

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).ok()?.data {
            NodeData::Element { tag, .. } => Some(tag.as_str()),
            NodeData::Text(_) => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.node(id).ok()?.data {
            NodeData::Element { attrs, .. } => attrs.get(name).map(|v| v.as_str()),
            NodeData::Text(_) => None,
        }
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn set_attr(&mut self, id: NodeId, name: impl Into<SmolStr>, value: impl Into<SmolStr>) {
        if let Ok(node) = self.node_mut(id) {
            if let NodeData::Element { attrs, .. } = &mut node.data {
                attrs.insert(name.into(), value.into());
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Ok(node) = self.node_mut(id) {
            if let NodeData::Element { attrs, .. } = &mut node.data {
                attrs.remove(name);
            }
        }
    }

    /// Whitespace-token membership test on the `class` attribute.
    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .map(|v| v.split_whitespace().any(|t| t == class))
            .unwrap_or(false)
    }

    // === Text ===

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).ok()?.data {
            NodeData::Text(s) => Some(s.as_str()),
            NodeData::Element { .. } => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) -> Result<(), DomError> {
        match &mut self.node_mut(id)?.data {
            NodeData::Text(s) => {
                *s = text.into();
                Ok(())
            }
            NodeData::Element { .. } => Err(DomError::NotAText),
        }
    }

    /// Length of a text node in characters.
    pub fn text_len(&self, id: NodeId) -> usize {
        self.text(id).map(|s| s.chars().count()).unwrap_or(0)
    }

    /// Concatenated text of the node and all its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Ok(node) = self.node(id) else {
            return;
        };
        match &node.data {
            NodeData::Text(s) => out.push_str(s),
            NodeData::Element { .. } => {
                for child in node.children.clone() {
                    self.collect_text(child, out);
                }
            }
        }
    }

    // === Traversal ===

    /// Preorder descendants of `id`, excluding `id` itself. Only attached
    /// children are visited (the subtree under `id` as currently linked).
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.walk(id, &mut out);
        out
    }

    fn walk(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for child in self.children(id) {
            out.push(child);
            self.walk(child, out);
        }
    }

    /// Text nodes under `id`, in document order.
    pub fn text_nodes_within(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|&n| self.is_text(n))
            .collect()
    }

    /// Attached elements carrying the given attribute, in document order.
    pub fn elements_with_attr(&self, name: &str) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|&n| self.has_attr(n, name))
            .collect()
    }

    /// Walk up from `id` (inclusive) until `pred` matches, bounded by `depth`
    /// ancestors.
    pub fn closest(
        &self,
        id: NodeId,
        depth: usize,
        pred: impl Fn(&Dom, NodeId) -> bool,
    ) -> Option<NodeId> {
        let mut cur = Some(id);
        let mut steps = 0;
        while let Some(node) = cur {
            if pred(self, node) {
                return Some(node);
            }
            if steps >= depth {
                return None;
            }
            steps += 1;
            cur = self.parent(node);
        }
        None
    }

    /// Nearest ancestor (or self) carrying the attribute.
    pub fn closest_with_attr(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.closest(id, usize::MAX, |dom, n| dom.has_attr(n, name))
    }

    /// Child-index path from the root to `id`; `None` for detached nodes.
    /// Paths compare lexicographically in document order.
    pub fn path(&self, id: NodeId) -> Option<Vec<usize>> {
        let mut path = Vec::new();
        let mut cur = id;
        while cur != self.root {
            path.push(self.index_in_parent(cur)?);
            cur = self.parent(cur)?;
        }
        path.reverse();
        Some(path)
    }

    // === Editing ===

    /// Split a text node at a character offset, keeping the head in place and
    /// inserting the tail right after it. Returns the tail node.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> Result<NodeId, DomError> {
        let text = self.text(id).ok_or(DomError::NotAText)?.to_string();
        let len = text.chars().count();
        if offset > len {
            return Err(DomError::OffsetOutOfBounds { offset, len });
        }
        let byte = char_to_byte(&text, offset);
        let tail = text[byte..].to_string();
        self.set_text(id, &text[..byte])?;
        let tail_node = self.create_text(tail);
        if let Some(parent) = self.parent(id) {
            let ix = self.index_in_parent(id).unwrap_or(0);
            self.insert_child_at(parent, tail_node, ix + 1)?;
        }
        Ok(tail_node)
    }

    /// Replace `id` with `wrapper` at its position and move `id` inside it.
    pub fn wrap(&mut self, id: NodeId, wrapper: NodeId) -> Result<(), DomError> {
        let parent = self.parent(id).ok_or(DomError::InvalidNode(id))?;
        let ix = self.index_in_parent(id).unwrap_or(0);
        self.detach(id);
        self.insert_child_at(parent, wrapper, ix)?;
        self.append_child(wrapper, id)
    }

    /// Move an element's children up into its parent and detach the element.
    /// Returns the moved children in order.
    pub fn unwrap(&mut self, id: NodeId) -> Result<Vec<NodeId>, DomError> {
        let parent = self.parent(id).ok_or(DomError::InvalidNode(id))?;
        let ix = self.index_in_parent(id).unwrap_or(0);
        let children = self.children(id);
        self.detach(id);
        for (offset, &child) in children.iter().enumerate() {
            self.insert_child_at(parent, child, ix + offset)?;
        }
        Ok(children)
    }

    /// Merge adjacent text-node children and drop empty ones, recursively.
    /// Equivalent to the platform's `Node.normalize()`.
    pub fn normalize(&mut self, id: NodeId) {
        let children = self.children(id);
        let mut previous_text: Option<NodeId> = None;
        for child in children {
            if let Some(text) = self.text(child).map(|s| s.to_string()) {
                if text.is_empty() {
                    self.detach(child);
                    continue;
                }
                match previous_text {
                    Some(prev) => {
                        let merged = format!("{}{}", self.text(prev).unwrap_or(""), text);
                        let _ = self.set_text(prev, merged);
                        self.detach(child);
                    }
                    None => previous_text = Some(child),
                }
            } else {
                previous_text = None;
                self.normalize(child);
            }
        }
    }

    /// Insert a node at a boundary point, splitting text when the boundary
    /// falls inside a text node.
    pub fn insert_at_boundary(
        &mut self,
        boundary: Boundary,
        node: NodeId,
    ) -> Result<(), DomError> {
        if self.is_text(boundary.node) {
            let parent = self
                .parent(boundary.node)
                .ok_or(DomError::InvalidNode(boundary.node))?;
            let ix = self.index_in_parent(boundary.node).unwrap_or(0);
            if boundary.offset == 0 {
                self.insert_child_at(parent, node, ix)
            } else if boundary.offset >= self.text_len(boundary.node) {
                self.insert_child_at(parent, node, ix + 1)
            } else {
                let tail = self.split_text(boundary.node, boundary.offset)?;
                self.insert_before(parent, node, Some(tail))
            }
        } else {
            self.insert_child_at(boundary.node, node, boundary.offset)
        }
    }

    // === Native inputs ===

    pub fn is_native_input(&self, id: NodeId) -> bool {
        matches!(
            self.node(id).ok().map(|n| &n.data),
            Some(NodeData::Element { input: Some(_), .. })
        )
    }

    pub fn input_state(&self, id: NodeId) -> Option<&InputState> {
        match &self.node(id).ok()?.data {
            NodeData::Element { input, .. } => input.as_ref(),
            NodeData::Text(_) => None,
        }
    }

    pub fn set_input_value(&mut self, id: NodeId, value: impl Into<String>) {
        if let Ok(node) = self.node_mut(id) {
            if let NodeData::Element {
                input: Some(state), ..
            } = &mut node.data
            {
                state.value = value.into();
            }
        }
    }

    pub fn set_input_selection(&mut self, id: NodeId, start: usize, end: usize) {
        if let Ok(node) = self.node_mut(id) {
            if let NodeData::Element {
                input: Some(state), ..
            } = &mut node.data
            {
                state.selection_start = start;
                state.selection_end = end;
            }
        }
    }

    // === Focus ===

    pub fn focus(&mut self, id: NodeId) {
        if self.exists(id) {
            self.focused = Some(id);
        }
    }

    pub fn blur(&mut self) {
        self.focused = None;
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    // === Selection ===

    pub fn selection(&self) -> Option<&SelectionState> {
        self.selection.as_ref()
    }

    pub fn set_selection(&mut self, anchor: Boundary, focus: Boundary) {
        self.selection = Some(SelectionState { anchor, focus });
    }

    pub fn collapse_selection(&mut self, at: Boundary) {
        self.selection = Some(SelectionState {
            anchor: at,
            focus: at,
        });
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }
}

pub(crate) fn char_to_byte(s: &str, chars: usize) -> usize {
    s.char_indices()
        .nth(chars)
        .map(|(b, _)| b)
        .unwrap_or(s.len())
}
