//! Stateless helpers over the platform selection.
//!
//! Every operation here degrades to a safe default when the selection is
//! absent or points at detached nodes; nothing returns an error.

use quarry_dom::range::text_in_range;
use quarry_dom::{Boundary, Dom, LayoutMetrics, NodeId, Rect, SelectionState};

use crate::markers;

/// Anchor boundary of the current selection.
pub fn anchor(dom: &Dom) -> Option<Boundary> {
    dom.selection().map(|s| s.anchor)
}

/// The element at (or directly above) the selection anchor.
pub fn anchor_element(dom: &Dom) -> Option<NodeId> {
    let node = anchor(dom)?.node;
    if dom.is_text(node) {
        dom.parent(node)
    } else {
        Some(node)
    }
}

pub fn anchor_offset(dom: &Dom) -> Option<usize> {
    anchor(dom).map(|b| b.offset)
}

/// `None` when there is no selection at all.
pub fn is_collapsed(dom: &Dom) -> Option<bool> {
    dom.selection().map(SelectionState::is_collapsed)
}

/// True when the selection anchor sits inside the editor's redactor root.
pub fn is_selection_at_editor(dom: &Dom) -> bool {
    let Some(element) = anchor_element(dom) else {
        return false;
    };
    dom.closest_with_attr(element, markers::EDITOR_ROOT)
        .is_some()
}

/// Bounding rectangle of the current range.
///
/// When the platform reports the zero-origin quirk rect, a zero-width span is
/// inserted at the range start, measured, removed again, and its parent
/// normalized; the measured rect is returned instead.
pub fn range_rect(dom: &mut Dom, metrics: &dyn LayoutMetrics) -> Option<Rect> {
    let (start, end) = dom.selection()?.normalized(dom);
    let rect = metrics.range_rect(dom, start, end);
    if !rect.is_zero_origin() {
        return Some(rect);
    }

    let span = dom.create_element("span");
    let zwsp = dom.create_text("\u{200B}");
    dom.append_child(span, zwsp).ok()?;
    dom.insert_at_boundary(start, span).ok()?;

    let measured = metrics.client_rects(dom, span).first().copied();

    let parent = dom.parent(span);
    dom.detach(span);
    if let Some(parent) = parent {
        dom.normalize(parent);
    }
    measured
}

/// Place a collapsed caret at `(element, offset)`.
///
/// Native text inputs are focused and get `selectionStart = selectionEnd =
/// offset`; everything else gets a collapsed platform range.
pub fn set_cursor(dom: &mut Dom, element: NodeId, offset: usize) -> bool {
    if !dom.exists(element) {
        return false;
    }
    if dom.is_native_input(element) {
        dom.focus(element);
        dom.set_input_selection(element, offset, offset);
        return true;
    }
    let max = if dom.is_text(element) {
        dom.text_len(element)
    } else {
        dom.child_count(element)
    };
    dom.focus(element);
    dom.collapse_selection(Boundary::new(element, offset.min(max)));
    true
}

/// Character offset of the caret inside an input.
///
/// Native inputs report `selectionStart`/`selectionEnd`. For contenteditable
/// inputs the offset is the textual length of a range from the input's start
/// to the caret end (or start).
pub fn offset_in_input(dom: &Dom, input: NodeId, use_end: bool) -> usize {
    if let Some(state) = dom.input_state(input) {
        return if use_end {
            state.selection_end
        } else {
            state.selection_start
        };
    }
    let Some(selection) = dom.selection() else {
        return 0;
    };
    let (start, end) = selection.normalized(dom);
    let caret = if use_end { end } else { start };
    if !dom.contains(input, caret.node) {
        return 0;
    }
    text_in_range(dom, Boundary::new(input, 0), caret)
        .chars()
        .count()
}

/// Walk up from the selection's anchor and focus nodes (both tried
/// independently) looking for an element with the given tag, bounded by
/// `depth` ancestors.
pub fn find_parent_tag(
    dom: &Dom,
    tag: &str,
    class: Option<&str>,
    depth: usize,
) -> Option<NodeId> {
    let selection = dom.selection()?;
    for boundary in [selection.anchor, selection.focus] {
        let found = dom.closest(boundary.node, depth, |d, n| {
            d.tag(n)
                .map(|t| t.eq_ignore_ascii_case(tag))
                .unwrap_or(false)
                && class.map(|c| d.has_class(n, c)).unwrap_or(true)
        });
        if found.is_some() {
            return found;
        }
    }
    None
}

/// Select the whole contents of an element.
pub fn expand_to_tag(dom: &mut Dom, element: NodeId) {
    if !dom.exists(element) {
        return;
    }
    dom.set_selection(
        Boundary::new(element, 0),
        Boundary::new(element, dom.child_count(element)),
    );
}

/// Insert a marked zero-width span at the collapsed caret, preserving a
/// visible insertion point while focus is elsewhere.
pub fn add_fake_cursor(dom: &mut Dom) {
    let Some(selection) = dom.selection() else {
        return;
    };
    if !selection.is_collapsed() {
        return;
    }
    let at = selection.focus;
    let span = dom.create_element("span");
    dom.set_attr(span, markers::FAKE_CURSOR, "true");
    dom.set_attr(span, markers::MUTATION_FREE, "true");
    let zwsp = dom.create_text("\u{200B}");
    if dom.append_child(span, zwsp).is_err() {
        return;
    }
    if dom.insert_at_boundary(at, span).is_err() {
        dom.detach(span);
    }
}

/// Remove any fake cursor under `root` and re-merge the text around it.
pub fn remove_fake_cursor(dom: &mut Dom, root: NodeId) {
    let cursors: Vec<NodeId> = dom
        .elements_with_attr(markers::FAKE_CURSOR)
        .into_iter()
        .filter(|&n| dom.contains(root, n))
        .collect();
    for cursor in cursors {
        let parent = dom.parent(cursor);
        dom.detach(cursor);
        if let Some(parent) = parent {
            dom.normalize(parent);
        }
    }
}

pub fn is_fake_cursor_inserted(dom: &Dom, root: NodeId) -> bool {
    dom.elements_with_attr(markers::FAKE_CURSOR)
        .iter()
        .any(|&n| dom.contains(root, n))
}

/// Capture/restore of the platform selection around toolbar interactions.
#[derive(Debug, Default)]
pub struct SelectionSaver {
    saved: Option<SelectionState>,
}

impl SelectionSaver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&mut self, dom: &Dom) {
        self.saved = dom.selection().copied();
    }

    /// Reinstall the saved selection when its nodes are still attached.
    pub fn restore(&self, dom: &mut Dom) -> bool {
        let Some(saved) = self.saved else {
            return false;
        };
        if !dom.is_attached(saved.anchor.node) || !dom.is_attached(saved.focus.node) {
            return false;
        }
        dom.set_selection(saved.anchor, saved.focus);
        true
    }

    pub fn clear_saved(&mut self) {
        self.saved = None;
    }

    pub fn has_saved(&self) -> bool {
        self.saved.is_some()
    }
}
