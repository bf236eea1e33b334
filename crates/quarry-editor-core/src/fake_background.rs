//! Visible selection highlight that survives focus loss.
//!
//! When a toolbar steals focus the platform hides the native selection. This
//! renderer reifies it: every text node intersecting the range is wrapped in
//! a marked span, wrappers are split so each covers one visual line, and
//! box-shadow extensions fill the inter-line gaps so the highlight reads as
//! one continuous block.

use quarry_dom::range::intersecting_text_nodes;
use quarry_dom::{Boundary, Dom, LayoutMetrics, NodeId, Rect, SelectionState};
use smol_str::SmolStr;

use crate::markers;

/// Highlight color carried by the inset shadow. The inset layer doubles as
/// the background so adjacent wrappers do not stack translucent layers at
/// line boundaries.
const BACKGROUND_COLOR: &str = "#a8d6ff";

/// Rect tops within this distance belong to the same visual line.
const LINE_TOP_TOLERANCE: f64 = 2.0;

/// A vertical jump larger than this between character boxes marks a line
/// break inside a wrapper.
const LINE_JUMP_THRESHOLD: f64 = 5.0;

/// Fake-background renderer state: the active flag plus the saved range
/// spanning the outermost wrappers.
#[derive(Debug, Default)]
pub struct FakeBackground {
    active: bool,
    saved_range: Option<SelectionState>,
}

impl FakeBackground {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Range spanning the highlight (or what it spanned before teardown).
    pub fn saved_range(&self) -> Option<SelectionState> {
        self.saved_range
    }

    /// Wrap the current non-collapsed selection in highlight spans.
    pub fn set(&mut self, dom: &mut Dom, metrics: &dyn LayoutMetrics) {
        let Some(selection) = dom.selection() else {
            return;
        };
        if selection.is_collapsed() {
            return;
        }
        let (start, end) = selection.normalized(dom);

        let pieces = intersecting_text_nodes(dom, start, end);
        if pieces.is_empty() {
            return;
        }

        let mut wrappers = Vec::new();
        for (node, from, to) in pieces {
            if let Some(wrapper) = wrap_piece(dom, node, from, to) {
                wrappers.push(wrapper);
            }
        }
        if wrappers.is_empty() {
            return;
        }

        split_multiline_wrappers(dom, metrics, &mut wrappers);
        apply_line_extensions(dom, metrics, &wrappers);

        // Span from before the first wrapper to after the last.
        let (Some(&first), Some(&last)) = (wrappers.first(), wrappers.last()) else {
            return;
        };
        let (Some(first_parent), Some(last_parent)) = (dom.parent(first), dom.parent(last)) else {
            return;
        };
        let range = SelectionState {
            anchor: Boundary::new(first_parent, dom.index_in_parent(first).unwrap_or(0)),
            focus: Boundary::new(
                last_parent,
                dom.index_in_parent(last).map(|i| i + 1).unwrap_or(0),
            ),
        };
        dom.set_selection(range.anchor, range.focus);
        self.saved_range = Some(range);
        self.active = true;
        tracing::trace!(target: "quarry::selection", wrappers = wrappers.len(), "fake background set");
    }

    /// Unwrap every highlight span and reconstruct the range it covered.
    pub fn remove(&mut self, dom: &mut Dom) {
        let wrappers = dom.elements_with_attr(markers::FAKE_BACKGROUND);
        self.active = false;
        let (Some(&first), Some(&last)) = (wrappers.first(), wrappers.last()) else {
            return;
        };

        let range_start = dom.first_child(first);
        let range_end = dom.last_child(last);

        for wrapper in wrappers {
            let _ = dom.unwrap(wrapper);
        }

        if let (Some(start_node), Some(end_node)) = (range_start, range_end) {
            let end_offset = if dom.is_text(end_node) {
                dom.text_len(end_node)
            } else {
                dom.child_count(end_node)
            };
            self.saved_range = Some(SelectionState {
                anchor: Boundary::new(start_node, 0),
                focus: Boundary::new(end_node, end_offset),
            });
        }
    }

    /// Orphan cleanup: drop every highlight span, wherever it is. Safe to
    /// call at any time, any number of times.
    pub fn clear(&mut self, dom: &mut Dom) {
        for wrapper in dom.elements_with_attr(markers::FAKE_BACKGROUND) {
            let _ = dom.unwrap(wrapper);
        }
        self.active = false;
        self.saved_range = None;
    }
}

/// Isolate `[from, to)` of a text node and wrap it in a highlight span.
fn wrap_piece(dom: &mut Dom, node: NodeId, from: usize, to: usize) -> Option<NodeId> {
    let len = dom.text_len(node);
    if to < len {
        dom.split_text(node, to).ok()?;
    }
    let target = if from > 0 {
        dom.split_text(node, from).ok()?
    } else {
        node
    };

    let wrapper = make_wrapper(dom);
    dom.wrap(target, wrapper).ok()?;
    Some(wrapper)
}

fn make_wrapper(dom: &mut Dom) -> NodeId {
    let wrapper = dom.create_element("span");
    dom.set_attr(wrapper, markers::FAKE_BACKGROUND, "true");
    dom.set_attr(wrapper, markers::MUTATION_FREE, "true");
    wrapper
}

/// Base inline style of a wrapper; the box-shadow extension is appended per
/// wrapper once line geometry is known.
fn base_style() -> SmolStr {
    SmolStr::new(
        "color: inherit; box-decoration-break: clone; -webkit-box-decoration-break: clone; white-space: pre-wrap;",
    )
}

/// Split any wrapper whose rects span more than one visual line into one
/// wrapper per line, by splitting its text node where the vertical position
/// jumps.
fn split_multiline_wrappers(dom: &mut Dom, metrics: &dyn LayoutMetrics, wrappers: &mut Vec<NodeId>) {
    let mut i = 0;
    while i < wrappers.len() {
        let wrapper = wrappers[i];
        if metrics.client_rects(dom, wrapper).len() <= 1 {
            i += 1;
            continue;
        }
        let Some(text) = dom.first_child(wrapper).filter(|&n| dom.is_text(n)) else {
            i += 1;
            continue;
        };
        let Some(split_at) = line_break_offset(dom, metrics, text) else {
            i += 1;
            continue;
        };

        let tail = match dom.split_text(text, split_at) {
            Ok(tail) => tail,
            Err(_) => {
                i += 1;
                continue;
            }
        };
        let next_wrapper = make_wrapper(dom);
        let Some(parent) = dom.parent(wrapper) else {
            i += 1;
            continue;
        };
        let at = dom.index_in_parent(wrapper).map(|ix| ix + 1).unwrap_or(0);
        dom.detach(tail);
        if dom.insert_child_at(parent, next_wrapper, at).is_err()
            || dom.append_child(next_wrapper, tail).is_err()
        {
            i += 1;
            continue;
        }
        wrappers.insert(i + 1, next_wrapper);
        // Re-check the current wrapper; it may still span lines.
    }
}

/// First character offset at which the text drops to the next visual line.
fn line_break_offset(dom: &Dom, metrics: &dyn LayoutMetrics, text: NodeId) -> Option<usize> {
    let len = dom.text_len(text);
    let first_top = metrics.char_rect(dom, text, 0)?.top();
    for index in 1..len {
        let rect = metrics.char_rect(dom, text, index)?;
        if rect.top() - first_top > LINE_JUMP_THRESHOLD {
            return Some(index);
        }
    }
    None
}

#[derive(Debug, Clone, Copy)]
struct VisualLine {
    top: f64,
    bottom: f64,
}

/// Cluster rects into visual lines by top coordinate.
fn cluster_lines(rects: &[Rect]) -> Vec<VisualLine> {
    let mut lines: Vec<VisualLine> = Vec::new();
    for rect in rects {
        match lines
            .iter_mut()
            .find(|line| (line.top - rect.top()).abs() <= LINE_TOP_TOLERANCE)
        {
            Some(line) => {
                line.top = line.top.min(rect.top());
                line.bottom = line.bottom.max(rect.bottom());
            }
            None => lines.push(VisualLine {
                top: rect.top(),
                bottom: rect.bottom(),
            }),
        }
    }
    lines.sort_by(|a, b| a.top.total_cmp(&b.top));
    lines
}

/// Vertical shadow extensions of one wrapper rect within its line grid.
///
/// The top extension is always the base; the bottom extension additionally
/// absorbs whatever part of the gap to the next line the base does not cover.
fn extensions_for(rect: &Rect, lines: &[VisualLine], effective_line_height: f64) -> (f64, f64) {
    let base = ((effective_line_height - rect.height) / 2.0).max(0.0);
    let line_index = lines
        .iter()
        .position(|line| (line.top - rect.top()).abs() <= LINE_TOP_TOLERANCE);
    let bottom = match line_index {
        Some(index) if index + 1 < lines.len() => {
            let gap = lines[index + 1].top - lines[index].bottom;
            base + (gap - base).max(0.0)
        }
        _ => base,
    };
    (base, bottom)
}

fn apply_line_extensions(dom: &mut Dom, metrics: &dyn LayoutMetrics, wrappers: &[NodeId]) {
    let mut all_rects = Vec::new();
    let mut first_rects = Vec::new();
    for &wrapper in wrappers {
        let rects = metrics.client_rects(dom, wrapper);
        first_rects.push(rects.first().copied());
        all_rects.extend(rects);
    }
    let lines = cluster_lines(&all_rects);

    for (&wrapper, first_rect) in wrappers.iter().zip(first_rects) {
        let line_height = metrics
            .line_height(dom, wrapper)
            .unwrap_or_else(|| 1.2 * metrics.font_size(dom, wrapper));
        let (top, bottom) = match first_rect {
            Some(rect) => extensions_for(&rect, &lines, line_height),
            None => (0.0, 0.0),
        };
        let style = format!(
            "{} box-shadow: inset 0 0 0 9999px {bg}, 0 {bottom}px 0 {bg}, 0 -{top}px 0 {bg};",
            base_style(),
            bg = BACKGROUND_COLOR,
        );
        dom.set_attr(wrapper, "style", style);
    }
}
