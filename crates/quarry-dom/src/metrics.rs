//! Geometry seam: rectangles and computed text style come from the host.
//!
//! The editor core never computes layout. It asks a [`LayoutMetrics`]
//! implementation for client rectangles, character boxes and computed
//! line-height/font-size, exactly the quantities the original platform
//! exposed. [`MonospaceMetrics`] is a deterministic implementation used by
//! headless hosts and the test suites.

use crate::node::{Dom, NodeId};
use crate::range::{intersecting_text_nodes, Boundary};

/// Axis-aligned rectangle in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
    };

    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// The platform quirk marker: a rect reported at the document origin.
    pub fn is_zero_origin(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }
}

/// Host-supplied geometry for nodes of a [`Dom`].
pub trait LayoutMetrics {
    /// Client rectangles of a node, one per visual line fragment, in
    /// top-to-bottom order. Empty when the node renders nothing.
    fn client_rects(&self, dom: &Dom, node: NodeId) -> Vec<Rect>;

    /// Box of a single character of a text node.
    fn char_rect(&self, dom: &Dom, text_node: NodeId, char_index: usize) -> Option<Rect>;

    /// Bounding rectangle of a range. Implementations may reproduce the
    /// platform quirk of a zero-origin rect for awkward node configurations;
    /// callers handle that via the measurement fallback.
    fn range_rect(&self, dom: &Dom, start: Boundary, end: Boundary) -> Rect;

    /// Computed `line-height` in pixels; `None` when the computed value is
    /// not numeric (`normal`).
    fn line_height(&self, dom: &Dom, node: NodeId) -> Option<f64>;

    /// Computed `font-size` in pixels.
    fn font_size(&self, dom: &Dom, node: NodeId) -> f64;
}

/// Attribute marking an element as an independent layout flow. Content under
/// each layout root wraps and stacks on its own; roots stack vertically in
/// document order.
pub const LAYOUT_ROOT_ATTR: &str = "data-layout-root";

/// Deterministic monospace layout: every character occupies a fixed cell,
/// lines wrap at a fixed column count, glyph boxes sit at the top of the
/// line box (so `line_height - font_size` is the inter-line gap).
#[derive(Debug, Clone)]
pub struct MonospaceMetrics {
    pub char_width: f64,
    pub font_size: f64,
    /// `None` models a non-numeric computed line-height.
    pub line_height: Option<f64>,
    /// Characters per visual line.
    pub cols: usize,
    /// Vertical distance between consecutive layout roots.
    pub block_gap: f64,
    /// Reproduce the zero-origin `range_rect` platform quirk.
    pub zero_range_rect_quirk: bool,
}

impl Default for MonospaceMetrics {
    fn default() -> Self {
        Self {
            char_width: 8.0,
            font_size: 16.0,
            line_height: Some(24.0),
            cols: 80,
            block_gap: 1000.0,
            zero_range_rect_quirk: false,
        }
    }
}

impl MonospaceMetrics {
    fn advance(&self) -> f64 {
        self.line_height.unwrap_or(1.2 * self.font_size)
    }

    fn layout_root(&self, dom: &Dom, node: NodeId) -> NodeId {
        dom.closest(node, usize::MAX, |d, n| d.has_attr(n, LAYOUT_ROOT_ATTR))
            .unwrap_or(dom.root())
    }

    /// Vertical origin of a layout root: stacking position among all roots.
    fn root_origin(&self, dom: &Dom, root: NodeId) -> f64 {
        if root == dom.root() {
            return 0.0;
        }
        let index = dom
            .elements_with_attr(LAYOUT_ROOT_ATTR)
            .iter()
            .position(|&n| n == root)
            .unwrap_or(0);
        (index + 1) as f64 * self.block_gap
    }

    /// Character cell `(row, col)` for the `char_index`-th character of
    /// `text_node` within its layout root flow.
    fn cell_of(&self, dom: &Dom, text_node: NodeId, char_index: usize) -> Option<(f64, usize, usize)> {
        let root = self.layout_root(dom, text_node);
        let mut global = 0usize;
        let mut found = false;
        for node in dom.text_nodes_within(root) {
            if node == text_node {
                global += char_index;
                found = true;
                break;
            }
            global += dom.text_len(node);
        }
        if !found {
            return None;
        }
        Some((
            self.root_origin(dom, root),
            global / self.cols,
            global % self.cols,
        ))
    }

    fn cell_rect(&self, origin: f64, row: usize, col: usize, width_chars: usize) -> Rect {
        Rect::new(
            col as f64 * self.char_width,
            origin + row as f64 * self.advance(),
            width_chars as f64 * self.char_width,
            self.font_size,
        )
    }

    /// Per-row rectangles of a run of characters of one text node.
    fn rects_of_span(&self, dom: &Dom, node: NodeId, from: usize, to: usize) -> Vec<Rect> {
        let mut rects: Vec<Rect> = Vec::new();
        let mut i = from;
        while i < to {
            let Some((origin, row, col)) = self.cell_of(dom, node, i) else {
                break;
            };
            let run = (self.cols - col).min(to - i);
            rects.push(self.cell_rect(origin, row, col, run));
            i += run;
        }
        rects
    }
}

impl LayoutMetrics for MonospaceMetrics {
    fn client_rects(&self, dom: &Dom, node: NodeId) -> Vec<Rect> {
        let text_nodes = if dom.is_text(node) {
            vec![node]
        } else {
            dom.text_nodes_within(node)
        };
        let mut rects: Vec<Rect> = Vec::new();
        for text in text_nodes {
            for rect in self.rects_of_span(dom, text, 0, dom.text_len(text)) {
                // Merge fragments that continue the same visual line.
                match rects.last_mut() {
                    Some(last) if (last.y - rect.y).abs() < f64::EPSILON => {
                        *last = last.union(&rect);
                    }
                    _ => rects.push(rect),
                }
            }
        }
        rects
    }

    fn char_rect(&self, dom: &Dom, text_node: NodeId, char_index: usize) -> Option<Rect> {
        if char_index >= dom.text_len(text_node) {
            return None;
        }
        let (origin, row, col) = self.cell_of(dom, text_node, char_index)?;
        Some(self.cell_rect(origin, row, col, 1))
    }

    fn range_rect(&self, dom: &Dom, start: Boundary, end: Boundary) -> Rect {
        if self.zero_range_rect_quirk {
            return Rect::ZERO;
        }
        if start == end {
            // Collapsed: caret cell with zero width.
            if dom.is_text(start.node) {
                let index = start.offset.min(dom.text_len(start.node).saturating_sub(1));
                if let Some((origin, row, col)) = self.cell_of(dom, start.node, index) {
                    let mut rect = self.cell_rect(origin, row, col, 0);
                    if start.offset >= dom.text_len(start.node) {
                        rect.x += self.char_width;
                    }
                    return rect;
                }
            }
            return Rect::ZERO;
        }
        let mut bounds: Option<Rect> = None;
        for (node, from, to) in intersecting_text_nodes(dom, start, end) {
            for rect in self.rects_of_span(dom, node, from, to) {
                bounds = Some(match bounds {
                    Some(b) => b.union(&rect),
                    None => rect,
                });
            }
        }
        bounds.unwrap_or(Rect::ZERO)
    }

    fn line_height(&self, _dom: &Dom, _node: NodeId) -> Option<f64> {
        self.line_height
    }

    fn font_size(&self, _dom: &Dom, _node: NodeId) -> f64 {
        self.font_size
    }
}
