//! quarry-dom: headless node-tree primitives for the quarry editor.
//!
//! This crate stands in for the platform document model the editor core was
//! designed against. It provides:
//! - `Dom` - an arena of element and text nodes with attributes
//! - `Boundary` / `SelectionState` - a single-range selection model
//! - `LayoutMetrics` - the seam through which hosts inject geometry
//! - `MonospaceMetrics` - a deterministic metrics implementation for
//!   headless hosts and tests
//!
//! No layout is computed here. Rectangles, line heights and font sizes come
//! from the `LayoutMetrics` implementation the host supplies.

pub mod metrics;
pub mod node;
pub mod range;

pub use metrics::{LayoutMetrics, MonospaceMetrics, Rect};
pub use node::{Dom, DomError, NodeId, NodeKind};
pub use range::{Boundary, SelectionState};
