//! Attribute markers shared between the core and the host DOM.
//!
//! Values are part of the host contract: hosts stamp them onto the nodes
//! they own, the core reads them back during hit-testing and cleanup.

/// The editor's redactor root. "Selection is at editor" means the anchor has
/// an ancestor carrying this attribute.
pub const EDITOR_ROOT: &str = "data-editor-root";

/// Outer wrapper of a single block.
pub const BLOCK_WRAPPER: &str = "data-block-wrapper";

/// Content node of a block.
pub const BLOCK: &str = "data-block";

/// Stable block identifier, stamped on the block wrapper.
pub const BLOCK_ID: &str = "data-id";

/// Zero-width span preserving a visible insertion point while the editor is
/// not focused.
pub const FAKE_CURSOR: &str = "data-fake-cursor";

/// Highlight span rendered by the fake-background renderer.
pub const FAKE_BACKGROUND: &str = "data-fake-background";

/// Nodes whose mutations the modifications observer must ignore.
pub const MUTATION_FREE: &str = "data-mutation-free";

/// Inputs belonging to inline tools (link fields and the like). While one is
/// focused the fake background survives snapshot recording.
pub const INLINE_TOOL_INPUT: &str = "data-inline-tool-input";

/// Editable input inside a block.
pub const BLOCK_INPUT: &str = "data-block-input";
