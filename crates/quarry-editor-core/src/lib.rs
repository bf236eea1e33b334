//! quarry-editor-core: the undo/redo core of the quarry block editor.
//!
//! This crate provides:
//! - `history::HistoryEngine` - snapshot-based undo/redo with debounced
//!   grouping, batch transactions and caret restoration
//! - `grouping` - the checkpoint policy deciding when edits stop coalescing
//! - `selection` - stateless helpers over the platform selection
//! - `fake_background::FakeBackground` - visible selection highlight kept
//!   alive while focus is elsewhere
//! - `cross_block::CrossBlockSelection` - drag / shift+arrow selection
//!   spanning multiple blocks
//! - `host` - the contracts the embedding editor implements
//!
//! Everything is single-threaded and host-driven: the embedding editor owns
//! the event loop and pumps events (and `HistoryEngine::poll`) into the core.

pub mod config;
pub mod cross_block;
pub mod events;
pub mod fake_background;
pub mod grouping;
pub mod history;
pub mod host;
pub mod keys;
pub mod markers;
pub mod selection;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::HistoryConfig;
pub use cross_block::{
    ClearReason, CrossBlockSelection, ExtendDirection, PointerButton, PointerEvent,
};
pub use events::{EditorEvent, EventBus, EventTopic};
pub use fake_background::FakeBackground;
pub use grouping::{ActionContext, ActionKind, GroupingPolicy};
pub use history::{CaretPosition, HistoryEngine, HistoryEntry};
pub use host::{
    Block, BlockManager, CaretHelper, CaretPlacement, Clock, EditorCoordinator, EditorHost,
    EditorUi, InsertBlockRequest, ModificationsObserver, Renderer, ShortcutRegistrar, SystemClock,
};
pub use keys::{HistoryChord, Key, KeyCombo, Modifiers};
pub use snapshot::{DocumentSnapshot, SavedBlock};
