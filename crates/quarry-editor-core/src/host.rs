//! Contracts the embedding editor implements for the core.
//!
//! The core never owns blocks, rendering or toolbars; it drives them through
//! these traits. Everything is single-threaded: implementations use interior
//! mutability (`RefCell`) behind `&self` methods, mirroring how the original
//! platform objects behaved.

use std::cell::Cell;
use std::rc::Rc;

use quarry_dom::NodeId;
use serde_json::Value;
use smol_str::SmolStr;
use web_time::Instant;

use crate::keys::KeyCombo;
use crate::snapshot::SavedBlock;

/// Where to land the caret inside a block or input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaretPlacement {
    Start,
    End,
    /// The tool's own preference.
    Default,
}

/// One block instance of the live document.
///
/// `save`/`validate`/`set_data` are the tool seam: `save` returning `None`
/// covers both a failing tool and one that produced nothing; either way the
/// block is dropped from the snapshot being built.
pub trait Block {
    fn id(&self) -> SmolStr;
    fn tool(&self) -> SmolStr;

    /// Outer wrapper node of the block.
    fn holder(&self) -> NodeId;
    /// Editable inputs in order.
    fn inputs(&self) -> Vec<NodeId>;
    fn current_input(&self) -> Option<NodeId>;

    fn focusable(&self) -> bool;
    /// True once the tool finished mounting. The caret cascade polls this
    /// and re-resolves the block afterwards.
    fn is_ready(&self) -> bool;
    /// True for a block a user would consider empty (used to collapse the
    /// single-empty-block document to an empty snapshot).
    fn is_empty(&self) -> bool;

    /// Cross-block selection flag.
    fn selected(&self) -> bool;
    fn set_selected(&self, selected: bool);

    fn save(&self) -> Option<SavedBlock>;
    fn validate(&self, data: &Value) -> bool;
    /// In-place data update; `false` means the tool could not apply it and
    /// the caller should fall back to a full block update.
    fn set_data(&self, data: &Value) -> bool;
}

/// Insertion request for [`BlockManager::insert`].
#[derive(Debug, Clone)]
pub struct InsertBlockRequest {
    pub id: SmolStr,
    pub tool: SmolStr,
    pub data: Value,
    pub tunes: Option<Value>,
    pub index: usize,
    pub need_to_focus: bool,
}

/// The host's ordered block list.
pub trait BlockManager {
    fn blocks(&self) -> Vec<Rc<dyn Block>>;
    fn block_count(&self) -> usize {
        self.blocks().len()
    }
    fn get_block_by_id(&self, id: &str) -> Option<Rc<dyn Block>>;
    fn get_block_by_index(&self, index: usize) -> Option<Rc<dyn Block>>;
    /// Resolve the block owning an arbitrary node of its subtree.
    fn get_block_by_child_node(&self, node: NodeId) -> Option<Rc<dyn Block>>;
    fn get_block_index(&self, id: &str) -> Option<usize>;
    fn current_block(&self) -> Option<Rc<dyn Block>>;

    fn insert(&self, request: InsertBlockRequest) -> Option<Rc<dyn Block>>;
    /// Full block update with fresh data and tunes.
    fn update(&self, block: &Rc<dyn Block>, data: &Value, tunes: Option<&Value>);
    fn remove_block(&self, index: usize);
    fn move_block(&self, to_index: usize, from_index: usize);
    /// Remove every block.
    fn clear(&self);

    /// Drop any memoized "some block is selected" state. Default no-op for
    /// hosts that do not cache it.
    fn clear_selection_cache(&self) {}
}

/// Renders a block list from saved records (full re-render path).
pub trait Renderer {
    fn render(&self, blocks: &[SavedBlock]);
}

/// The host's DOM mutation observer. Disabled around restores so applying a
/// snapshot does not re-enter mutation handling.
pub trait ModificationsObserver {
    fn enable(&self);
    fn disable(&self);
}

/// Host caret placement helper.
pub trait CaretHelper {
    fn set_to_block(&self, block: &Rc<dyn Block>, placement: CaretPlacement) -> bool;
    /// Place the caret in an input at a character offset. `false` when the
    /// offset cannot be honored (caller falls back to the input's end).
    fn set_to_input(&self, input: NodeId, placement: CaretPlacement, offset: usize) -> bool;
}

/// The host UI namespace: root nodes, toolbars, hover control.
pub trait EditorUi {
    /// The redactor root (carries the editor-root marker attribute).
    fn editor_root(&self) -> NodeId;
    /// Outermost editor wrapper (pointer events are judged against it).
    fn wrapper(&self) -> NodeId;
    /// Toolbar container, used for pointer hit-exclusion.
    fn toolbar_wrapper(&self) -> Option<NodeId>;

    fn some_toolbar_opened(&self) -> bool;
    fn drag_in_progress(&self) -> bool {
        false
    }

    /// Suppress hover re-positioning briefly so stale pointer-moves cannot
    /// move a toolbar that was just opened.
    fn disable_hover_for_cooldown(&self);
    fn open_multi_block_toolbar(&self);
    fn close_inline_toolbar(&self);
    fn scroll_into_view(&self, _node: NodeId) {}
}

/// Chord registration against a target node (editor root or document root).
pub trait ShortcutRegistrar {
    fn register(&self, combo: KeyCombo, target: NodeId);
    fn unregister(&self, combo: KeyCombo, target: NodeId);
}

/// Everything the history engine needs from its host, in one place.
pub trait EditorHost {
    fn blocks(&self) -> &dyn BlockManager;
    fn renderer(&self) -> &dyn Renderer;
    fn observer(&self) -> &dyn ModificationsObserver;
    fn caret(&self) -> &dyn CaretHelper;
    fn ui(&self) -> &dyn EditorUi;
    fn shortcuts(&self) -> &dyn ShortcutRegistrar;

    fn is_mac(&self) -> bool {
        false
    }
}

/// Injectable time source; the engine never calls `Instant::now` directly so
/// debounce windows are deterministic under test.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall-clock implementation for production hosts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Arbitrates which engine answers document-level shortcuts when several
/// editors share a page. The engine that most recently saw a mutation wins.
#[derive(Debug, Default)]
pub struct EditorCoordinator {
    active: Cell<Option<u64>>,
    next_id: Cell<u64>,
}

impl EditorCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out a unique engine id.
    pub fn assign_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    pub fn set_active(&self, engine_id: u64) {
        self.active.set(Some(engine_id));
    }

    /// True when this engine should answer a routed shortcut: it is the
    /// active instance, or no instance has seen a mutation yet.
    pub fn is_active(&self, engine_id: u64) -> bool {
        match self.active.get() {
            Some(active) => active == engine_id,
            None => true,
        }
    }

    /// Unassign on engine teardown, only if this engine held the slot.
    pub fn clear_if(&self, engine_id: u64) {
        if self.active.get() == Some(engine_id) {
            self.active.set(None);
        }
    }
}
