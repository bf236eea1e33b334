//! Snapshot-based undo/redo engine.
//!
//! The engine records document snapshots on mutation, coalesced by a
//! debounce window and the grouping policy, batches explicit transactions
//! into single entries, and restores earlier states through a structural
//! diff followed by a caret fallback cascade.
//!
//! The host drives it: `BlockChanged` notifications arrive through
//! [`HistoryEngine::handle_block_changed`], keyboard and selection events
//! through `observe_keydown` / `handle_selection_change`, and the debounce
//! deadline through [`HistoryEngine::poll`] from the host's event loop.
//!
//! Every public operation is fail-soft: it returns a `bool` or nothing, and
//! never panics or propagates an error.

mod caret;
mod record;
mod restore;


use std::cell::RefCell;
use std::rc::Rc;

use quarry_dom::{Dom, LayoutMetrics, NodeId};
use web_time::Instant;

pub use caret::CaretPosition;

use crate::config::HistoryConfig;
use crate::events::{EditorEvent, EventBus, EventTopic};
use crate::fake_background::FakeBackground;
use crate::grouping::{ActionContext, ActionKind, GroupingPolicy};
use crate::host::{Clock, EditorCoordinator, EditorHost};
use crate::keys::{HistoryChord, Key, Modifiers};
use crate::snapshot::DocumentSnapshot;

/// One step of history: a snapshot plus the caret position the user was at
/// while this snapshot was the live state (recorded just before the action
/// that produced the next entry).
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub snapshot: DocumentSnapshot,
    pub caret: Option<CaretPosition>,
    pub created: Instant,
}

/// Pending debounced recording. The generation tag invalidates it when a
/// batch closes between scheduling and dispatch.
#[derive(Debug, Clone, Copy)]
struct Debounce {
    deadline: Instant,
    generation: u64,
}

pub struct HistoryEngine {
    config: HistoryConfig,
    dom: Rc<RefCell<Dom>>,
    metrics: Rc<dyn LayoutMetrics>,
    host: Rc<dyn EditorHost>,
    events: Rc<EventBus>,
    clock: Rc<dyn Clock>,
    coordinator: Rc<EditorCoordinator>,
    engine_id: u64,

    fake_background: FakeBackground,

    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    initial_captured: bool,
    restoring: bool,
    cooldown_until: Option<Instant>,

    batch_depth: usize,
    batch_has_mutations: bool,
    batch_generation: u64,
    batch_caret: Option<CaretPosition>,

    debounce: Option<Debounce>,
    last_mutation_at: Option<Instant>,
    grouping: GroupingPolicy,

    pending_caret: Option<CaretPosition>,
    has_captured_group_position: bool,
    keydown_captured_position: bool,
    pending_action: Option<(ActionKind, Option<char>)>,

    prepared: bool,
    destroyed: bool,
}

impl HistoryEngine {
    pub fn new(
        config: HistoryConfig,
        dom: Rc<RefCell<Dom>>,
        metrics: Rc<dyn LayoutMetrics>,
        host: Rc<dyn EditorHost>,
        events: Rc<EventBus>,
        clock: Rc<dyn Clock>,
        coordinator: Rc<EditorCoordinator>,
    ) -> Self {
        let engine_id = coordinator.assign_id();
        Self {
            config,
            dom,
            metrics,
            host,
            events,
            clock,
            coordinator,
            engine_id,
            fake_background: FakeBackground::new(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            initial_captured: false,
            restoring: false,
            cooldown_until: None,
            batch_depth: 0,
            batch_has_mutations: false,
            batch_generation: 0,
            batch_caret: None,
            debounce: None,
            last_mutation_at: None,
            grouping: GroupingPolicy::new(),
            pending_caret: None,
            has_captured_group_position: false,
            keydown_captured_position: false,
            pending_action: None,
            prepared: false,
            destroyed: false,
        }
    }

    // === Public contract ===

    pub fn can_undo(&self) -> bool {
        self.undo_stack.len() >= 2
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Snapshot at the tail of the undo stack - the current document state.
    pub fn current_snapshot(&self) -> Option<&DocumentSnapshot> {
        self.undo_stack.last().map(|e| &e.snapshot)
    }

    pub fn generation(&self) -> u64 {
        self.batch_generation
    }

    /// Register the undo/redo chords. Hosts call this once the UI nodes
    /// exist; registration is skipped silently when the target node is not
    /// attached yet.
    pub fn prepare(&mut self) {
        if self.destroyed {
            return;
        }
        let target = self.shortcut_target();
        if !self.dom.borrow().is_attached(target) {
            tracing::debug!(target: "quarry::history", "shortcut target not attached, skipping");
            return;
        }
        for chord in HistoryChord::ALL {
            let combo = chord.combo(self.host.is_mac());
            // Defensive: drop a stale duplicate before binding.
            self.host.shortcuts().unregister(combo.clone(), target);
            self.host.shortcuts().register(combo, target);
        }
        self.prepared = true;
    }

    /// Undo one step. Fails soft when there is nothing below the current
    /// state or while a restore is already running.
    pub fn undo(&mut self) -> bool {
        if self.destroyed || self.restoring {
            return false;
        }
        // A pending debounce means the tail no longer matches the live
        // document; record it first so one undo reverts the latest typing.
        self.flush_debounce();
        if self.undo_stack.len() < 2 {
            return false;
        }
        self.restoring = true;

        let popped = match self.undo_stack.pop() {
            Some(entry) => entry,
            None => {
                self.restoring = false;
                return false;
            }
        };
        let fallback_caret = popped.caret.clone();
        self.redo_stack.push(popped);

        let target = self
            .undo_stack
            .last()
            .map(|e| (e.snapshot.clone(), e.caret.clone()));
        let Some((snapshot, desired_caret)) = target else {
            self.restoring = false;
            return false;
        };

        tracing::debug!(target: "quarry::history", depth = self.undo_stack.len(), "undo");
        let fallback_index = self.apply_snapshot(&snapshot);
        self.restore_caret(desired_caret, fallback_index, fallback_caret);
        self.finish_restore();
        true
    }

    /// Redo the most recently undone step. Fails soft when the redo stack is
    /// empty or while restoring.
    pub fn redo(&mut self) -> bool {
        if self.destroyed || self.restoring || self.redo_stack.is_empty() {
            return false;
        }
        self.restoring = true;
        self.clear_debounce();

        let entry = match self.redo_stack.pop() {
            Some(entry) => entry,
            None => {
                self.restoring = false;
                return false;
            }
        };
        let fallback_caret = self.undo_stack.last().and_then(|e| e.caret.clone());
        let desired_caret = entry.caret.clone();

        tracing::debug!(target: "quarry::history", depth = self.undo_stack.len() + 1, "redo");
        let fallback_index = self.apply_snapshot(&entry.snapshot);
        self.undo_stack.push(entry);
        self.restore_caret(desired_caret, fallback_index, fallback_caret);
        self.finish_restore();
        true
    }

    fn finish_restore(&mut self) {
        {
            let mut dom = self.dom.borrow_mut();
            self.fake_background.clear(&mut dom);
        }
        let now = self.clock.now();
        self.cooldown_until = Some(now + self.config.restore_cooldown);
        self.restoring = false;
        self.emit_state_changed();
    }

    /// Empty both stacks and forget all grouping state.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.initial_captured = false;
        self.clear_debounce();
        self.last_mutation_at = None;
        self.grouping.reset();
        self.pending_caret = None;
        self.has_captured_group_position = false;
        self.keydown_captured_position = false;
        self.pending_action = None;
        self.emit_state_changed();
    }

    /// Tear down: deregister chords, drop timers, release the active-instance
    /// slot, empty the stacks. Further calls on the engine are no-ops.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        if self.prepared {
            let target = self.shortcut_target();
            for chord in HistoryChord::ALL {
                self.host
                    .shortcuts()
                    .unregister(chord.combo(self.host.is_mac()), target);
            }
        }
        self.clear_debounce();
        self.coordinator.clear_if(self.engine_id);
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.destroyed = true;
    }

    // === Batching ===

    /// Open a batch scope; nested calls stack. The outermost start captures
    /// the pre-batch caret and clears any pending debounce.
    pub fn start_batch(&mut self) {
        if self.destroyed {
            return;
        }
        if self.batch_depth == 0 {
            self.clear_debounce();
            self.batch_caret = self.capture_caret_now();
            self.batch_has_mutations = false;
        }
        self.batch_depth += 1;
    }

    /// Close a batch scope. Every close advances the generation counter;
    /// only the outermost close records, and only if the batch saw at least
    /// one mutation. An unmatched call is ignored.
    pub fn end_batch(&mut self) {
        if self.destroyed || self.batch_depth == 0 {
            return;
        }
        self.batch_depth -= 1;
        self.batch_generation += 1;
        if self.batch_depth > 0 {
            return;
        }
        if !self.batch_has_mutations {
            self.batch_caret = None;
            return;
        }
        self.batch_has_mutations = false;
        if !self.initial_captured {
            self.capture_initial_state();
            return;
        }
        if let Some(caret) = self.batch_caret.take() {
            self.pending_caret = Some(caret);
            self.has_captured_group_position = true;
        }
        self.record_state(None);
        self.grouping.reset_pending();
    }

    /// Group every mutation performed by `f` into a single undo step.
    pub fn transaction(&mut self, f: impl FnOnce(&mut Self)) {
        self.start_batch();
        f(self);
        self.end_batch();
    }

    // === Mutation intake ===

    /// Wire the engine to the editor's event dispatcher so `BlockChanged`
    /// events drive mutation intake. The subscription holds a weak reference
    /// and skips delivery while the engine is already borrowed, so the bus
    /// never keeps a dead engine alive or re-enters a running operation.
    pub fn attach(engine: &Rc<RefCell<HistoryEngine>>) {
        let weak = Rc::downgrade(engine);
        let events = engine.borrow().events.clone();
        events.on(EventTopic::BlockChanged, move |event| {
            let EditorEvent::BlockChanged { block_id } = event else {
                return;
            };
            if let Some(engine) = weak.upgrade() {
                if let Ok(mut engine) = engine.try_borrow_mut() {
                    engine.handle_block_changed(block_id);
                }
            }
        });
    }

    /// A tool mutated a block. Consults the grouping policy and either
    /// records immediately or (re)schedules the debounced recording.
    pub fn handle_block_changed(&mut self, block_id: &str) {
        if self.destroyed {
            return;
        }
        self.coordinator.set_active(self.engine_id);
        let now = self.clock.now();
        if self.restoring || self.in_cooldown(now) {
            return;
        }
        if !self.initial_captured {
            self.capture_initial_state();
            return;
        }
        if self.batch_depth > 0 {
            self.batch_has_mutations = true;
            return;
        }

        // A typing pause promotes the last recorded state to a checkpoint
        // boundary: nothing is recorded now (the document already mutated),
        // the open group just ends here.
        if let Some(last) = self.last_mutation_at {
            if now.duration_since(last) > self.config.new_group_delay {
                tracing::trace!(target: "quarry::history", block = block_id, "pause checkpoint");
                self.clear_debounce();
                self.grouping.reset_pending();
                let (kind, inserted) = self.take_pending_action();
                self.grouping.observe(ActionContext {
                    kind,
                    block_id: block_id.into(),
                    at: now,
                    inserted,
                });
                self.start_debounce(now);
                self.last_mutation_at = Some(now);
                return;
            }
        }
        self.last_mutation_at = Some(now);

        let (kind, inserted) = self.take_pending_action();
        let should = self.grouping.should_create_checkpoint(kind, block_id);
        let immediate = kind.is_immediate_checkpoint();
        if should || immediate {
            tracing::debug!(
                target: "quarry::history",
                block = block_id,
                ?kind,
                grouped = self.grouping.pending_actions(),
                "checkpoint"
            );
            self.clear_debounce();
            let generation = self.batch_generation;
            self.record_state(Some(generation));
            self.grouping.reset_pending();
        }
        self.grouping.observe(ActionContext {
            kind,
            block_id: block_id.into(),
            at: now,
            inserted,
        });
        self.start_debounce(now);
    }

    /// Classify an API-driven action (format, paste, cut, structural) for the
    /// next `BlockChanged` it produces.
    pub fn note_action(&mut self, kind: ActionKind) {
        if self.destroyed {
            return;
        }
        self.pending_action = Some((kind, None));
    }

    fn take_pending_action(&mut self) -> (ActionKind, Option<char>) {
        self.pending_action.take().unwrap_or((ActionKind::Insert, None))
    }

    // === Debounce ===

    fn start_debounce(&mut self, now: Instant) {
        self.debounce = Some(Debounce {
            deadline: now + self.config.debounce_time,
            generation: self.batch_generation,
        });
    }

    fn clear_debounce(&mut self) {
        self.debounce = None;
    }

    /// Record now whatever the debounce would have recorded at its deadline.
    fn flush_debounce(&mut self) {
        if let Some(debounce) = self.debounce.take() {
            self.record_state(Some(debounce.generation));
            self.grouping.reset_pending();
        }
    }

    /// Host event-loop tick: fire the debounced recording once its deadline
    /// passes. Returns whether a recording was dispatched.
    pub fn poll(&mut self) -> bool {
        if self.destroyed {
            return false;
        }
        let now = self.clock.now();
        match self.debounce {
            Some(debounce) if now >= debounce.deadline => {
                self.debounce = None;
                self.record_state(Some(debounce.generation));
                self.grouping.reset_pending();
                true
            }
            _ => false,
        }
    }

    fn in_cooldown(&self, now: Instant) -> bool {
        self.cooldown_until.map(|until| now < until).unwrap_or(false)
    }

    // === Shortcuts ===

    fn shortcut_target(&self) -> NodeId {
        if self.config.global_undo_redo {
            self.dom.borrow().root()
        } else {
            self.host.ui().editor_root()
        }
    }

    /// A registered chord fired. `target` is the event target for the
    /// foreign-control guard; routing between coexisting editors goes
    /// through the coordinator.
    pub fn handle_shortcut(&mut self, chord: HistoryChord, target: Option<NodeId>) -> bool {
        if self.destroyed {
            return false;
        }
        if let Some(node) = target {
            let editor_root = self.host.ui().editor_root();
            let dom = self.dom.borrow();
            if !dom.contains(editor_root, node) {
                // Native form controls and foreign editables keep their own
                // undo behavior.
                if dom.is_native_input(node) {
                    return false;
                }
                let foreign_editable = dom
                    .closest(node, usize::MAX, |d, n| {
                        d.attr(n, "contenteditable") == Some("true")
                    })
                    .is_some();
                if foreign_editable {
                    return false;
                }
            }
        }
        if self.config.global_undo_redo && !self.coordinator.is_active(self.engine_id) {
            return false;
        }
        match chord {
            HistoryChord::Undo => self.undo(),
            HistoryChord::RedoShift | HistoryChord::RedoY => self.redo(),
        }
    }

    /// Convenience for hosts forwarding raw key events: resolve a chord and
    /// handle it.
    pub fn handle_key_chord(
        &mut self,
        key: &Key,
        modifiers: Modifiers,
        target: Option<NodeId>,
    ) -> bool {
        match HistoryChord::from_event(key, modifiers, self.host.is_mac()) {
            Some(chord) => self.handle_shortcut(chord, target),
            None => false,
        }
    }

    // === Fake background (the selection API surface) ===

    /// Reify the current selection as a visible highlight.
    pub fn set_fake_background(&mut self) {
        let mut dom = self.dom.borrow_mut();
        self.fake_background.set(&mut dom, &*self.metrics);
    }

    /// Unwrap the highlight and keep the range it covered.
    pub fn remove_fake_background(&mut self) {
        let mut dom = self.dom.borrow_mut();
        self.fake_background.remove(&mut dom);
    }

    /// Unconditionally drop every highlight span. Idempotent.
    pub fn clear_fake_background(&mut self) {
        let mut dom = self.dom.borrow_mut();
        self.fake_background.clear(&mut dom);
    }

    pub fn fake_background_active(&self) -> bool {
        self.fake_background.is_active()
    }

    // === Internals shared with submodules ===

    fn emit_state_changed(&self) {
        self.events.emit(&EditorEvent::UndoRedoStateChanged {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
        });
    }
}

impl Drop for HistoryEngine {
    fn drop(&mut self) {
        self.destroy();
    }
}
