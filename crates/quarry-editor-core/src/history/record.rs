//! Snapshot building and recording.

use crate::markers;
use crate::snapshot::DocumentSnapshot;

use super::{HistoryEngine, HistoryEntry};

impl HistoryEngine {
    /// Capture the document once as the bottom of the undo stack. Idempotent.
    pub fn capture_initial_state(&mut self) {
        if self.destroyed || self.initial_captured {
            return;
        }
        self.initial_captured = true;
        let snapshot = self.build_snapshot();
        tracing::debug!(target: "quarry::history", blocks = snapshot.len(), "initial state");
        self.undo_stack = vec![HistoryEntry {
            snapshot,
            caret: None,
            created: self.clock.now(),
        }];
        self.redo_stack.clear();
        self.emit_state_changed();
    }

    /// Record the current document as a new history entry.
    ///
    /// `scheduled_generation` tags recordings that were scheduled earlier
    /// (debounce); a recording whose generation no longer matches is stale -
    /// a batch closed in between - and is dropped.
    pub fn record_state(&mut self, scheduled_generation: Option<u64>) {
        if self.destroyed || self.restoring {
            return;
        }
        if self.batch_depth > 0 {
            return;
        }
        if let Some(generation) = scheduled_generation {
            if generation != self.batch_generation {
                tracing::trace!(
                    target: "quarry::history",
                    scheduled = generation,
                    current = self.batch_generation,
                    "stale recording dropped"
                );
                return;
            }
        }

        // Highlights must never persist into a snapshot. The one exception:
        // an inline-tool input is focused, meaning the highlight is exactly
        // what the user is working with.
        let inline_tool_focused = {
            let dom = self.dom.borrow();
            dom.focused()
                .and_then(|node| dom.closest_with_attr(node, markers::INLINE_TOOL_INPUT))
                .is_some()
        };
        if !inline_tool_focused {
            let mut dom = self.dom.borrow_mut();
            self.fake_background.clear(&mut dom);
        }

        let snapshot = self.build_snapshot();

        // Consume the pre-action caret: it belongs on the *previous* entry,
        // so undoing back to it lands where the user triggered this change.
        let caret = self.pending_caret.take();
        self.has_captured_group_position = false;
        self.keydown_captured_position = false;
        if let Some(caret) = caret {
            if let Some(tail) = self.undo_stack.last_mut() {
                tail.caret = Some(caret);
            }
        }

        if let Some(tail) = self.undo_stack.last() {
            if tail.snapshot == snapshot {
                return;
            }
        }

        self.redo_stack.clear();
        tracing::debug!(
            target: "quarry::history",
            blocks = snapshot.len(),
            depth = self.undo_stack.len() + 1,
            "state recorded"
        );
        self.undo_stack.push(HistoryEntry {
            snapshot,
            caret: None,
            created: self.clock.now(),
        });
        while self.undo_stack.len() > self.config.max_history_length {
            self.undo_stack.remove(0);
        }
        self.emit_state_changed();
    }

    /// Serialize the live document. Blocks whose tool fails to save, or
    /// rejects its own output, are dropped. A document of exactly one empty
    /// block collapses to an empty list.
    pub(super) fn build_snapshot(&self) -> DocumentSnapshot {
        let blocks = self.host.blocks().blocks();
        let mut saved = Vec::with_capacity(blocks.len());
        for block in &blocks {
            let Some(record) = block.save() else {
                tracing::trace!(target: "quarry::history", block = %block.id(), "save failed, dropped");
                continue;
            };
            if !block.validate(&record.data) {
                tracing::trace!(target: "quarry::history", block = %block.id(), "invalid, dropped");
                continue;
            }
            saved.push(record);
        }

        if saved.len() == 1 {
            let only = &saved[0];
            let is_empty = blocks
                .iter()
                .find(|b| b.id() == only.id)
                .map(|b| b.is_empty())
                .unwrap_or(false);
            if is_empty {
                saved.clear();
            }
        }
        DocumentSnapshot::new(saved)
    }
}
