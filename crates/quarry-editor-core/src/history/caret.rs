//! Pre-mutation caret capture.
//!
//! The keydown path is primary: the first mutation-producing key of a group
//! captures the caret, and that position is held until a snapshot actually
//! records. The selection-change path is the fallback for mutations that
//! arrive without a keydown (context-menu paste, drag-and-drop); it is
//! skipped whenever keydown already captured, because selection-change fires
//! after the mutation and would report a post-mutation position.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::grouping::ActionKind;
use crate::keys::{HistoryChord, Key, Modifiers};
use crate::selection;

use super::HistoryEngine;

/// Where the caret was: block (by id, with the index as a fallback for when
/// the id no longer resolves after a restore), input within the block, and
/// the character offsets. A collapsed caret carries no `end_offset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaretPosition {
    pub block_id: SmolStr,
    pub block_index: usize,
    pub input_index: usize,
    pub offset: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_offset: Option<usize>,
}

impl CaretPosition {
    pub fn is_collapsed(&self) -> bool {
        match self.end_offset {
            None => true,
            Some(end) => end == self.offset,
        }
    }
}

/// Which action a mutation-producing key implies; `None` for keys that do
/// not mutate (navigation, function keys, chorded input).
fn classify_mutation_key(key: &Key, modifiers: Modifiers) -> Option<(ActionKind, Option<char>)> {
    match key {
        Key::Backspace => Some((ActionKind::DeleteBack, None)),
        Key::Delete => Some((ActionKind::DeleteForward, None)),
        Key::Enter => Some((ActionKind::Structural, None)),
        Key::Character(_) if !modifiers.has_command() => {
            Some((ActionKind::Insert, key.as_char()))
        }
        _ => None,
    }
}

impl HistoryEngine {
    /// Capture-phase keydown on the editor root.
    ///
    /// Modifier-only keys and the undo/redo chords are ignored; navigation
    /// keys are deliberately not captured here (their effect arrives through
    /// the selection-change path). The first mutation-producing key of a
    /// group pins the pre-action caret; later keys only refresh the action
    /// classification.
    pub fn observe_keydown(&mut self, key: &Key, modifiers: Modifiers) {
        if self.destroyed || self.restoring {
            return;
        }
        if key.is_modifier() {
            return;
        }
        if HistoryChord::from_event(key, modifiers, self.host.is_mac()).is_some() {
            return;
        }
        let Some(action) = classify_mutation_key(key, modifiers) else {
            return;
        };

        if !self.has_captured_group_position {
            if let Some(position) = self.capture_caret_now() {
                tracing::trace!(target: "quarry::history", ?position, "caret captured (keydown)");
                self.pending_caret = Some(position);
            }
            self.has_captured_group_position = true;
            self.keydown_captured_position = true;
        }
        self.pending_action = Some(action);
    }

    /// Document selection-change: fallback caret capture for mutations that
    /// have no keydown.
    pub fn handle_selection_change(&mut self) {
        if self.destroyed || self.restoring {
            return;
        }
        if self.keydown_captured_position {
            return;
        }
        let at_editor = {
            let dom = self.dom.borrow();
            selection::is_selection_at_editor(&dom)
        };
        if !at_editor {
            return;
        }
        if let Some(position) = self.capture_caret_now() {
            self.pending_caret = Some(position);
        }
    }

    /// Derive the caret from the live selection: owning block, owning input,
    /// character offsets at both ends.
    pub(super) fn capture_caret_now(&self) -> Option<CaretPosition> {
        let dom = self.dom.borrow();
        let selection = *dom.selection()?;
        let (start, _) = selection.normalized(&dom);

        let block = self.host.blocks().get_block_by_child_node(start.node)?;
        let block_index = self.host.blocks().get_block_index(&block.id())?;
        let inputs = block.inputs();
        let input_index = inputs
            .iter()
            .position(|&input| dom.contains(input, start.node))?;
        let input = inputs[input_index];

        let offset = selection::offset_in_input(&dom, input, false);
        let end = selection::offset_in_input(&dom, input, true);
        Some(CaretPosition {
            block_id: block.id(),
            block_index,
            input_index,
            offset,
            end_offset: (end != offset).then_some(end),
        })
    }
}
