//! Snapshot restoration: structural diff against the live document, then the
//! caret fallback cascade.

use std::collections::HashSet;
use std::rc::Rc;

use quarry_dom::{Boundary, Dom, NodeId};
use smol_str::SmolStr;

use crate::host::{CaretPlacement, InsertBlockRequest};
use crate::snapshot::DocumentSnapshot;

use super::{CaretPosition, HistoryEngine};

impl HistoryEngine {
    /// Apply `target` with minimal churn. The modifications observer is
    /// disabled for the whole pass. Returns the fallback block index for the
    /// caret cascade (one less than the lowest removed index), when blocks
    /// were removed incrementally.
    pub(super) fn apply_snapshot(&mut self, target: &DocumentSnapshot) -> Option<usize> {
        self.host.observer().disable();
        let fallback_index = self.apply_snapshot_inner(target);
        self.host.observer().enable();
        fallback_index
    }

    fn apply_snapshot_inner(&mut self, target: &DocumentSnapshot) -> Option<usize> {
        let manager = self.host.blocks();
        let current = manager.blocks();

        let target_ids: HashSet<SmolStr> = target.blocks.iter().map(|b| b.id.clone()).collect();
        let current_ids: HashSet<SmolStr> = current.iter().map(|b| b.id()).collect();

        let to_remove: Vec<SmolStr> = current
            .iter()
            .map(|b| b.id())
            .filter(|id| !target_ids.contains(id))
            .collect();
        let to_add = target
            .blocks
            .iter()
            .filter(|b| !current_ids.contains(&b.id))
            .count();

        // Too much churn, or nothing on screen: full re-render.
        let changes = to_remove.len() + to_add;
        if current.is_empty() || changes > (current.len() / 2).max(5) {
            tracing::debug!(target: "quarry::history", changes, "full re-render restore");
            manager.clear();
            self.host.renderer().render(&target.blocks);
            return None;
        }

        // Removals first; remember where the caret could fall back to.
        let mut lowest_removed: Option<usize> = None;
        for id in &to_remove {
            if let Some(index) = manager.get_block_index(id) {
                lowest_removed = Some(lowest_removed.map_or(index, |low| low.min(index)));
                manager.remove_block(index);
            }
        }

        // In-place updates where the serialized data differs.
        for saved in &target.blocks {
            let Some(block) = manager.get_block_by_id(&saved.id) else {
                continue;
            };
            if block.tool() != saved.tool {
                // Same id, different tool: the block must be rebuilt.
                if let Some(index) = manager.get_block_index(&saved.id) {
                    manager.remove_block(index);
                    manager.insert(InsertBlockRequest {
                        id: saved.id.clone(),
                        tool: saved.tool.clone(),
                        data: saved.data.clone(),
                        tunes: saved.tunes.clone(),
                        index,
                        need_to_focus: false,
                    });
                }
                continue;
            }
            let unchanged = block
                .save()
                .map(|live| live.data == saved.data)
                .unwrap_or(false);
            if unchanged {
                continue;
            }
            if !block.set_data(&saved.data) {
                manager.update(&block, &saved.data, saved.tunes.as_ref());
            }
        }

        // Insert what the target has and the document lacks, at target
        // position, without stealing focus.
        for (index, saved) in target.blocks.iter().enumerate() {
            if current_ids.contains(&saved.id) {
                continue;
            }
            manager.insert(InsertBlockRequest {
                id: saved.id.clone(),
                tool: saved.tool.clone(),
                data: saved.data.clone(),
                tunes: saved.tunes.clone(),
                index,
                need_to_focus: false,
            });
        }

        // Settle order by walking the target list. Quadratic, but bounded by
        // history-sized documents.
        for (index, saved) in target.blocks.iter().enumerate() {
            if let Some(current_index) = manager.get_block_index(&saved.id) {
                if current_index != index {
                    manager.move_block(index, current_index);
                }
            }
        }

        lowest_removed.map(|low| low.saturating_sub(1))
    }

    /// The caret fallback cascade.
    ///
    /// `desired` is the restored entry's caret; `fallback_index` comes from
    /// the diff (removals); `fallback_caret` is the caret of the entry the
    /// document just left.
    pub(super) fn restore_caret(
        &mut self,
        desired: Option<CaretPosition>,
        fallback_index: Option<usize>,
        fallback_caret: Option<CaretPosition>,
    ) {
        let Some(position) = desired else {
            self.restore_caret_fallback(fallback_index, fallback_caret);
            return;
        };

        let manager = self.host.blocks();
        let Some(mut block) = manager.get_block_by_id(&position.block_id) else {
            // The block did not survive the restore.
            let index = fallback_index.unwrap_or(position.block_index);
            let target = manager
                .get_block_by_index(index)
                .or_else(|| manager.get_block_by_index(position.block_index));
            if let Some(target) = target {
                self.host.caret().set_to_block(&target, CaretPlacement::End);
            }
            return;
        };

        // The instance may be replaced while it becomes ready; re-resolve
        // and settle on a ready instance.
        for _ in 0..2 {
            let Some(fresh) = manager.get_block_by_id(&position.block_id) else {
                let index = fallback_index.unwrap_or(position.block_index);
                if let Some(target) = manager.get_block_by_index(index) {
                    self.host.caret().set_to_block(&target, CaretPlacement::End);
                }
                return;
            };
            let same = Rc::ptr_eq(&fresh, &block);
            block = fresh;
            if same && block.is_ready() {
                break;
            }
        }

        let inputs = block.inputs();
        if inputs.is_empty() {
            self.host.caret().set_to_block(&block, CaretPlacement::End);
            return;
        }
        let input = inputs[position.input_index.min(inputs.len() - 1)];

        let placed = match position.end_offset {
            Some(end) if end != position.offset => {
                self.select_range_in_input(input, position.offset, end)
            }
            _ => self
                .host
                .caret()
                .set_to_input(input, CaretPlacement::Default, position.offset),
        };
        if !placed {
            // Offsets out of bounds after content changes: end of the input.
            self.host
                .caret()
                .set_to_input(input, CaretPlacement::End, 0);
        }
    }

    fn restore_caret_fallback(
        &mut self,
        fallback_index: Option<usize>,
        fallback_caret: Option<CaretPosition>,
    ) {
        let manager = self.host.blocks();
        if let Some(fallback) = fallback_caret {
            if let Some(block) = manager.get_block_by_index(fallback.block_index) {
                let inputs = block.inputs();
                if !inputs.is_empty() {
                    let input = inputs[fallback.input_index.min(inputs.len() - 1)];
                    if self
                        .host
                        .caret()
                        .set_to_input(input, CaretPlacement::Default, fallback.offset)
                    {
                        return;
                    }
                    self.host
                        .caret()
                        .set_to_input(input, CaretPlacement::End, 0);
                    return;
                }
            }
        }
        if let Some(index) = fallback_index {
            if let Some(block) = manager.get_block_by_index(index) {
                self.host.caret().set_to_block(&block, CaretPlacement::End);
                return;
            }
        }
        // Worst case: end of the first focusable block.
        if let Some(block) = manager.blocks().into_iter().find(|b| b.focusable()) {
            self.host.caret().set_to_block(&block, CaretPlacement::End);
        }
    }

    /// Install a selection spanning `[start, end]` character offsets of an
    /// input's text.
    fn select_range_in_input(&self, input: NodeId, start: usize, end: usize) -> bool {
        let mut dom = self.dom.borrow_mut();
        let (Some(start_boundary), Some(end_boundary)) = (
            boundary_at_text_offset(&dom, input, start),
            boundary_at_text_offset(&dom, input, end),
        ) else {
            return false;
        };
        dom.focus(input);
        dom.set_selection(start_boundary, end_boundary);
        true
    }
}

/// Boundary at a cumulative character offset across an element's text nodes.
fn boundary_at_text_offset(dom: &Dom, root: NodeId, offset: usize) -> Option<Boundary> {
    let mut remaining = offset;
    for text in dom.text_nodes_within(root) {
        let len = dom.text_len(text);
        if remaining <= len {
            return Some(Boundary::new(text, remaining));
        }
        remaining -= len;
    }
    None
}
