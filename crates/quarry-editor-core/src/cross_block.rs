//! Cross-block selection: pointer-drag and shift+arrow selection spanning
//! multiple blocks.
//!
//! The machine has three states: idle (no anchors), single (both anchors on
//! one block - a latent anchor with no visible multi-selection yet) and
//! multi (anchors on distinct blocks).

use std::rc::Rc;

use quarry_dom::{Dom, NodeId};
use smol_str::SmolStr;

use crate::events::{EditorEvent, EventBus};
use crate::host::{Block, CaretPlacement, EditorHost};
use crate::selection;

/// Pointer buttons, numbered the way platforms report them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
    Back,
    Forward,
}

/// A pointer event as the host forwards it: hit-tested nodes, no geometry.
#[derive(Debug, Clone, Copy)]
pub struct PointerEvent {
    pub button: PointerButton,
    /// Node under the pointer.
    pub target: Option<NodeId>,
    /// Node the pointer came from (platform `relatedTarget`).
    pub related_target: Option<NodeId>,
}

impl PointerEvent {
    pub fn down(target: NodeId) -> Self {
        Self {
            button: PointerButton::Primary,
            target: Some(target),
            related_target: None,
        }
    }

    pub fn moved(from: NodeId, to: NodeId) -> Self {
        Self {
            button: PointerButton::Primary,
            target: Some(to),
            related_target: Some(from),
        }
    }
}

/// Why the selection is being cleared; arrow keys also place the caret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearReason {
    /// ArrowRight / ArrowDown: caret to the end of the lower anchor.
    ArrowForward,
    /// ArrowLeft / ArrowUp: caret to the start of the upper anchor.
    ArrowBackward,
    /// Anything else leaves the caret alone.
    Other,
}

/// Neighbour direction for shift+arrow extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendDirection {
    Prev,
    Next,
}

#[derive(Debug, Default)]
pub struct CrossBlockSelection {
    first: Option<SmolStr>,
    last: Option<SmolStr>,
    /// Pointer-move/up subscription is live.
    tracking: bool,
}

impl CrossBlockSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Both anchors set and distinct.
    pub fn is_active(&self) -> bool {
        match (&self.first, &self.last) {
            (Some(first), Some(last)) => first != last,
            _ => false,
        }
    }

    pub fn first_selected_block(&self) -> Option<&SmolStr> {
        self.first.as_ref()
    }

    pub fn last_selected_block(&self) -> Option<&SmolStr> {
        self.last.as_ref()
    }

    /// Primary-button press inside the editor zone arms tracking with the
    /// pressed block as the latent anchor.
    pub fn handle_pointer_down(&mut self, dom: &Dom, host: &dyn EditorHost, event: &PointerEvent) {
        if event.button != PointerButton::Primary {
            return;
        }
        let Some(target) = event.target else {
            return;
        };
        if !dom.contains(host.ui().wrapper(), target) {
            return;
        }
        if let Some(toolbar) = host.ui().toolbar_wrapper() {
            if dom.contains(toolbar, target) {
                return;
            }
        }
        let Some(block) = host.blocks().get_block_by_child_node(target) else {
            return;
        };

        let id = block.id();
        tracing::trace!(target: "quarry::cross_block", block = %id, "pointer down");
        self.first = Some(id.clone());
        self.last = Some(id);
        self.tracking = true;

        if selection::is_collapsed(dom) == Some(false) {
            host.blocks().clear_selection_cache();
        }
    }

    /// Drag across block boundaries: extend, retract or toggle the selected
    /// range.
    pub fn handle_pointer_move(
        &mut self,
        host: &dyn EditorHost,
        events: &EventBus,
        event: &PointerEvent,
    ) {
        if !self.tracking {
            return;
        }
        if host.ui().drag_in_progress() || host.ui().some_toolbar_opened() {
            return;
        }
        let Some(first_id) = self.first.clone() else {
            return;
        };

        let from = event
            .related_target
            .and_then(|node| host.blocks().get_block_by_child_node(node))
            .or_else(|| {
                self.last
                    .as_ref()
                    .and_then(|id| host.blocks().get_block_by_id(id))
            });
        let to = event
            .target
            .and_then(|node| host.blocks().get_block_by_child_node(node));
        let (Some(from), Some(to)) = (from, to) else {
            return;
        };
        if from.id() == to.id() {
            return;
        }

        if from.id() == first_id {
            // Leaving the anchor: both ends become selected.
            from.set_selected(true);
            to.set_selected(true);
        } else if to.id() == first_id {
            // Retracting onto the anchor: both ends drop out.
            from.set_selected(false);
            to.set_selected(false);
        } else {
            self.toggle_blocks_between(host, &first_id, &from, &to);
        }

        host.ui().close_inline_toolbar();
        self.last = Some(to.id());
        emit_selection_changed(host, events);
    }

    /// Toggle every block between `from` and `to`, skipping the anchor and
    /// one endpoint: when the endpoints disagree on state the `from` side is
    /// left alone, otherwise the `to` side is.
    fn toggle_blocks_between(
        &self,
        host: &dyn EditorHost,
        first_id: &SmolStr,
        from: &Rc<dyn Block>,
        to: &Rc<dyn Block>,
    ) {
        let manager = host.blocks();
        let (Some(from_ix), Some(to_ix)) = (
            manager.get_block_index(&from.id()),
            manager.get_block_index(&to.id()),
        ) else {
            return;
        };
        let skip_from = from.selected() != to.selected();
        let skipped = if skip_from { from.id() } else { to.id() };

        for index in from_ix.min(to_ix)..=from_ix.max(to_ix) {
            let Some(block) = manager.get_block_by_index(index) else {
                continue;
            };
            let id = block.id();
            if id != *first_id && id != skipped {
                block.set_selected(!block.selected());
            }
        }
    }

    /// Pointer release ends tracking; a multi selection opens the toolbar
    /// behind a hover cooldown so stale moves cannot reposition it.
    pub fn handle_pointer_up(&mut self, host: &dyn EditorHost) {
        if !self.tracking {
            return;
        }
        self.tracking = false;
        if self.is_active() {
            host.ui().disable_hover_for_cooldown();
            host.ui().open_multi_block_toolbar();
        }
    }

    /// Reset to idle. Arrow-key reasons land the caret on the outermost
    /// anchor in the travel direction first.
    pub fn clear(&mut self, host: &dyn EditorHost, events: &EventBus, reason: ClearReason) {
        if let (Some(first), Some(last)) = (self.first.clone(), self.last.clone()) {
            let manager = host.blocks();
            if let (Some(first_ix), Some(last_ix)) = (
                manager.get_block_index(&first),
                manager.get_block_index(&last),
            ) {
                let target = match reason {
                    ClearReason::ArrowForward => manager.get_block_by_index(first_ix.max(last_ix)),
                    ClearReason::ArrowBackward => manager.get_block_by_index(first_ix.min(last_ix)),
                    ClearReason::Other => None,
                };
                if let Some(block) = target {
                    let placement = match reason {
                        ClearReason::ArrowForward => CaretPlacement::End,
                        _ => CaretPlacement::Start,
                    };
                    host.caret().set_to_block(&block, placement);
                }
            }
        }

        for block in host.blocks().blocks() {
            block.set_selected(false);
        }
        self.first = None;
        self.last = None;
        self.tracking = false;
        emit_selection_changed(host, events);
    }

    /// Shift+arrow extension: promote a latent anchor to a multi selection
    /// by selecting the immediate neighbour, or retreat when the neighbour
    /// is already selected.
    pub fn toggle_block_selected_state(
        &mut self,
        host: &dyn EditorHost,
        events: &EventBus,
        direction: ExtendDirection,
    ) {
        let manager = host.blocks();
        if self.first.is_none() {
            let Some(current) = manager.current_block() else {
                return;
            };
            let id = current.id();
            self.first = Some(id.clone());
            self.last = Some(id);
        }
        let Some(first_id) = self.first.clone() else {
            return;
        };
        let last_id = self.last.clone().unwrap_or_else(|| first_id.clone());
        let Some(last_ix) = manager.get_block_index(&last_id) else {
            return;
        };
        let neighbour_ix = match direction {
            ExtendDirection::Next => last_ix + 1,
            ExtendDirection::Prev => match last_ix.checked_sub(1) {
                Some(ix) => ix,
                None => return,
            },
        };
        let Some(neighbour) = manager.get_block_by_index(neighbour_ix) else {
            return;
        };

        let was_active = self.is_active();
        if neighbour.selected() {
            // Retreating towards the anchor.
            if let Some(tail) = manager.get_block_by_id(&last_id) {
                tail.set_selected(false);
            }
        } else {
            if last_id == first_id {
                if let Some(anchor) = manager.get_block_by_id(&first_id) {
                    anchor.set_selected(true);
                }
            }
            neighbour.set_selected(true);
        }
        self.last = Some(neighbour.id());
        host.ui().scroll_into_view(neighbour.holder());

        if !was_active && self.is_active() {
            host.ui().open_multi_block_toolbar();
        }
        emit_selection_changed(host, events);
    }
}

fn emit_selection_changed(host: &dyn EditorHost, events: &EventBus) {
    let selected: Vec<SmolStr> = host
        .blocks()
        .blocks()
        .iter()
        .filter(|b| b.selected())
        .map(|b| b.id())
        .collect();
    events.emit(&EditorEvent::CrossBlockSelectionChanged { selected });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestRig;

    fn input_of(rig: &TestRig, index: usize) -> NodeId {
        rig.manager().block(index).input_node()
    }

    fn drag(rig: &TestRig, selection: &mut CrossBlockSelection, path: &[usize]) {
        let dom = rig.dom.borrow();
        selection.handle_pointer_down(
            &dom,
            &*rig.host,
            &PointerEvent::down(input_of(rig, path[0])),
        );
        for pair in path.windows(2) {
            selection.handle_pointer_move(
                &*rig.host,
                &rig.events,
                &PointerEvent::moved(input_of(rig, pair[0]), input_of(rig, pair[1])),
            );
        }
        drop(dom);
        selection.handle_pointer_up(&*rig.host);
    }

    #[test]
    fn test_drag_selects_contiguous_range() {
        let rig = TestRig::with_blocks(&["A", "B", "C", "D"]);
        let mut selection = CrossBlockSelection::new();

        drag(&rig, &mut selection, &[0, 1, 2]);

        assert_eq!(rig.manager().selected_ids(), vec!["b0", "b1", "b2"]);
        assert!(selection.is_active());
        assert_eq!(rig.host.ui.multi_toolbar_opens.get(), 1);
        assert_eq!(rig.host.ui.hover_cooldowns.get(), 1);
        // Every cross-block move closes the inline toolbar.
        assert_eq!(rig.host.ui.inline_toolbar_closes.get(), 2);
    }

    #[test]
    fn test_move_within_one_block_is_inert() {
        let rig = TestRig::with_blocks(&["A", "B"]);
        let mut selection = CrossBlockSelection::new();
        let dom = rig.dom.borrow();
        selection.handle_pointer_down(&dom, &*rig.host, &PointerEvent::down(input_of(&rig, 0)));
        selection.handle_pointer_move(
            &*rig.host,
            &rig.events,
            &PointerEvent::moved(input_of(&rig, 0), input_of(&rig, 0)),
        );
        drop(dom);
        assert!(rig.manager().selected_ids().is_empty());
        assert!(!selection.is_active());
    }

    #[test]
    fn test_retract_path_unselects_both() {
        let rig = TestRig::with_blocks(&["A", "B", "C"]);
        let mut selection = CrossBlockSelection::new();

        // Down on A, out to B, back onto A.
        let dom = rig.dom.borrow();
        selection.handle_pointer_down(&dom, &*rig.host, &PointerEvent::down(input_of(&rig, 0)));
        selection.handle_pointer_move(
            &*rig.host,
            &rig.events,
            &PointerEvent::moved(input_of(&rig, 0), input_of(&rig, 1)),
        );
        assert_eq!(rig.manager().selected_ids(), vec!["b0", "b1"]);

        selection.handle_pointer_move(
            &*rig.host,
            &rig.events,
            &PointerEvent::moved(input_of(&rig, 1), input_of(&rig, 0)),
        );
        drop(dom);
        assert!(rig.manager().selected_ids().is_empty());
    }

    #[test]
    fn test_retreat_from_outer_block_toggles_it_off() {
        let rig = TestRig::with_blocks(&["A", "B", "C"]);
        let mut selection = CrossBlockSelection::new();
        let dom = rig.dom.borrow();
        selection.handle_pointer_down(&dom, &*rig.host, &PointerEvent::down(input_of(&rig, 0)));
        for (from, to) in [(0, 1), (1, 2)] {
            selection.handle_pointer_move(
                &*rig.host,
                &rig.events,
                &PointerEvent::moved(input_of(&rig, from), input_of(&rig, to)),
            );
        }
        assert_eq!(rig.manager().selected_ids(), vec!["b0", "b1", "b2"]);

        // Back from C onto B: C drops out.
        selection.handle_pointer_move(
            &*rig.host,
            &rig.events,
            &PointerEvent::moved(input_of(&rig, 2), input_of(&rig, 1)),
        );
        drop(dom);
        assert_eq!(rig.manager().selected_ids(), vec!["b0", "b1"]);
    }

    #[test]
    fn test_pointer_down_outside_editor_or_in_toolbar_is_ignored() {
        let rig = TestRig::with_blocks(&["A"]);
        let mut selection = CrossBlockSelection::new();
        let dom = rig.dom.borrow();

        selection.handle_pointer_down(
            &dom,
            &*rig.host,
            &PointerEvent::down(rig.host.ui.toolbar),
        );
        assert!(selection.first_selected_block().is_none());

        selection.handle_pointer_down(&dom, &*rig.host, &PointerEvent::down(dom.root()));
        assert!(selection.first_selected_block().is_none());

        let secondary = PointerEvent {
            button: PointerButton::Secondary,
            target: Some(input_of(&rig, 0)),
            related_target: None,
        };
        selection.handle_pointer_down(&dom, &*rig.host, &secondary);
        assert!(selection.first_selected_block().is_none());
    }

    #[test]
    fn test_move_suppressed_while_toolbar_open_or_dragging() {
        let rig = TestRig::with_blocks(&["A", "B"]);
        let mut selection = CrossBlockSelection::new();
        let dom = rig.dom.borrow();
        selection.handle_pointer_down(&dom, &*rig.host, &PointerEvent::down(input_of(&rig, 0)));

        rig.host.ui.toolbar_opened.set(true);
        selection.handle_pointer_move(
            &*rig.host,
            &rig.events,
            &PointerEvent::moved(input_of(&rig, 0), input_of(&rig, 1)),
        );
        assert!(rig.manager().selected_ids().is_empty());

        rig.host.ui.toolbar_opened.set(false);
        rig.host.ui.dragging.set(true);
        selection.handle_pointer_move(
            &*rig.host,
            &rig.events,
            &PointerEvent::moved(input_of(&rig, 0), input_of(&rig, 1)),
        );
        assert!(rig.manager().selected_ids().is_empty());
    }

    #[test]
    fn test_clear_with_arrow_places_caret() {
        let rig = TestRig::with_blocks(&["alpha", "beta", "gamma"]);
        let mut selection = CrossBlockSelection::new();
        drag(&rig, &mut selection, &[0, 1, 2]);

        selection.clear(&*rig.host, &rig.events, ClearReason::ArrowForward);

        assert!(rig.manager().selected_ids().is_empty());
        assert!(!selection.is_active());
        // Caret at the end of "gamma".
        let dom = rig.dom.borrow();
        let focus = dom.selection().unwrap().focus;
        let gamma_input = input_of(&rig, 2);
        assert!(dom.contains(gamma_input, focus.node));
        assert_eq!(focus.offset, 5);
    }

    #[test]
    fn test_clear_other_leaves_caret_alone() {
        let rig = TestRig::with_blocks(&["alpha", "beta"]);
        let mut selection = CrossBlockSelection::new();
        drag(&rig, &mut selection, &[0, 1]);

        rig.dom.borrow_mut().clear_selection();
        selection.clear(&*rig.host, &rig.events, ClearReason::Other);
        assert!(rig.dom.borrow().selection().is_none());
        assert!(rig.manager().selected_ids().is_empty());
    }

    #[test]
    fn test_shift_arrow_promotes_single_to_multi() {
        let rig = TestRig::with_blocks(&["A", "B", "C"]);
        let mut selection = CrossBlockSelection::new();
        rig.manager().set_current(1);

        selection.toggle_block_selected_state(&*rig.host, &rig.events, ExtendDirection::Next);
        assert_eq!(rig.manager().selected_ids(), vec!["b1", "b2"]);
        assert!(selection.is_active());
        assert_eq!(rig.host.ui.multi_toolbar_opens.get(), 1);

        // Extending further does not reopen the toolbar.
        selection.toggle_block_selected_state(&*rig.host, &rig.events, ExtendDirection::Prev);
        assert_eq!(rig.host.ui.multi_toolbar_opens.get(), 1);
    }

    #[test]
    fn test_shift_arrow_retreats_over_selected_neighbour() {
        let rig = TestRig::with_blocks(&["A", "B", "C"]);
        let mut selection = CrossBlockSelection::new();
        rig.manager().set_current(0);

        selection.toggle_block_selected_state(&*rig.host, &rig.events, ExtendDirection::Next);
        selection.toggle_block_selected_state(&*rig.host, &rig.events, ExtendDirection::Next);
        assert_eq!(rig.manager().selected_ids(), vec!["b0", "b1", "b2"]);

        selection.toggle_block_selected_state(&*rig.host, &rig.events, ExtendDirection::Prev);
        assert_eq!(rig.manager().selected_ids(), vec!["b0", "b1"]);
    }
}
