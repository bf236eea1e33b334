//! Checkpoint policy: when does an edit stop coalescing with the previous
//! ones.
//!
//! The policy is pure over (action type, block id) against the last observed
//! context. Pause detection is timing-based and lives in the history engine,
//! not here.

use smol_str::SmolStr;
use web_time::Instant;

/// What kind of mutation an action is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Insert,
    DeleteBack,
    DeleteForward,
    Format,
    Structural,
    Paste,
    Cut,
}

impl ActionKind {
    /// Immediate checkpoints interrupt any ongoing group before recording.
    pub fn is_immediate_checkpoint(self) -> bool {
        matches!(
            self,
            Self::Format | Self::Structural | Self::Paste | Self::Cut
        )
    }
}

/// The last observed action: type, block, time, and the inserted character
/// for `Insert` (carried for future policies, not consulted today).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionContext {
    pub kind: ActionKind,
    pub block_id: SmolStr,
    pub at: Instant,
    pub inserted: Option<char>,
}

/// Grouping state: the current context plus how many actions the open group
/// has absorbed (surfaced in logs when the group closes).
#[derive(Debug, Default)]
pub struct GroupingPolicy {
    current: Option<ActionContext>,
    pending_actions: usize,
}

impl GroupingPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the incoming action must start a new checkpoint: never for
    /// the first action, otherwise on any block or action-type change.
    pub fn should_create_checkpoint(&self, kind: ActionKind, block_id: &str) -> bool {
        match &self.current {
            None => false,
            Some(context) => context.block_id != block_id || context.kind != kind,
        }
    }

    /// Record the action as the new context and count it into the open group.
    pub fn observe(&mut self, context: ActionContext) {
        self.current = Some(context);
        self.pending_actions += 1;
    }

    pub fn current(&self) -> Option<&ActionContext> {
        self.current.as_ref()
    }

    pub fn pending_actions(&self) -> usize {
        self.pending_actions
    }

    /// Close the open group (a checkpoint was recorded or a pause promoted
    /// one); the context survives so the next action still compares against
    /// it.
    pub fn reset_pending(&mut self) {
        self.pending_actions = 0;
    }

    /// Full reset, used by `clear()` and `destroy()`.
    pub fn reset(&mut self) {
        self.current = None;
        self.pending_actions = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(kind: ActionKind, block_id: &str) -> ActionContext {
        ActionContext {
            kind,
            block_id: block_id.into(),
            at: Instant::now(),
            inserted: None,
        }
    }

    #[test]
    fn test_first_action_never_checkpoints() {
        let policy = GroupingPolicy::new();
        assert!(!policy.should_create_checkpoint(ActionKind::Insert, "b1"));
    }

    #[test]
    fn test_same_kind_same_block_groups() {
        let mut policy = GroupingPolicy::new();
        policy.observe(context(ActionKind::Insert, "b1"));
        assert!(!policy.should_create_checkpoint(ActionKind::Insert, "b1"));
        assert_eq!(policy.pending_actions(), 1);
    }

    #[test]
    fn test_block_change_checkpoints() {
        let mut policy = GroupingPolicy::new();
        policy.observe(context(ActionKind::Insert, "b1"));
        assert!(policy.should_create_checkpoint(ActionKind::Insert, "b2"));
    }

    #[test]
    fn test_kind_change_checkpoints() {
        let mut policy = GroupingPolicy::new();
        policy.observe(context(ActionKind::Insert, "b1"));
        assert!(policy.should_create_checkpoint(ActionKind::DeleteBack, "b1"));
    }

    #[test]
    fn test_immediate_checkpoint_kinds() {
        for kind in [
            ActionKind::Format,
            ActionKind::Structural,
            ActionKind::Paste,
            ActionKind::Cut,
        ] {
            assert!(kind.is_immediate_checkpoint());
        }
        for kind in [
            ActionKind::Insert,
            ActionKind::DeleteBack,
            ActionKind::DeleteForward,
        ] {
            assert!(!kind.is_immediate_checkpoint());
        }
    }

    #[test]
    fn test_reset_pending_keeps_context() {
        let mut policy = GroupingPolicy::new();
        policy.observe(context(ActionKind::Insert, "b1"));
        policy.reset_pending();
        assert_eq!(policy.pending_actions(), 0);
        // Context survives: a different block still forces a checkpoint.
        assert!(policy.should_create_checkpoint(ActionKind::Insert, "b2"));

        policy.reset();
        assert!(!policy.should_create_checkpoint(ActionKind::Insert, "b2"));
    }
}
