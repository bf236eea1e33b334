//! History engine configuration.

use web_time::Duration;

/// Tunables of the history engine. All fields are public; construct with
/// struct-update syntax over `Default`.
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Undo stack cap; trimming drops the oldest entries.
    pub max_history_length: usize,
    /// Coalescing window for rapid typing.
    pub debounce_time: Duration,
    /// Idle time after which the last recorded state becomes a checkpoint
    /// boundary.
    pub new_group_delay: Duration,
    /// Register undo/redo chords on the document (`true`) or only on the
    /// editor root (`false`).
    pub global_undo_redo: bool,
    /// Window after a restore during which late-firing events are ignored.
    pub restore_cooldown: Duration,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_history_length: 30,
            debounce_time: Duration::from_millis(300),
            new_group_delay: Duration::from_millis(500),
            global_undo_redo: true,
            restore_cooldown: Duration::from_millis(100),
        }
    }
}
