//! Single-threaded event dispatcher connecting the core to its host.

use std::cell::RefCell;
use std::rc::Rc;

use smol_str::SmolStr;

/// Events flowing over the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    /// A tool mutated the block with this id.
    BlockChanged { block_id: SmolStr },
    /// Undo/redo availability changed; hosts grey buttons off this.
    UndoRedoStateChanged { can_undo: bool, can_redo: bool },
    /// The set of cross-block-selected blocks changed.
    CrossBlockSelectionChanged { selected: Vec<SmolStr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTopic {
    BlockChanged,
    UndoRedoStateChanged,
    CrossBlockSelectionChanged,
}

impl EditorEvent {
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::BlockChanged { .. } => EventTopic::BlockChanged,
            Self::UndoRedoStateChanged { .. } => EventTopic::UndoRedoStateChanged,
            Self::CrossBlockSelectionChanged { .. } => EventTopic::CrossBlockSelectionChanged,
        }
    }
}

type Handler = Rc<dyn Fn(&EditorEvent)>;

/// Topic-filtered callback registry. Emission snapshots the handler list
/// first, so handlers may subscribe/unsubscribe while an event is being
/// delivered; they must not re-enter the emitter synchronously.
#[derive(Default)]
pub struct EventBus {
    handlers: RefCell<Vec<(EventTopic, Handler)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, topic: EventTopic, handler: impl Fn(&EditorEvent) + 'static) {
        self.handlers.borrow_mut().push((topic, Rc::new(handler)));
    }

    pub fn emit(&self, event: &EditorEvent) {
        let topic = event.topic();
        let matching: Vec<Handler> = self
            .handlers
            .borrow()
            .iter()
            .filter(|(t, _)| *t == topic)
            .map(|(_, h)| h.clone())
            .collect();
        for handler in matching {
            handler(event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handlers.borrow().len())
            .finish()
    }
}
