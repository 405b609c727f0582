//! Transfer lifecycle events
//!
//! Terminal notifications use an explicit observer list owned by each
//! transfer instead of an ambient event bus. Listeners are plain callbacks,
//! registered per event kind, and are never serialized; a reloaded transfer
//! starts with an empty list.

use std::fmt;

/// Terminal lifecycle notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    /// The request was fulfilled on the target chain
    Completed,
    /// A lifecycle phase failed; the message is the stored failure text
    Failed { message: String },
}

impl TransferEvent {
    pub fn kind(&self) -> TransferEventKind {
        match self {
            TransferEvent::Completed => TransferEventKind::Completed,
            TransferEvent::Failed { .. } => TransferEventKind::Failed,
        }
    }
}

/// Event kind, used to register listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferEventKind {
    Completed,
    Failed,
}

/// Handle returned by `subscribe`, used to unsubscribe
pub type ListenerId = u64;

type Callback = Box<dyn FnMut(&TransferEvent) + Send>;

struct ListenerEntry {
    id: ListenerId,
    kind: TransferEventKind,
    once: bool,
    callback: Callback,
}

/// Listener registry for one transfer.
///
/// Emission walks the list in registration order. One-shot listeners are
/// removed after their first delivery. The registry does not deduplicate
/// events; at-most-once semantics for terminal events live in the transfer
/// itself.
#[derive(Default)]
pub struct EventObservers {
    next_id: ListenerId,
    listeners: Vec<ListenerEntry>,
}

impl EventObservers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for every future event of `kind`.
    pub fn subscribe<F>(&mut self, kind: TransferEventKind, callback: F) -> ListenerId
    where
        F: FnMut(&TransferEvent) + Send + 'static,
    {
        self.register(kind, false, Box::new(callback))
    }

    /// Register a listener dropped after its first delivery.
    pub fn subscribe_once<F>(&mut self, kind: TransferEventKind, callback: F) -> ListenerId
    where
        F: FnMut(&TransferEvent) + Send + 'static,
    {
        self.register(kind, true, Box::new(callback))
    }

    fn register(&mut self, kind: TransferEventKind, once: bool, callback: Callback) -> ListenerId {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.push(ListenerEntry {
            id,
            kind,
            once,
            callback,
        });
        id
    }

    /// Remove one listener. Returns false when the id is unknown.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|entry| entry.id != id);
        self.listeners.len() != before
    }

    /// Drop every registered listener.
    pub fn remove_all_listeners(&mut self) {
        self.listeners.clear();
    }

    /// Deliver `event` to every listener of its kind, in registration order.
    pub fn emit(&mut self, event: &TransferEvent) {
        let kind = event.kind();
        let mut spent: Vec<ListenerId> = Vec::new();

        for entry in self.listeners.iter_mut() {
            if entry.kind == kind {
                (entry.callback)(event);
                if entry.once {
                    spent.push(entry.id);
                }
            }
        }

        if !spent.is_empty() {
            self.listeners.retain(|entry| !spent.contains(&entry.id));
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl fmt::Debug for EventObservers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventObservers")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
