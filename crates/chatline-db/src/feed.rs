use std::sync::Arc;

use tokio::sync::broadcast;

use chatline_types::events::StoreEvent;

/// Fan-out of backend changes to live listeners.
#[derive(Clone)]
pub struct ChangeFeed {
    inner: Arc<ChangeFeedInner>,
}

struct ChangeFeedInner {
    /// Every listener receives every event and filters by conversation
    broadcast_tx: broadcast::Sender<StoreEvent>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(ChangeFeedInner { broadcast_tx }),
        }
    }

    /// Subscribe to backend events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Publish an event. Having no listeners is not an error.
    pub fn publish(&self, event: StoreEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
