//! Change notifications from the store to query handles.
//!
//! A thin wrapper over [`tokio::sync::broadcast`]: the store publishes a
//! [`StoreEvent`] after every write and each query handle keeps its own
//! receiver, filtering with [`StoreEvent::concerns`].

use tokio::sync::broadcast;

use super::StoreEvent;

/// Broadcast bus for [`StoreEvent`]s.
///
/// Bounded: a handle that falls more than `capacity` events behind gets
/// `Lagged` on its next receive and re-reads the store instead.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    /// Creates a bus holding up to `capacity` undelivered events (min 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Announces a change. Returns how many handles were listening; with
    /// none the event is dropped.
    pub fn publish(&self, event: StoreEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Receiver for changes published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    /// Number of live receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
