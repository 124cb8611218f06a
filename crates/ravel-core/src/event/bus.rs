//! Broadcast event bus for distributing `AgentEvent` to multiple subscribers.
//!
//! Built on `tokio::sync::broadcast`. Publishing with no active subscribers is
//! a no-op, so a bus can be handed to a run before anyone listens.

use ravel_types::event::AgentEvent;
use tokio::sync::broadcast;

use super::observer::AgentObserver;

/// Multi-consumer event bus. Cloning the bus clones the sender.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AgentEvent>,
}

impl EventBus {
    /// Create a bus with the given channel capacity. Slow subscribers that
    /// fall more than `capacity` events behind observe `Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: AgentEvent) {
        let _ = self.sender.send(event);
    }
}

impl AgentObserver for EventBus {
    fn notify(&self, event: &AgentEvent) {
        self.publish(event.clone());
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}
