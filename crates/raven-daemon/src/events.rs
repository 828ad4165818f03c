//! Event emission system (design spec §9 Design Notes): the daemon's
//! single outbound event stream, [`raven_types::events::CoreEvent`],
//! broadcast to every subscribed RPC connection with backpressure.

use tokio::sync::broadcast;

use raven_types::events::CoreEvent;

/// Default per-subscriber buffer before a slow consumer starts lagging.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Broadcasts [`CoreEvent`]s to every subscriber.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers. Silently dropped if no one is
    /// currently listening.
    pub fn emit(&self, event: CoreEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
