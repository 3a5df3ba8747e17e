//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] giving
//! non-blocking publishing from many sources.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                     Subscriber (one):
//!   Coordinator  ──┐
//!   Orchestrator ──┼────► Bus ───────► listener ────► SubscriberSet
//!   Executor     ──┘  (broadcast chan)  (spawned by OrchestratorBuilder)
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks and never fails.
//! - **Bounded capacity**: one ring buffer holds recent events for all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` items.
//! - **No persistence**: events are dropped if nobody is subscribed.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus; capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Event>(capacity);
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates an independent receiver that sees events sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn delivers_to_every_receiver() {
        let bus = Bus::new(0);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        bus.publish(Event::new(EventKind::AdmissionOpened));
        assert_eq!(a.recv().await.map(|e| e.kind).ok(), Some(EventKind::AdmissionOpened));
        assert_eq!(b.recv().await.map(|e| e.kind).ok(), Some(EventKind::AdmissionOpened));
    }

    #[test]
    fn publish_without_receivers_is_fine() {
        Bus::new(4).publish(Event::new(EventKind::PoolStarted));
    }
}
