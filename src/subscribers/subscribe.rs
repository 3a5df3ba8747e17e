//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for plugging custom event handlers into
//! the runtime. Each subscriber is driven by its own worker, fed by a bounded
//! queue owned by the [`SubscriberSet`](crate::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow; they never block the coordinator, the
//!   orchestrator or other subscribers.
//! - If the queue declared by [`Subscribe::queue_capacity`] overflows, events
//!   for that subscriber are dropped and a `SubscriberOverflow` event is published.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use drainvisor::{Event, EventKind, Subscribe};
//!
//! struct StallAlert;
//!
//! #[async_trait]
//! impl Subscribe for StallAlert {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::DrainStalled {
//!             // page someone
//!         }
//!     }
//!     fn name(&self) -> &'static str { "stall-alert" }
//!     fn queue_capacity(&self) -> usize { 64 }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow/panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
