//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Coordinator` (admission/accounting), `Orchestrator`
//!   (signals, drains, routine exit), `Executor` (pool, batches, retries),
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the listener spawned by `OrchestratorBuilder::build`, which
//!   fans out to a `SubscriberSet`; tests subscribe directly.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
