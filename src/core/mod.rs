//! Runtime core: configuration, signal sources and the orchestrator.
//!
//! The public entry point is [`Orchestrator`], which runs a background
//! [`Routine`](crate::Routine) under the drain protocol.
//!
//! Internal modules:
//! - [`config`]: [`Config`] with sentinel helpers;
//! - [`builder`]: [`OrchestratorBuilder`] wires the bus to subscribers;
//! - [`shutdown`]: [`SignalSource`] and its OS / channel / no-op implementations;
//! - [`orchestrator`]: the accept → drain → terminate state machine.
//!
//! ## Wiring
//! ```text
//! OrchestratorBuilder::build()
//!   ├─► Bus::new(cfg.bus_capacity_clamped())
//!   └─► SubscriberSet + listener (Bus ─► SubscriberSet::emit)
//!
//! Orchestrator::run(ctx, routine)
//!   ├─► OsSignals::listen(&cfg.signals)
//!   ├─► Coordinator::with_poll_interval(bus, cfg.poll_interval)
//!   ├─► spawn routine((internal_token, loader))
//!   └─► select { signal | ctx | routine } ─► drain ─► cancel internal ─► join
//! ```

mod builder;
mod config;
mod orchestrator;
mod shutdown;

pub use builder::OrchestratorBuilder;
pub use config::Config;
pub use orchestrator::Orchestrator;
pub use shutdown::{NoSignals, OsSignals, SignalSource};
