//! # Event subscribers.
//!
//! [`Subscribe`] is the user-facing trait; [`SubscriberSet`] fans events from
//! the [`Bus`](crate::Bus) out to many subscribers without blocking publishers.
//!
//! ```text
//!   Coordinator / Orchestrator / Executor ── publish ──► Bus
//!                                                         │
//!                                             listener ◄──┘
//!                                                │
//!                                          SubscriberSet
//!                                      ┌─────────┼─────────┐
//!                                      ▼         ▼         ▼
//!                                  LogWriter  Metrics   Custom
//! ```

mod embedded;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub(crate) use set::panic_message;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
