//! Timing and signal policies.
//!
//! ## Contents
//! - [`BackoffPolicy`] how retry delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to avoid thundering herd
//! - [`SignalPolicy`]  which signals start a drain and how long it may take
//!
//! ## Quick wiring
//! ```text
//! predicate::backoff_with(BackoffPolicy)  ─► retry loops (executor, admission)
//! Config { signals: SignalPolicy, .. }    ─► Orchestrator signal branch
//! ```

mod backoff;
mod jitter;
mod signal;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use signal::{DrainWait, Signal, SignalPolicy};
