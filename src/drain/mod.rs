//! Graceful-drain coordination.
//!
//! - [`Coordinator`] admission gate, live-unit counter, unload pipeline, drain
//! - [`Release`] idempotent handle returned by an admission
//! - [`Loader`] / [`LoaderRef`] capability given to state-aware computations
//! - [`retry_admission`] predicate-driven retry around a denied admission

mod coordinator;
mod loader;
mod release;

pub use coordinator::{Coordinator, DEFAULT_POLL_INTERVAL};
pub use loader::{Loader, LoaderRef, retry_admission};
pub use release::Release;
