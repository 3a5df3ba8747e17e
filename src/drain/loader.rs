//! # Admission capability handed to state-aware computations.
//!
//! [`Loader`] is the narrow view of a [`Coordinator`](super::Coordinator) that
//! [`Statelet`](crate::Statelet)s and [`Routine`](crate::Routine)s receive:
//! they may ask for admission and observe the gate, but cannot open, close or
//! drain it.
//!
//! Denial is backpressure, not an error. [`retry_admission`] turns a denial
//! into a bounded wait driven by a predicate:
//!
//! ```rust
//! use std::time::Duration;
//! use drainvisor::{Bus, Coordinator, predicate, retry_admission};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let coord = Coordinator::new(Bus::new(16));
//! let retry = predicate::all([
//!     predicate::tries_lt(3),
//!     predicate::backoff(Duration::from_millis(1), Duration::from_millis(4)),
//! ]);
//! // gate is closed: gives up after 3 attempts
//! assert!(retry_admission(|| coord.admit(), &retry).await.is_none());
//! # }
//! ```

use std::sync::Arc;

use super::release::Release;
use crate::error::OpError;
use crate::ops::Tasklet;
use crate::ops::predicate::Pred;

/// Admission and observation half of a drain coordinator.
pub trait Loader: Send + Sync + 'static {
    /// Admits one unit if the gate is open.
    fn admit(&self) -> Option<Release>;

    /// Admits one unit whose release is driven by the drain.
    ///
    /// On success the unit is decremented and `unload` is run (once) when the
    /// unload pipeline runs. Returns `false` if the gate is closed.
    fn admit_with_unload(&self, unload: Tasklet) -> bool;

    /// Units admitted and not yet released.
    fn live_units(&self) -> u64;

    fn is_accepting(&self) -> bool;
}

/// Shared loader handle.
pub type LoaderRef = Arc<dyn Loader>;

/// Retries `admit` while it is denied and `retry` allows it.
///
/// After each denial `retry` is asked about `Err(OpError::Rejected)`; a
/// `false` answer gives up with `None`. Put a `backoff` predicate in `retry`
/// to avoid spinning.
pub async fn retry_admission<T>(mut admit: impl FnMut() -> Option<T>, retry: &Pred) -> Option<T> {
    let rejected = Err(OpError::Rejected);
    loop {
        if let Some(admitted) = admit() {
            return Some(admitted);
        }
        if !retry.check(&rejected).await {
            return None;
        }
    }
}
