//! Idempotent release handle for one admitted unit.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::coordinator::Inner;

/// Token returned by a successful admission.
///
/// Calling [`Release::release`] decrements the coordinator's live count
/// exactly once, no matter how many clones call it or how often. Dropping a
/// `Release` without calling it leaks the unit: the drain will wait for it.
#[derive(Clone)]
pub struct Release {
    inner: Arc<Inner>,
    released: Arc<AtomicBool>,
}

impl Release {
    pub(super) fn new(inner: Arc<Inner>) -> Self {
        Self {
            inner,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Gives the unit back. Later calls (on any clone) are no-ops.
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            self.inner.decrement();
        }
    }

    /// Whether any clone has already released.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Release {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Release")
            .field("released", &self.is_released())
            .finish()
    }
}
