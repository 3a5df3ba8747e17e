use std::fmt;

use crate::drain::Release;
use crate::ops::Tasklet;
use crate::ops::predicate::Pred;

/// A unit of work for the [`Executor`](crate::Executor).
///
/// Higher `priority` runs sooner (approximately, see the executor docs).
/// `retry` is asked about every failed run; `true` puts the task back on the
/// intake queue. The release of the admission is bound on submit and fired
/// once when the task finishes for good.
pub struct Task {
    pub(super) action: Tasklet,
    pub(super) priority: i64,
    pub(super) retry: Option<Pred>,
    pub(super) attempts: u32,
    pub(super) release: Option<Release>,
}

impl Task {
    /// Task with priority 0 and no retry.
    pub fn new(action: Tasklet) -> Self {
        Self {
            action,
            priority: 0,
            retry: None,
            attempts: 0,
            release: None,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Retry predicate, evaluated with each failed outcome.
    pub fn with_retry(mut self, retry: Pred) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    /// Runs started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Gives back the admission, if one is bound.
    pub(super) fn finish(&mut self) {
        if let Some(release) = self.release.take() {
            release.release();
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("priority", &self.priority)
            .field("attempts", &self.attempts)
            .field("retry", &self.retry.is_some())
            .field("admitted", &self.release.is_some())
            .finish()
    }
}
