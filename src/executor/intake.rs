//! Unsorted intake queue.
//!
//! Pushes are O(1) under a short lock. The flush worker pulls the
//! highest-priority slice in one locked `select_nth_unstable` step and sorts it
//! after the lock is released.

use std::cmp::Ordering;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::task::Task;

fn by_priority_desc(a: &Task, b: &Task) -> Ordering {
    b.priority.cmp(&a.priority)
}

#[derive(Default)]
pub(super) struct Intake {
    queue: Mutex<Vec<Task>>,
}

impl Intake {
    fn lock(&self) -> MutexGuard<'_, Vec<Task>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn push(&self, task: Task) {
        self.lock().push(task);
    }

    pub(super) fn extend(&self, tasks: impl IntoIterator<Item = Task>) {
        self.lock().extend(tasks);
    }

    pub(super) fn len(&self) -> usize {
        self.lock().len()
    }

    /// Removes up to `max` tasks with the highest priorities and returns them
    /// sorted by descending priority. Ties are in no particular order.
    pub(super) fn take_batch(&self, max: usize) -> Vec<Task> {
        let max = max.max(1);
        let mut batch = {
            let mut queue = self.lock();
            if queue.len() <= max {
                std::mem::take(&mut *queue)
            } else {
                queue.select_nth_unstable_by(max - 1, by_priority_desc);
                let rest = queue.split_off(max);
                std::mem::replace(&mut *queue, rest)
            }
        };
        batch.sort_unstable_by(by_priority_desc);
        batch
    }
}
