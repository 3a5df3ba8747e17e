//! # Executor sizing.
//!
//! The worker count is `available_parallelism × scale`, unless an explicit
//! `workers` count is given. Scale presets:
//!
//! - [`CPU_BOUND`]  one worker per CPU
//! - [`IO_BOUND`]   64 per CPU
//! - [`IDLE_BOUND`] 4096 per CPU (mostly sleeping tasks)
//!
//! `scale = 0` disables parallelism: one worker.

use std::num::NonZeroUsize;

/// One worker per CPU.
pub const CPU_BOUND: usize = 1;
/// Tasks that spend most of their time waiting on I/O.
pub const IO_BOUND: usize = 64;
/// Tasks that are almost always parked.
pub const IDLE_BOUND: usize = 4096;

/// Configuration of an [`Executor`](crate::Executor).
#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    /// Workers per available CPU. `0` = a single worker.
    pub scale: usize,
    /// Explicit worker count; `0` = derive from `scale`.
    pub workers: usize,
    /// Capacity of the bus created when none is supplied.
    pub bus_capacity: usize,
}

impl ExecutorConfig {
    /// Config with the given scale and no explicit worker count.
    pub fn scaled(scale: usize) -> Self {
        Self {
            scale,
            ..Self::default()
        }
    }

    /// Config with exactly `n` workers (at least 1).
    pub fn fixed(n: usize) -> Self {
        Self {
            workers: n.max(1),
            ..Self::default()
        }
    }

    /// Number of task workers this config yields (always `>= 1`).
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        if self.scale == 0 {
            return 1;
        }
        let cpus = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
        cpus.saturating_mul(self.scale).max(1)
    }
}

impl Default for ExecutorConfig {
    /// `scale = CPU_BOUND`, derived worker count, `bus_capacity = 1024`.
    fn default() -> Self {
        Self {
            scale: CPU_BOUND,
            workers: 0,
            bus_capacity: 1024,
        }
    }
}
