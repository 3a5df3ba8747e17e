//! Drain-aware priority executor.
//!
//! - [`Executor`] fixed worker pool fed through an admission gate
//! - [`Task`] action + priority + optional retry predicate
//! - [`ExecutorConfig`] sizing, with the [`CPU_BOUND`], [`IO_BOUND`] and
//!   [`IDLE_BOUND`] scale presets

mod config;
mod intake;
mod pool;
mod task;

pub use config::{CPU_BOUND, ExecutorConfig, IDLE_BOUND, IO_BOUND};
pub use pool::Executor;
pub use task::Task;
