//! # drainvisor
//!
//! **Drainvisor** composes long-lived concurrent work and shuts it down
//! without orphaning anything.
//!
//! It provides:
//! - a small algebra of fallible computations ([`Op`] in four shapes) with
//!   sequence, parallel, repeat, if-then-else, mutual exclusion and run-once
//!   combinators;
//! - a drain [`Coordinator`] that gates admissions and counts live units;
//! - an [`Orchestrator`] that turns caller cancellation or OS signals into a
//!   bounded, resumable drain followed by interruption of the background work;
//! - a priority-aware worker pool ([`Executor`]) that admits every task through
//!   the same gate.
//!
//! ## Architecture
//! ```text
//!          ctx.cancel() / SIGHUP / SIGINT / SIGTERM
//!                         │
//!                         ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │  Orchestrator                                                 │
//! │   select { signal | ctx | routine returned }                  │
//! │        │                                                      │
//! │        ▼                                                      │
//! │   Coordinator ── accepting? ── live units ── unload pipeline  │
//! └───────┬──────────────────────────────▲────────────────────────┘
//!         │ (internal token, LoaderRef)  │ admit() / release()
//!         ▼                              │
//! ┌───────────────────────────────────────────────────────────────┐
//! │  Routine (user code, e.g. Executor::routine())                │
//! │   Intake ─► flush worker ─► ready channel ─► task workers     │
//! └───────────────────────────────────────────────────────────────┘
//!         │ publish(Event)
//!         ▼
//!        Bus ──► listener ──► SubscriberSet ──► Subscribe::on_event
//! ```
//!
//! ### Shutdown
//! ```text
//! trigger ──► set_accepting(false)
//!         ──► drain = run_unload_pipeline ∥ wait_drained   (bounded per signal)
//!               ├─ ok    ──► cancel routine token ──► await routine ──► return its outcome
//!               └─ error ──► DrainAborted, set_accepting(true), keep running
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                        |
//! |-------------------|----------------------------------------------------------|-------------------------------------------|
//! | **Computations**  | Composable fallible async computations.                  | [`Op`], [`Tasklet`], [`Routine`]          |
//! | **Predicates**    | Loop and retry decisions, backoff.                       | [`predicate`], [`Predicate`]              |
//! | **Draining**      | Admission gate and unit accounting.                      | [`Coordinator`], [`Release`], [`Loader`]  |
//! | **Orchestration** | Signal/cancellation-driven shutdown state machine.       | [`Orchestrator`], [`SignalPolicy`]        |
//! | **Executor**      | Bounded priority worker pool.                            | [`Executor`], [`Task`]                    |
//! | **Subscriber API**| Observe admissions, drains and executor activity.        | [`Subscribe`], [`Event`]                  |
//! | **Errors**        | One error type for every computation.                    | [`OpError`]                               |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use drainvisor::{
//!     Config, Executor, ExecutorConfig, NoSignals, Orchestrator, Subscribe, Task, Tasklet,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(drainvisor::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn Subscribe>> = Vec::new();
//!
//!     let orch = Orchestrator::builder(Config::default())
//!         .with_subscribers(subs)
//!         .build();
//!     let exec = Executor::with_bus(ExecutorConfig::fixed(2), orch.bus().clone());
//!
//!     let ctx = CancellationToken::new();
//!     let producer = {
//!         let (exec, ctx) = (exec.clone(), ctx.clone());
//!         tokio::spawn(async move {
//!             tokio::time::sleep(Duration::from_millis(5)).await;
//!             for p in 0..10 {
//!                 let job = Tasklet::new(|_ctx: CancellationToken| async { Ok(()) });
//!                 exec.submit(Task::new(job).with_priority(p));
//!             }
//!             ctx.cancel();
//!         })
//!     };
//!
//!     let out = orch.run_with_signals(ctx, exec.routine(), NoSignals).await;
//!     assert!(out.is_ok());
//!     producer.await.unwrap();
//! }
//! ```

mod core;
mod drain;
mod error;
mod events;
mod executor;
mod ops;
mod policies;
mod subscribers;

// ---- Public re-exports ----

pub use crate::core::{Config, NoSignals, Orchestrator, OrchestratorBuilder, OsSignals, SignalSource};
pub use drain::{Coordinator, Loader, LoaderRef, Release, retry_admission};
pub use error::OpError;
pub use events::{Bus, Event, EventKind};
pub use executor::{CPU_BOUND, Executor, ExecutorConfig, IDLE_BOUND, IO_BOUND, Task};
pub use ops::{
    BoxOutcome, Closure, Input, Lock, Op, Outcome, Pred, Predicate, Routine, Statelet, Tasklet,
    fail, nothing, parallel, predicate, sequence,
};
pub use policies::{BackoffPolicy, DrainWait, JitterPolicy, Signal, SignalPolicy};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
