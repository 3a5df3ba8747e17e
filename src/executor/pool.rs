//! # Drain-aware priority worker pool.
//!
//! ```text
//!  submit(task) ──admit()──► Intake (unsorted Vec, short lock)
//!                                 │  notify
//!                                 ▼
//!                      flush worker: top 8n by priority,
//!                      sort outside the lock
//!                                 │  one at a time
//!                                 ▼
//!                      ready channel (capacity n)
//!                        │        │        │
//!                        ▼        ▼        ▼
//!                    worker 1  worker 2 … worker n ── fail + retry? ──► Intake
//!                        │
//!                        └──► release() exactly once
//! ```
//!
//! Priority order is approximate: a task already sitting in the ready
//! channel runs before a higher-priority one submitted after it. Tasks the
//! flush worker holds but has not sent yet are re-sorted against every new
//! submission.
//!
//! ## Lifecycle
//! [`Executor::run`] binds the loader, starts `n` task workers and the flush
//! worker, and waits for its token. On cancellation the flush worker returns
//! what it has not sent to the intake queue and closes the ready channel; the
//! task workers finish whatever is already buffered and exit. `run` returns
//! only after every worker has been joined. Tasks left in intake stay there
//! for a later run.
//!
//! A panicking task is released like a failed one and its worker keeps
//! serving; the first panic payload is re-raised by `run` after the join.
//!
//! One executor serves one `run` at a time.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use tokio::sync::{Mutex as AsyncMutex, Notify, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::config::ExecutorConfig;
use super::intake::Intake;
use super::task::Task;
use crate::drain::{LoaderRef, retry_admission};
use crate::events::{Bus, Event, EventKind};
use crate::ops::predicate::Pred;
use crate::ops::{Outcome, Routine};
use crate::subscribers::panic_message;

type Ready = Arc<AsyncMutex<mpsc::Receiver<Task>>>;
type PanicPayload = Box<dyn Any + Send>;

struct Shared {
    workers: usize,
    intake: Intake,
    wake: Notify,
    loader: Mutex<Option<LoaderRef>>,
    panicked: Mutex<Option<PanicPayload>>,
    bus: Bus,
}

impl Shared {
    fn loader(&self) -> Option<LoaderRef> {
        self.loader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn bind(&self, loader: Option<LoaderRef>) {
        *self.loader.lock().unwrap_or_else(PoisonError::into_inner) = loader;
    }

    /// Keeps the first payload of the current run.
    fn record_panic(&self, payload: PanicPayload) {
        self.panicked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert(payload);
    }

    fn take_panic(&self) -> Option<PanicPayload> {
        self.panicked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn requeue(&self, task: Task) {
        self.intake.push(task);
        self.wake.notify_one();
    }
}

/// Fixed-size, priority-aware worker pool admitted through a drain coordinator.
///
/// Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct Executor {
    shared: Arc<Shared>,
}

impl Executor {
    /// Pool publishing on a bus of its own.
    pub fn new(cfg: ExecutorConfig) -> Self {
        let bus = Bus::new(cfg.bus_capacity);
        Self::with_bus(cfg, bus)
    }

    /// Pool publishing on `bus` (usually the orchestrator's).
    pub fn with_bus(cfg: ExecutorConfig, bus: Bus) -> Self {
        Self {
            shared: Arc::new(Shared {
                workers: cfg.worker_count(),
                intake: Intake::default(),
                wake: Notify::new(),
                loader: Mutex::new(None),
                panicked: Mutex::new(None),
                bus,
            }),
        }
    }

    /// Number of task workers.
    pub fn workers(&self) -> usize {
        self.shared.workers
    }

    /// Tasks waiting in the intake queue.
    pub fn pending(&self) -> usize {
        self.shared.intake.len()
    }

    /// Admits and queues `task`.
    ///
    /// Returns `false` (dropping the task) if the pool is not running or the
    /// admission is denied; treat it as backpressure.
    pub fn submit(&self, task: Task) -> bool {
        self.try_submit(task).is_ok()
    }

    /// Like [`submit`](Self::submit), retrying denials while `retry` allows.
    pub async fn submit_retrying(&self, task: Task, retry: &Pred) -> bool {
        let mut slot = Some(task);
        retry_admission(
            || {
                let task = slot.take()?;
                match self.try_submit(task) {
                    Ok(()) => Some(()),
                    Err(task) => {
                        slot = Some(task);
                        None
                    }
                }
            },
            retry,
        )
        .await
        .is_some()
    }

    fn try_submit(&self, mut task: Task) -> Result<(), Task> {
        let Some(loader) = self.shared.loader() else {
            return Err(task);
        };
        let Some(release) = loader.admit() else {
            return Err(task);
        };
        task.release = Some(release);
        self.shared.requeue(task);
        Ok(())
    }

    /// The pool as a [`Routine`] for an [`Orchestrator`](crate::Orchestrator).
    pub fn routine(&self) -> Routine {
        let this = self.clone();
        Routine::new(move |(ctx, loader): (CancellationToken, LoaderRef)| {
            let this = this.clone();
            async move { this.run(ctx, loader).await }
        })
    }

    /// Runs the workers until `ctx` is cancelled, admitting through `loader`.
    ///
    /// Always returns `Ok(())` once every worker has exited. The first task
    /// panic of the run is re-raised after the join.
    pub async fn run(&self, ctx: CancellationToken, loader: LoaderRef) -> Outcome {
        let shared = &self.shared;
        let n = shared.workers;
        shared.bind(Some(loader));

        let (tx, rx) = mpsc::channel::<Task>(n);
        let rx: Ready = Arc::new(AsyncMutex::new(rx));
        let mut set = JoinSet::new();
        for _ in 0..n {
            set.spawn(task_worker(Arc::clone(shared), Arc::clone(&rx), ctx.clone()));
        }
        set.spawn(flush_worker(Arc::clone(shared), tx, ctx.clone()));
        shared
            .bus
            .publish(Event::new(EventKind::PoolStarted).with_count(n as u64));

        ctx.cancelled().await;
        shared.wake.notify_one();

        let mut panicked = None;
        while let Some(res) = set.join_next().await {
            if let Err(e) = res {
                if e.is_panic() {
                    panicked.get_or_insert(e.into_panic());
                }
            }
        }
        let panicked = shared.take_panic().or(panicked);
        shared.bind(None);
        shared
            .bus
            .publish(Event::new(EventKind::PoolStopped).with_count(shared.intake.len() as u64));

        if let Some(payload) = panicked {
            std::panic::resume_unwind(payload);
        }
        Ok(())
    }
}

async fn flush_worker(shared: Arc<Shared>, tx: mpsc::Sender<Task>, ctx: CancellationToken) {
    let max = shared.workers.saturating_mul(8);
    'flush: while !ctx.is_cancelled() {
        let batch = shared.intake.take_batch(max);
        if batch.is_empty() {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => break,
                _ = shared.wake.notified() => continue,
            }
        }
        shared.bus.publish(
            Event::new(EventKind::BatchFlushed)
                .with_count(batch.len() as u64)
                .with_priority(batch[0].priority),
        );

        let mut batch = batch.into_iter();
        while let Some(task) = batch.next() {
            let permit = tokio::select! {
                biased;
                _ = ctx.cancelled() => None,
                permit = tx.reserve() => permit.ok(),
                _ = shared.wake.notified() => {
                    // new work arrived: re-sort what is still held
                    shared.intake.extend(std::iter::once(task).chain(batch));
                    continue 'flush;
                }
            };
            match permit {
                Some(permit) => permit.send(task),
                None => {
                    shared.intake.extend(std::iter::once(task).chain(batch));
                    break 'flush;
                }
            }
        }
    }
}

async fn task_worker(shared: Arc<Shared>, ready: Ready, ctx: CancellationToken) {
    loop {
        let next = ready.lock().await.recv().await;
        let Some(mut task) = next else {
            break;
        };

        task.attempts += 1;
        let run = AssertUnwindSafe(task.action.call(ctx.clone()))
            .catch_unwind()
            .await;
        let out = match run {
            Ok(out) => out,
            Err(payload) => {
                shared.bus.publish(
                    Event::new(EventKind::TaskFailed)
                        .with_priority(task.priority)
                        .with_attempt(task.attempts)
                        .with_reason(format!("panicked: {}", panic_message(&*payload))),
                );
                task.finish();
                shared.record_panic(payload);
                continue;
            }
        };
        let Err(e) = &out else {
            task.finish();
            continue;
        };

        let retry = match &task.retry {
            Some(p) => p.check(&out).await,
            None => false,
        };
        let ev = Event::new(if retry {
            EventKind::TaskRequeued
        } else {
            EventKind::TaskFailed
        })
        .with_priority(task.priority)
        .with_attempt(task.attempts)
        .with_reason(e.to_string());
        shared.bus.publish(ev);

        if retry {
            shared.requeue(task);
        } else {
            task.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Config, NoSignals, Orchestrator};
    use crate::drain::Coordinator;
    use crate::error::OpError;
    use crate::ops::{Tasklet, predicate};
    use crate::policies::SignalPolicy;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn open_coordinator() -> (Coordinator, LoaderRef) {
        let coord = Coordinator::new(Bus::new(256));
        coord.set_accepting(true);
        let loader: LoaderRef = Arc::new(coord.clone());
        (coord, loader)
    }

    async fn settle(coord: &Coordinator) {
        while coord.live_units() > 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test]
    async fn high_priority_overtakes_queued_lows() {
        let (coord, loader) = open_coordinator();
        let exec = Executor::new(ExecutorConfig::fixed(1));
        let ctx = CancellationToken::new();
        let run = tokio::spawn({
            let (exec, ctx) = (exec.clone(), ctx.clone());
            async move { exec.run(ctx, loader).await }
        });
        while !coord.is_accepting() || exec.shared.loader().is_none() {
            tokio::task::yield_now().await;
        }

        let started = Arc::new(Notify::new());
        let gate = Arc::new(Notify::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let blocker = {
            let (started, gate) = (Arc::clone(&started), Arc::clone(&gate));
            Tasklet::new(move |_ctx| {
                let (started, gate) = (Arc::clone(&started), Arc::clone(&gate));
                async move {
                    started.notify_one();
                    gate.notified().await;
                    Ok(())
                }
            })
        };
        assert!(exec.submit(Task::new(blocker)));
        started.notified().await;

        let record = |p: i64| {
            let order = Arc::clone(&order);
            Task::new(Tasklet::new(move |_ctx| {
                let order = Arc::clone(&order);
                async move {
                    order.lock().unwrap().push(p);
                    Ok(())
                }
            }))
            .with_priority(p)
        };
        for _ in 0..20 {
            assert!(exec.submit(record(1)));
        }
        assert!(exec.submit(record(100)));
        gate.notify_one();

        settle(&coord).await;
        let order = order.lock().unwrap().clone();
        assert_eq!(order.len(), 21);
        assert_eq!(order[0], 100);

        ctx.cancel();
        assert_eq!(run.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn failed_task_is_requeued_until_retry_says_no() {
        let (coord, loader) = open_coordinator();
        let exec = Executor::new(ExecutorConfig::fixed(2));
        let ctx = CancellationToken::new();
        let run = tokio::spawn({
            let (exec, ctx) = (exec.clone(), ctx.clone());
            async move { exec.run(ctx, loader).await }
        });
        while exec.shared.loader().is_none() {
            tokio::task::yield_now().await;
        }

        let runs = Arc::new(AtomicU32::new(0));
        let flaky = {
            let runs = Arc::clone(&runs);
            Tasklet::new(move |_ctx| {
                let runs = Arc::clone(&runs);
                async move {
                    if runs.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(OpError::fail("flaky"))
                    } else {
                        Ok(())
                    }
                }
            })
        };
        assert!(exec.submit(Task::new(flaky).with_retry(predicate::tries_lt(10))));

        let hopeless = Task::new(crate::ops::fail(OpError::fail("never")))
            .with_retry(predicate::tries_lt(3));
        assert!(exec.submit(hopeless));

        settle(&coord).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(coord.live_units(), 0);

        ctx.cancel();
        assert_eq!(run.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn submit_is_denied_when_not_running_or_gate_closed() {
        let exec = Executor::new(ExecutorConfig::fixed(1));
        assert!(!exec.submit(Task::new(crate::ops::nothing())));

        let (coord, loader) = open_coordinator();
        coord.set_accepting(false);
        let ctx = CancellationToken::new();
        let run = tokio::spawn({
            let (exec, ctx) = (exec.clone(), ctx.clone());
            async move { exec.run(ctx, loader).await }
        });
        while exec.shared.loader().is_none() {
            tokio::task::yield_now().await;
        }
        assert!(!exec.submit(Task::new(crate::ops::nothing())));
        assert_eq!(exec.pending(), 0);

        ctx.cancel();
        assert_eq!(run.await.unwrap(), Ok(()));
        assert!(!exec.submit(Task::new(crate::ops::nothing())));
    }

    #[tokio::test(start_paused = true)]
    async fn submit_retrying_waits_for_the_gate() {
        let (coord, loader) = open_coordinator();
        coord.set_accepting(false);
        let exec = Executor::new(ExecutorConfig::fixed(1));
        let ctx = CancellationToken::new();
        let run = tokio::spawn({
            let (exec, ctx) = (exec.clone(), ctx.clone());
            async move { exec.run(ctx, loader).await }
        });

        let opener = coord.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            opener.set_accepting(true);
        });

        let retry = predicate::backoff(Duration::from_millis(5), Duration::from_millis(20));
        assert!(exec.submit_retrying(Task::new(crate::ops::nothing()), &retry).await);
        settle(&coord).await;

        ctx.cancel();
        assert_eq!(run.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn cancellation_stops_every_worker() {
        let (coord, loader) = open_coordinator();
        let exec = Executor::new(ExecutorConfig::fixed(4));
        let mut events = exec.shared.bus.subscribe();
        let ctx = CancellationToken::new();
        let run = tokio::spawn({
            let (exec, ctx) = (exec.clone(), ctx.clone());
            async move { exec.run(ctx, loader).await }
        });
        while exec.shared.loader().is_none() {
            tokio::task::yield_now().await;
        }

        for p in 0..16 {
            let waiting = Tasklet::new(|ctx: CancellationToken| async move {
                ctx.cancelled().await;
                Err(OpError::Canceled)
            });
            assert!(exec.submit(Task::new(waiting).with_priority(p)));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        ctx.cancel();
        assert_eq!(run.await.unwrap(), Ok(()));

        assert_eq!(coord.live_units() as usize, exec.pending());
        let mut stopped = false;
        while let Ok(ev) = events.try_recv() {
            stopped |= ev.kind == EventKind::PoolStopped;
        }
        assert!(stopped);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn high_priority_passes_lows_not_yet_in_the_ready_buffer() {
        let (coord, loader) = open_coordinator();
        let exec = Executor::new(ExecutorConfig::fixed(1));
        let ctx = CancellationToken::new();
        let run = tokio::spawn({
            let (exec, ctx) = (exec.clone(), ctx.clone());
            async move { exec.run(ctx, loader).await }
        });
        while exec.shared.loader().is_none() {
            tokio::task::yield_now().await;
        }

        let started = Arc::new(Notify::new());
        let gate = Arc::new(Notify::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let blocker = {
            let (started, gate) = (Arc::clone(&started), Arc::clone(&gate));
            Tasklet::new(move |_ctx| {
                let (started, gate) = (Arc::clone(&started), Arc::clone(&gate));
                async move {
                    started.notify_one();
                    gate.notified().await;
                    Ok(())
                }
            })
        };
        assert!(exec.submit(Task::new(blocker)));
        started.notified().await;

        let record = |p: i64| {
            let order = Arc::clone(&order);
            Task::new(Tasklet::new(move |_ctx| {
                let order = Arc::clone(&order);
                async move {
                    order.lock().unwrap().push(p);
                    Ok(())
                }
            }))
            .with_priority(p)
        };
        // lows trickle in so the flush worker sees many small batches
        for _ in 0..20 {
            assert!(exec.submit(record(1)));
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(exec.submit(record(100)));
        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.notify_one();

        settle(&coord).await;
        let order = order.lock().unwrap().clone();
        assert_eq!(order.len(), 21);
        // one worker: at most one low was already in the ready buffer
        let high = order.iter().position(|&p| p == 100);
        assert!(high <= Some(1), "order: {order:?}");

        ctx.cancel();
        assert_eq!(run.await.unwrap(), Ok(()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn task_panic_is_released_and_reraised_after_shutdown() {
        let cfg = Config {
            poll_interval: Duration::from_millis(1),
            stall_report: Duration::ZERO,
            signals: SignalPolicy::new(),
            ..Config::default()
        };
        let orch = Orchestrator::new(cfg);
        let exec = Executor::with_bus(ExecutorConfig::fixed(1), orch.bus().clone());
        let ctx = CancellationToken::new();
        let run = tokio::spawn({
            let (routine, ctx) = (exec.routine(), ctx.clone());
            async move { orch.run_with_signals(ctx, routine, NoSignals).await }
        });
        while exec.shared.loader().is_none() {
            tokio::task::yield_now().await;
        }

        let boom = Tasklet::new(|_ctx| async {
            if true {
                panic!("task boom");
            }
            Ok(())
        });
        assert!(exec.submit(Task::new(boom)));

        let ok_runs = Arc::new(AtomicU32::new(0));
        let ok = {
            let ok_runs = Arc::clone(&ok_runs);
            Tasklet::new(move |_ctx| {
                let ok_runs = Arc::clone(&ok_runs);
                async move {
                    ok_runs.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
        };
        assert!(exec.submit(Task::new(ok)));
        ctx.cancel();

        let joined = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("shutdown finished despite the panic");
        let err = joined.expect_err("task panic is re-raised");
        assert!(err.is_panic());
        let payload = err.into_panic();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"task boom"));
        assert_eq!(ok_runs.load(Ordering::SeqCst), 1);
        assert_eq!(exec.pending(), 0);
    }
}
