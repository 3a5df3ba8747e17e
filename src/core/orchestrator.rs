//! # Orchestrator: turns signals and cancellation into a safe drain.
//!
//! The [`Orchestrator`] wraps one background [`Routine`] with its own
//! cancellation token and a fresh [`Coordinator`]. The caller's token and OS
//! signals never interrupt the routine directly; they only start the drain
//! protocol, and the routine's token is cancelled strictly after a drain
//! confirmed that no admitted unit is live.
//!
//! ## State machine
//! ```text
//!                     ┌────────────── drain failed / timed out ──────────────┐
//!                     ▼                                                      │
//!   start ──► Accepting (gate open) ──signal in policy──► SignalDraining ────┤
//!                │    │                                   (bounded drain)    │
//!                │    └──caller ctx cancelled──► ContextDraining             │
//!                │                               (unbounded, retried on      │
//!                │                                transient errors)          │
//!                │                                      │          drain ok ─┘
//!                └──routine returned──► SelfTerminated  │               │
//!                                             │         ▼               ▼
//!                                             └────► Terminated ◄── cancel routine,
//!                                                                   await it
//! ```
//!
//! ## Rules
//! - A bounded drain that runs out of time cancels its own scope and is then
//!   joined; it is never abandoned while unload actions still run.
//! - A failed signal drain reopens admission: shutdown can be aborted if
//!   in-flight work does not finish in time.
//! - The unbounded drain must eventually succeed. It is retried while it fails
//!   with a transient error (`Canceled`, `Timeout`); any other failure means a
//!   coordinator contract was broken and panics. A drain that never reaches
//!   zero live units keeps retrying forever; `DrainStalled` events make that
//!   visible.
//! - The routine's final outcome is always returned to the caller; a panic in
//!   the routine is re-raised.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use drainvisor::{Config, LoaderRef, NoSignals, OpError, Orchestrator, Routine};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let routine = Routine::new(|(ctx, loader): (CancellationToken, LoaderRef)| async move {
//!         if let Some(unit) = loader.admit() {
//!             tokio::spawn(async move {
//!                 tokio::time::sleep(Duration::from_millis(5)).await;
//!                 unit.release();
//!             });
//!         }
//!         ctx.cancelled().await;
//!         Err(OpError::Canceled)
//!     });
//!
//!     let ctx = CancellationToken::new();
//!     let stop = ctx.clone();
//!     tokio::spawn(async move {
//!         tokio::time::sleep(Duration::from_millis(20)).await;
//!         stop.cancel();
//!     });
//!
//!     let orch = Orchestrator::new(Config::default());
//!     let out = orch.run_with_signals(ctx, routine, NoSignals).await;
//!     assert_eq!(out, Err(OpError::Canceled));
//! }
//! ```

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};
use tokio_util::sync::CancellationToken;

use super::builder::OrchestratorBuilder;
use super::config::Config;
use super::shutdown::{OsSignals, SignalSource};
use crate::drain::{Coordinator, LoaderRef};
use crate::error::OpError;
use crate::events::{Bus, Event, EventKind};
use crate::ops::{Outcome, Routine};
use crate::policies::DrainWait;

/// Runs a background routine under the drain protocol.
///
/// Dropping the orchestrator stops its subscriber listener; events already on
/// the bus are delivered first.
pub struct Orchestrator {
    cfg: Config,
    bus: Bus,
    stop: CancellationToken,
}

impl Orchestrator {
    /// Builder with subscriber support.
    pub fn builder(cfg: Config) -> OrchestratorBuilder {
        OrchestratorBuilder::new(cfg)
    }

    /// Orchestrator without subscribers.
    pub fn new(cfg: Config) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        Self::new_internal(cfg, bus, CancellationToken::new())
    }

    pub(super) fn new_internal(cfg: Config, bus: Bus, stop: CancellationToken) -> Self {
        Self { cfg, bus, stop }
    }

    /// Event bus shared with every coordinator this orchestrator creates.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Runs `routine`, reacting to `ctx` and to the OS signals named by
    /// [`Config::signals`].
    ///
    /// Returns `OpError::Fatal` without starting the routine if the signal
    /// listeners cannot be registered.
    pub async fn run(&self, ctx: CancellationToken, routine: Routine) -> Outcome {
        let signals = OsSignals::listen(&self.cfg.signals)
            .map_err(|e| OpError::fatal(format!("signal registration failed: {e}")))?;
        self.run_with_signals(ctx, routine, signals).await
    }

    /// Runs `routine`, reacting to `ctx` and to signals read from `signals`.
    ///
    /// Signals without an entry in [`Config::signals`] are ignored. Once
    /// `signals` is exhausted only `ctx` and the routine itself can end the run.
    pub async fn run_with_signals<S: SignalSource>(
        &self,
        ctx: CancellationToken,
        routine: Routine,
        mut signals: S,
    ) -> Outcome {
        let coord = Coordinator::with_poll_interval(self.bus.clone(), self.cfg.poll_interval_clamped());
        let loader: LoaderRef = Arc::new(coord.clone());
        let internal = CancellationToken::new();

        coord.set_accepting(true);
        let mut background = tokio::spawn(routine.call((internal.clone(), loader)));
        let mut listening = true;
        let mut attempt = 0u32;

        loop {
            coord.set_accepting(true);
            tokio::select! {
                sig = signals.recv(), if listening => {
                    let Some(sig) = sig else {
                        listening = false;
                        continue;
                    };
                    let Some(wait) = self.cfg.signals.wait_for(sig) else {
                        self.bus.publish(
                            Event::new(EventKind::SignalReceived)
                                .with_signal(sig)
                                .with_reason("ignored"),
                        );
                        continue;
                    };
                    let mut ev = Event::new(EventKind::SignalReceived).with_signal(sig);
                    if let DrainWait::Bounded(limit) = wait {
                        ev = ev.with_timeout(limit);
                    }
                    self.bus.publish(ev);

                    coord.set_accepting(false);
                    attempt += 1;
                    if self.drive_drain(&coord, wait.limit(), attempt).await.is_ok() {
                        internal.cancel();
                        return self.join_routine(background).await;
                    }
                }
                _ = ctx.cancelled() => {
                    self.bus.publish(Event::new(EventKind::ShutdownRequested));
                    coord.set_accepting(false);
                    loop {
                        attempt += 1;
                        match self.drive_drain(&coord, None, attempt).await {
                            Ok(()) => break,
                            Err(e) if e.is_transient() => {
                                tokio::time::sleep(self.cfg.poll_interval_clamped()).await;
                            }
                            Err(e) => panic!("unbounded drain failed: {e}"),
                        }
                    }
                    internal.cancel();
                    return self.join_routine(background).await;
                }
                res = &mut background => {
                    coord.set_accepting(false);
                    internal.cancel();
                    return self.finish(res);
                }
            }
        }
    }

    /// One drain attempt, bounded by `limit` if given.
    ///
    /// On expiry the drain scope is cancelled and the drain is still awaited;
    /// a drain that then fails with `Canceled` is reported as `Timeout`.
    async fn drive_drain(&self, coord: &Coordinator, limit: Option<Duration>, attempt: u32) -> Outcome {
        let mut started = Event::new(EventKind::DrainStarted)
            .with_live(coord.live_units())
            .with_attempt(attempt);
        if let Some(limit) = limit {
            started = started.with_timeout(limit);
        }
        self.bus.publish(started);

        let begin = Instant::now();
        let scope = CancellationToken::new();
        let drain = coord.drain(scope.clone());
        tokio::pin!(drain);
        let expiry = async {
            match limit {
                Some(d) => tokio::time::sleep(d).await,
                None => pending::<()>().await,
            }
        };
        tokio::pin!(expiry);
        let mut stalls = self
            .cfg
            .stall_report_interval()
            .map(|period| tokio::time::interval_at(begin + period, period));
        let mut expired = false;

        let res = loop {
            tokio::select! {
                res = &mut drain => break res,
                _ = &mut expiry, if !expired => {
                    expired = true;
                    scope.cancel();
                }
                _ = next_tick(&mut stalls) => {
                    self.bus.publish(
                        Event::new(EventKind::DrainStalled)
                            .with_live(coord.live_units())
                            .with_elapsed(begin.elapsed()),
                    );
                }
            }
        };

        let res = match (res, limit) {
            (Err(OpError::Canceled), Some(timeout)) if expired => Err(OpError::Timeout { timeout }),
            (res, _) => res,
        };
        match &res {
            Ok(()) => self.bus.publish(
                Event::new(EventKind::DrainCompleted)
                    .with_attempt(attempt)
                    .with_elapsed(begin.elapsed()),
            ),
            Err(e) => self.bus.publish(
                Event::new(EventKind::DrainAborted)
                    .with_live(coord.live_units())
                    .with_attempt(attempt)
                    .with_elapsed(begin.elapsed())
                    .with_reason(e.to_string()),
            ),
        }
        res
    }

    async fn join_routine(&self, background: JoinHandle<Outcome>) -> Outcome {
        let res = background.await;
        self.finish(res)
    }

    fn finish(&self, res: Result<Outcome, tokio::task::JoinError>) -> Outcome {
        let out = match res {
            Ok(out) => out,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(OpError::fatal(format!("routine aborted: {e}"))),
        };
        let mut ev = Event::new(EventKind::RoutineExited);
        if let Err(e) = &out {
            ev = ev.with_reason(e.to_string());
        }
        self.bus.publish(ev);
        out
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

async fn next_tick(stalls: &mut Option<Interval>) {
    match stalls {
        Some(iv) => {
            iv.tick().await;
        }
        None => pending::<()>().await,
    }
}
