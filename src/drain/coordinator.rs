//! # Drain coordinator: admission gate and live-unit accounting.
//!
//! One [`Coordinator`] exists per orchestrated run. It answers two questions:
//! may new work start (`accepting`), and how much admitted work is still in
//! flight (`live`).
//!
//! ```text
//!  admit() ──► accepting? ──no──► None
//!                 │yes
//!                 ▼
//!             live += 1 ──► Release ──release()──► live -= 1 (once)
//!
//!  admit_with_unload(u) ──► live += 1, pipeline.push(once(release; u))
//!
//!  drain(ctx) = run_unload_pipeline(ctx) ∥ wait_drained(ctx)
//! ```
//!
//! ## Rules
//! - The state mutex is never held across `.await` or user code.
//! - `live` only increases on a granted admission and only decreases through
//!   the first call of that admission's [`Release`].
//! - Each registered unload runs at most once. Running the pipeline consumes
//!   it: a drain retried after an abort does not see unloads that already ran.
//! - [`Coordinator::wait_drained`] while accepting is a caller bug and panics.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::loader::Loader;
use super::release::Release;
use crate::error::OpError;
use crate::events::{Bus, Event, EventKind};
use crate::ops::{Outcome, Tasklet, parallel};

/// Default interval at which [`Coordinator::wait_drained`] re-reads `live`.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

struct State {
    accepting: bool,
    live: u64,
    unloads: Vec<Tasklet>,
}

pub(super) struct Inner {
    state: Mutex<State>,
    bus: Bus,
    poll: Duration,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn decrement(&self) {
        let live = {
            let mut st = self.lock();
            st.live = st.live.saturating_sub(1);
            st.live
        };
        self.bus
            .publish(Event::new(EventKind::UnitReleased).with_live(live));
    }
}

/// Admission gate plus live-unit counter. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    /// New coordinator, closed (not accepting), polling every 5ms.
    pub fn new(bus: Bus) -> Self {
        Self::with_poll_interval(bus, DEFAULT_POLL_INTERVAL)
    }

    /// New coordinator with a custom drain poll interval (at least 1ms).
    pub fn with_poll_interval(bus: Bus, poll: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    accepting: false,
                    live: 0,
                    unloads: Vec::new(),
                }),
                bus,
                poll: poll.max(Duration::from_millis(1)),
            }),
        }
    }

    /// Opens or closes the gate. Never blocks on in-flight work.
    pub fn set_accepting(&self, accepting: bool) {
        let (changed, live) = {
            let mut st = self.inner.lock();
            let changed = st.accepting != accepting;
            st.accepting = accepting;
            (changed, st.live)
        };
        if changed {
            let kind = if accepting {
                EventKind::AdmissionOpened
            } else {
                EventKind::AdmissionClosed
            };
            self.inner.bus.publish(
                Event::new(kind)
                    .with_live(live)
                    .with_accepting(accepting),
            );
        }
    }

    /// Admits one unit if accepting.
    pub fn admit(&self) -> Option<Release> {
        let live = {
            let mut st = self.inner.lock();
            if !st.accepting {
                return None;
            }
            st.live += 1;
            st.live
        };
        self.inner
            .bus
            .publish(Event::new(EventKind::UnitAdmitted).with_live(live));
        Some(Release::new(Arc::clone(&self.inner)))
    }

    /// Admits one unit and registers `unload` to release it during the drain.
    pub fn admit_with_unload(&self, unload: Tasklet) -> bool {
        let (live, count) = {
            let mut st = self.inner.lock();
            if !st.accepting {
                return false;
            }
            st.live += 1;

            let release = Release::new(Arc::clone(&self.inner));
            let wrapped = Tasklet::new(move |ctx: CancellationToken| {
                release.release();
                unload.call(ctx)
            })
            .once();
            st.unloads.push(wrapped);
            (st.live, st.unloads.len())
        };
        self.inner.bus.publish(
            Event::new(EventKind::UnloadRegistered)
                .with_live(live)
                .with_count(count as u64),
        );
        true
    }

    /// Runs every registered unload concurrently; `Ok(())` if there are none.
    ///
    /// The first failing unload cancels the others (via `ctx`-derived scope)
    /// and its error is returned once all of them have finished.
    pub async fn run_unload_pipeline(&self, ctx: CancellationToken) -> Outcome {
        let unloads = std::mem::take(&mut self.inner.lock().unloads);
        if unloads.is_empty() {
            return Ok(());
        }
        parallel(unloads).call(ctx).await
    }

    /// Waits until no unit is live.
    ///
    /// A zero count wins over cancellation; otherwise returns
    /// `Err(OpError::Canceled)` once `ctx` fires.
    ///
    /// # Panics
    /// If the coordinator is still accepting admissions.
    pub async fn wait_drained(&self, ctx: CancellationToken) -> Outcome {
        loop {
            {
                let st = self.inner.lock();
                if st.accepting {
                    drop(st);
                    panic!("wait_drained called while accepting admissions");
                }
                if st.live == 0 {
                    return Ok(());
                }
            }
            if ctx.is_cancelled() {
                return Err(OpError::Canceled);
            }
            tokio::select! {
                _ = tokio::time::sleep(self.inner.poll) => {}
                _ = ctx.cancelled() => {}
            }
        }
    }

    /// Unload pipeline and [`wait_drained`](Self::wait_drained) in parallel.
    pub async fn drain(&self, ctx: CancellationToken) -> Outcome {
        self.drain_op().call(ctx).await
    }

    /// The drain as a reusable [`Tasklet`].
    pub fn drain_op(&self) -> Tasklet {
        let pipeline = self.clone();
        let waiter = self.clone();
        Tasklet::new(move |ctx: CancellationToken| {
            let c = pipeline.clone();
            async move { c.run_unload_pipeline(ctx).await }
        })
        .par([Tasklet::new(move |ctx: CancellationToken| {
            let c = waiter.clone();
            async move { c.wait_drained(ctx).await }
        })])
    }

    pub fn live_units(&self) -> u64 {
        self.inner.lock().live
    }

    pub fn is_accepting(&self) -> bool {
        self.inner.lock().accepting
    }

    /// Number of registered unloads not yet run.
    pub fn pending_unloads(&self) -> usize {
        self.inner.lock().unloads.len()
    }

    /// Bus this coordinator publishes on.
    pub fn bus(&self) -> &Bus {
        &self.inner.bus
    }
}

impl Loader for Coordinator {
    fn admit(&self) -> Option<Release> {
        Coordinator::admit(self)
    }

    fn admit_with_unload(&self, unload: Tasklet) -> bool {
        Coordinator::admit_with_unload(self, unload)
    }

    fn live_units(&self) -> u64 {
        Coordinator::live_units(self)
    }

    fn is_accepting(&self) -> bool {
        Coordinator::is_accepting(self)
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.inner.lock();
        f.debug_struct("Coordinator")
            .field("accepting", &st.accepting)
            .field("live", &st.live)
            .field("unloads", &st.unloads.len())
            .finish()
    }
}
