//! # Events emitted by the coordinator, orchestrator and executor.
//!
//! [`EventKind`] groups into:
//! - **Subscriber events**: delivery problems inside [`SubscriberSet`](crate::SubscriberSet)
//! - **Admission events**: gate state and unit accounting
//! - **Shutdown events**: signals, drains and their results
//! - **Executor events**: pool lifecycle, batching, retries
//!
//! [`Event`] carries a timestamp, a global sequence number and optional
//! metadata that depends on the kind.
//!
//! ## Ordering guarantees
//! `seq` is globally unique and increases monotonically; use it to restore
//! order when events arrive interleaved.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use drainvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::DrainStalled)
//!     .with_live(3)
//!     .with_elapsed(Duration::from_secs(10));
//!
//! assert_eq!(ev.kind, EventKind::DrainStalled);
//! assert_eq!(ev.live, Some(3));
//! assert_eq!(ev.elapsed_ms, Some(10_000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::policies::Signal;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked while processing an event.
    ///
    /// Sets: `source` (subscriber name), `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event.
    ///
    /// Sets: `source` (subscriber name), `reason` ("full" or "closed").
    SubscriberOverflow,

    // === Admission events ===
    /// The coordinator started accepting admissions.
    ///
    /// Sets: `live`, `accepting`.
    AdmissionOpened,

    /// The coordinator stopped accepting admissions.
    ///
    /// Sets: `live`, `accepting`.
    AdmissionClosed,

    /// A unit was admitted.
    ///
    /// Sets: `live` (after the increment).
    UnitAdmitted,

    /// A unit was released.
    ///
    /// Sets: `live` (after the decrement).
    UnitReleased,

    /// A unit was admitted together with an unload action.
    ///
    /// Sets: `live`, `count` (registered unloads).
    UnloadRegistered,

    // === Shutdown events ===
    /// An OS signal (or injected one) was received.
    ///
    /// Sets: `signal`, `timeout_ms` (absent when the drain is unbounded or the
    /// signal is not in the policy), `reason` ("ignored" for unknown signals).
    SignalReceived,

    /// The caller's cancellation token fired.
    ShutdownRequested,

    /// A drain attempt started.
    ///
    /// Sets: `live`, `attempt`, `timeout_ms` (if bounded).
    DrainStarted,

    /// A drain attempt succeeded.
    ///
    /// Sets: `attempt`, `elapsed_ms`.
    DrainCompleted,

    /// A drain attempt failed or timed out; admission is reopened.
    ///
    /// Sets: `live`, `attempt`, `elapsed_ms`, `reason`.
    DrainAborted,

    /// A drain is taking long; emitted periodically while it runs.
    ///
    /// Sets: `live`, `elapsed_ms`.
    DrainStalled,

    /// The background routine returned.
    ///
    /// Sets: `reason` (error message, if it failed).
    RoutineExited,

    // === Executor events ===
    /// Executor workers are running.
    ///
    /// Sets: `count` (task workers).
    PoolStarted,

    /// Executor workers have all exited.
    ///
    /// Sets: `count` (tasks left in intake).
    PoolStopped,

    /// The flush worker moved a sorted batch out of intake.
    ///
    /// Sets: `count` (batch size), `priority` (highest in batch).
    BatchFlushed,

    /// A failed task was put back on intake.
    ///
    /// Sets: `priority`, `attempt`, `reason`.
    TaskRequeued,

    /// A task failed or panicked and will not be retried.
    ///
    /// Sets: `priority`, `attempt`, `reason` (`"panicked: .."` for panics).
    TaskFailed,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Live unit count observed when the event was built.
    pub live: Option<u64>,
    /// Admission gate state.
    pub accepting: Option<bool>,
    /// Signal that triggered the event.
    pub signal: Option<Signal>,
    /// Drain budget in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Time spent so far in milliseconds (compact).
    pub elapsed_ms: Option<u32>,
    /// Attempt number (starting from 1).
    pub attempt: Option<u32>,
    /// Executor task priority.
    pub priority: Option<i64>,
    /// Generic counter (batch size, workers, unloads).
    pub count: Option<u64>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Emitting component or subscriber name.
    pub source: Option<Arc<str>>,
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            live: None,
            accepting: None,
            signal: None,
            timeout_ms: None,
            elapsed_ms: None,
            attempt: None,
            priority: None,
            count: None,
            reason: None,
            source: None,
        }
    }

    #[inline]
    pub fn with_live(mut self, live: u64) -> Self {
        self.live = Some(live);
        self
    }

    #[inline]
    pub fn with_accepting(mut self, accepting: bool) -> Self {
        self.accepting = Some(accepting);
        self
    }

    #[inline]
    pub fn with_signal(mut self, signal: Signal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Attaches a drain budget (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches elapsed time (stored as milliseconds).
    #[inline]
    pub fn with_elapsed(mut self, d: Duration) -> Self {
        self.elapsed_ms = Some(compact_ms(d));
        self
    }

    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    #[inline]
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    #[inline]
    pub fn with_count(mut self, n: u64) -> Self {
        self.count = Some(n);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[inline]
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_source(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_source(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_monotonic() {
        let a = Event::new(EventKind::UnitAdmitted);
        let b = Event::new(EventKind::UnitReleased);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn durations_saturate() {
        let ev = Event::new(EventKind::DrainStarted).with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }

    #[test]
    fn subscriber_helpers() {
        let ev = Event::subscriber_overflow("log", "full");
        assert!(ev.is_subscriber_overflow());
        assert_eq!(ev.source.as_deref(), Some("log"));
        let panicked = Event::subscriber_panicked("log", "boom".into());
        assert_eq!(panicked.kind, EventKind::SubscriberPanicked);
        assert!(!panicked.is_subscriber_overflow());
    }
}
