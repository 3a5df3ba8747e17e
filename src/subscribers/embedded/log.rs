//! # LogWriter: simple event printer
//!
//! Prints incoming [`Event`]s to stdout. Meant for demos and debugging.
//!
//! ## Example output
//! ```text
//! [signal] SIGHUP timeout_ms=Some(5000)
//! [admission-closed] live=42
//! [drain-started] attempt=1 live=42 timeout_ms=Some(5000)
//! [drain-stalled] live=3 elapsed_ms=10000
//! [drain-aborted] attempt=1 live=3 reason="timed out after 5s"
//! [admission-opened] live=3
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let live = e.live.unwrap_or_default();
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::SubscriberPanicked => println!(
                "[subscriber-panicked] subscriber={} info={}",
                e.source.as_deref().unwrap_or("unknown"),
                reason,
            ),
            EventKind::SubscriberOverflow => println!(
                "[subscriber-overflow] subscriber={:?} reason={reason:?}",
                e.source
            ),
            EventKind::AdmissionOpened => println!("[admission-opened] live={live}"),
            EventKind::AdmissionClosed => println!("[admission-closed] live={live}"),
            EventKind::UnitAdmitted => println!("[admitted] live={live}"),
            EventKind::UnitReleased => println!("[released] live={live}"),
            EventKind::UnloadRegistered => {
                println!("[unload-registered] live={live} unloads={:?}", e.count)
            }
            EventKind::SignalReceived => match e.signal {
                Some(sig) if reason.is_empty() => {
                    println!("[signal] {sig} timeout_ms={:?}", e.timeout_ms)
                }
                Some(sig) => println!("[signal] {sig} {reason}"),
                None => println!("[signal] unknown"),
            },
            EventKind::ShutdownRequested => println!("[shutdown-requested]"),
            EventKind::DrainStarted => println!(
                "[drain-started] attempt={:?} live={live} timeout_ms={:?}",
                e.attempt, e.timeout_ms
            ),
            EventKind::DrainCompleted => println!(
                "[drain-completed] attempt={:?} elapsed_ms={:?}",
                e.attempt, e.elapsed_ms
            ),
            EventKind::DrainAborted => println!(
                "[drain-aborted] attempt={:?} live={live} reason={reason:?}",
                e.attempt
            ),
            EventKind::DrainStalled => println!(
                "[drain-stalled] live={live} elapsed_ms={}",
                e.elapsed_ms.unwrap_or_default()
            ),
            EventKind::RoutineExited => println!("[routine-exited] err={reason:?}"),
            EventKind::PoolStarted => println!("[pool-started] workers={:?}", e.count),
            EventKind::PoolStopped => println!("[pool-stopped] pending={:?}", e.count),
            EventKind::BatchFlushed => println!(
                "[batch] size={:?} top_priority={:?}",
                e.count, e.priority
            ),
            EventKind::TaskRequeued => println!(
                "[requeued] priority={:?} attempt={:?} err={reason:?}",
                e.priority, e.attempt
            ),
            EventKind::TaskFailed => println!(
                "[failed] priority={:?} attempt={:?} err={reason:?}",
                e.priority, e.attempt
            ),
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
