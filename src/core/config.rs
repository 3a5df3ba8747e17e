//! # Orchestrator configuration.
//!
//! [`Config`] centralizes the knobs of one [`Orchestrator`](crate::Orchestrator)
//! run: event bus size, drain poll interval, stall reporting and the signal
//! policy.
//!
//! ## Sentinel values
//! - `stall_report = 0s` → no `DrainStalled` events
//! - `poll_interval` below 1ms is raised to 1ms
//! - `bus_capacity = 0` is raised to 1

use std::time::Duration;

use crate::drain::DEFAULT_POLL_INTERVAL;
use crate::policies::SignalPolicy;

/// Configuration of an orchestrated run.
///
/// All fields are public; prefer the helper accessors over sprinkling
/// sentinel checks across the code.
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the event bus ring buffer (min 1).
    pub bus_capacity: usize,

    /// How often `wait_drained` re-reads the live count, and the pause
    /// between retries of an unbounded drain.
    pub poll_interval: Duration,

    /// Period of `DrainStalled` events while a drain is in progress.
    ///
    /// `Duration::ZERO` disables them.
    pub stall_report: Duration,

    /// Which signals start a drain and how long it may take.
    pub signals: SignalPolicy,
}

impl Config {
    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Poll interval clamped to a minimum of 1ms.
    #[inline]
    pub fn poll_interval_clamped(&self) -> Duration {
        self.poll_interval.max(Duration::from_millis(1))
    }

    /// Stall report period as an `Option` (`None` = disabled).
    #[inline]
    pub fn stall_report_interval(&self) -> Option<Duration> {
        if self.stall_report.is_zero() {
            None
        } else {
            Some(self.stall_report)
        }
    }
}

impl Default for Config {
    /// - `bus_capacity = 1024`
    /// - `poll_interval = 5ms`
    /// - `stall_report = 10s`
    /// - `signals = SignalPolicy::default()` (SIGHUP 5s, SIGINT/SIGTERM unbounded)
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            poll_interval: DEFAULT_POLL_INTERVAL,
            stall_report: Duration::from_secs(10),
            signals: SignalPolicy::default(),
        }
    }
}
