//! # Per-signal drain budgets.
//!
//! [`SignalPolicy`] maps each recognized [`Signal`] to the longest the
//! orchestrator waits for a drain before giving up and reopening admission.
//! Signals with no entry are ignored.
//!
//! Default:
//! - `SIGHUP`  → 5s
//! - `SIGINT`  → unbounded
//! - `SIGTERM` → unbounded

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// External interrupt signals the orchestrator can react to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Signal {
    Hangup,
    Interrupt,
    Terminate,
    Quit,
}

impl Signal {
    /// Conventional unix name, e.g. `"SIGTERM"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Hangup => "SIGHUP",
            Signal::Interrupt => "SIGINT",
            Signal::Terminate => "SIGTERM",
            Signal::Quit => "SIGQUIT",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How long a signal-triggered drain may take.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrainWait {
    /// Abort the drain after this long. `Duration::ZERO` aborts immediately
    /// unless the drain is already complete.
    Bounded(Duration),
    /// Wait as long as it takes.
    Unbounded,
}

impl DrainWait {
    /// Bound as an `Option` (`None` = unbounded).
    pub fn limit(&self) -> Option<Duration> {
        match self {
            DrainWait::Bounded(d) => Some(*d),
            DrainWait::Unbounded => None,
        }
    }
}

/// Mapping from signal to drain budget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignalPolicy {
    waits: HashMap<Signal, DrainWait>,
}

impl SignalPolicy {
    /// Empty policy: every signal is ignored.
    pub fn new() -> Self {
        Self {
            waits: HashMap::new(),
        }
    }

    /// Adds or replaces the entry for `signal`.
    pub fn with(mut self, signal: Signal, wait: DrainWait) -> Self {
        self.waits.insert(signal, wait);
        self
    }

    /// Budget for `signal`, `None` if the signal is not recognized.
    pub fn wait_for(&self, signal: Signal) -> Option<DrainWait> {
        self.waits.get(&signal).copied()
    }

    /// Recognized signals, in no particular order.
    pub fn signals(&self) -> impl Iterator<Item = Signal> + '_ {
        self.waits.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.waits.is_empty()
    }
}

impl Default for SignalPolicy {
    fn default() -> Self {
        Self::new()
            .with(Signal::Hangup, DrainWait::Bounded(Duration::from_secs(5)))
            .with(Signal::Interrupt, DrainWait::Unbounded)
            .with(Signal::Terminate, DrainWait::Unbounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy() {
        let p = SignalPolicy::default();
        assert_eq!(
            p.wait_for(Signal::Hangup),
            Some(DrainWait::Bounded(Duration::from_secs(5)))
        );
        assert_eq!(p.wait_for(Signal::Interrupt), Some(DrainWait::Unbounded));
        assert_eq!(p.wait_for(Signal::Terminate), Some(DrainWait::Unbounded));
        assert_eq!(p.wait_for(Signal::Quit), None);
        assert_eq!(p.signals().count(), 3);
    }

    #[test]
    fn with_replaces_entry() {
        let p = SignalPolicy::default().with(Signal::Interrupt, DrainWait::Bounded(Duration::ZERO));
        assert_eq!(
            p.wait_for(Signal::Interrupt).and_then(|w| w.limit()),
            Some(Duration::ZERO)
        );
        assert!(SignalPolicy::new().is_empty());
    }
}
