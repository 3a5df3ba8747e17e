//! # Backoff delays for retry loops.
//!
//! [`BackoffPolicy`] computes the sleep inserted by the
//! [`backoff`](crate::predicate::backoff) predicate between retries of an
//! admission or an executor task. The delay for attempt `n` is
//! `first × factor^n`, clamped to `max`, then jittered. The base is derived
//! from the attempt number only, so jitter never feeds back into later delays.
//!
//! ```rust
//! use std::time::Duration;
//! use drainvisor::BackoffPolicy;
//!
//! let p = BackoffPolicy::doubling(Duration::from_millis(100), Duration::from_secs(10));
//! assert_eq!(p.next(0), Duration::from_millis(100));
//! assert_eq!(p.next(1), Duration::from_millis(200));
//! assert_eq!(p.next(10), Duration::from_secs(10));
//! ```

use std::time::Duration;

use super::jitter::JitterPolicy;

/// Retry delay schedule.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay of attempt 0.
    pub first: Duration,
    /// Upper bound on any delay.
    pub max: Duration,
    /// Growth factor per attempt (`>= 1.0` is the sane range).
    pub factor: f64,
    /// Randomization applied after clamping.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Doubling from 1ms up to 1s, no jitter.
    fn default() -> Self {
        Self::doubling(Duration::from_millis(1), Duration::from_secs(1))
    }
}

impl BackoffPolicy {
    /// Doubling delays starting at `start`, capped at `ceil`, no jitter.
    pub fn doubling(start: Duration, ceil: Duration) -> Self {
        Self {
            first: start,
            max: ceil,
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Same schedule with a different jitter.
    pub fn with_jitter(mut self, jitter: JitterPolicy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay for the given 0-indexed attempt.
    pub fn next(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_capped() {
        let p = BackoffPolicy::doubling(Duration::from_millis(100), Duration::from_secs(1));
        assert_eq!(p.next(0), Duration::from_millis(100));
        assert_eq!(p.next(1), Duration::from_millis(200));
        assert_eq!(p.next(2), Duration::from_millis(400));
        assert_eq!(p.next(3), Duration::from_millis(800));
        assert_eq!(p.next(4), Duration::from_secs(1));
    }

    #[test]
    fn constant_factor() {
        let p = BackoffPolicy {
            first: Duration::from_millis(500),
            max: Duration::from_secs(30),
            factor: 1.0,
            jitter: JitterPolicy::None,
        };
        for attempt in 0..10 {
            assert_eq!(p.next(attempt), Duration::from_millis(500));
        }
    }

    #[test]
    fn first_above_max_is_clamped() {
        let p = BackoffPolicy::doubling(Duration::from_secs(10), Duration::from_secs(5));
        assert_eq!(p.next(0), Duration::from_secs(5));
    }

    #[test]
    fn overflow_clamps_to_max() {
        let p = BackoffPolicy::doubling(Duration::from_millis(100), Duration::from_secs(10));
        assert_eq!(p.next(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn jitter_never_exceeds_base() {
        let p = BackoffPolicy::doubling(Duration::from_millis(100), Duration::from_secs(30))
            .with_jitter(JitterPolicy::Full);
        for attempt in 0..12 {
            let base = Duration::from_millis(100 * 2u64.pow(attempt)).min(Duration::from_secs(30));
            assert!(p.next(attempt) <= base, "attempt {attempt}");
        }
    }
}
