//! # Jitter for backoff delays.
//!
//! Many executor tasks retrying against the same failing dependency would
//! otherwise wake up in lock-step. [`JitterPolicy`] randomizes each delay
//! produced by [`BackoffPolicy`](crate::BackoffPolicy):
//!
//! - [`JitterPolicy::None`] exact delay;
//! - [`JitterPolicy::Full`] uniform in `[0, delay]`;
//! - [`JitterPolicy::Equal`] `delay/2 + uniform[0, delay/2]`.

use std::time::Duration;

use rand::Rng;

/// Randomization applied to a computed backoff delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Use the delay as computed.
    #[default]
    None,
    /// Uniform in `[0, delay]`.
    Full,
    /// Half the delay plus uniform `[0, delay/2]`.
    Equal,
}

impl JitterPolicy {
    /// Applies the jitter to `delay`. Millisecond granularity.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = delay.as_millis() as u64;
        if ms == 0 {
            return delay;
        }
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => Duration::from_millis(rand::rng().random_range(0..=ms)),
            JitterPolicy::Equal => {
                let half = ms / 2;
                let spread = if half == 0 {
                    0
                } else {
                    rand::rng().random_range(0..=half)
                };
                Duration::from_millis(half + spread)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_identity() {
        let d = Duration::from_micros(1500);
        assert_eq!(JitterPolicy::None.apply(d), d);
    }

    #[test]
    fn full_stays_within_delay() {
        for _ in 0..200 {
            assert!(JitterPolicy::Full.apply(Duration::from_millis(40)) <= Duration::from_millis(40));
        }
    }

    #[test]
    fn equal_keeps_at_least_half() {
        for _ in 0..200 {
            let d = JitterPolicy::Equal.apply(Duration::from_millis(40));
            assert!(d >= Duration::from_millis(20));
            assert!(d <= Duration::from_millis(40));
        }
    }

    #[test]
    fn zero_delay_stays_zero() {
        assert_eq!(JitterPolicy::Full.apply(Duration::ZERO), Duration::ZERO);
        assert_eq!(JitterPolicy::Equal.apply(Duration::ZERO), Duration::ZERO);
    }
}
