//! # Loop-continuation predicates.
//!
//! A [`Predicate`] maps an [`Outcome`] to `bool`. They drive
//! [`Op::repeat_while`](crate::Op::repeat_while),
//! [`Op::repeat_until`](crate::Op::repeat_until), [`Op::ite`](crate::Op::ite),
//! executor retries and admission retries.
//!
//! ## Stateful predicates
//! [`Tries`] and [`Backoff`] own a counter. A [`Pred`] is an `Arc`, so every
//! clone shares that counter: reuse across unrelated loops is almost always a
//! bug, build a fresh instance per loop instead.
//!
//! ## Combining
//! [`all`] and [`any`] evaluate **every** operand (no short-circuit) so that
//! counters and backoff sleeps inside them advance on each call.
//!
//! ```rust
//! use std::time::Duration;
//! use drainvisor::predicate::{all, backoff, is_err, tries_lt};
//!
//! // retry failures, at most 11 more times, sleeping 1ms, 2ms, 4ms, ... up to 1s
//! let retry = all([is_err(), tries_lt(12), backoff(Duration::from_millis(1), Duration::from_secs(1))]);
//! # let _ = retry;
//! ```

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::op::Outcome;
use crate::error::OpError;
use crate::policies::BackoffPolicy;

/// Decides something about the outcome of one computation run.
#[async_trait]
pub trait Predicate: Send + Sync + 'static {
    /// Evaluates the predicate. May sleep (see [`Backoff`]).
    async fn check(&self, outcome: &Outcome) -> bool;
}

/// Shared predicate handle.
pub type Pred = Arc<dyn Predicate>;

/// Constant predicate.
pub struct Constant(pub bool);

#[async_trait]
impl Predicate for Constant {
    async fn check(&self, _outcome: &Outcome) -> bool {
        self.0
    }
}

/// Negation.
pub struct Not(pub Pred);

#[async_trait]
impl Predicate for Not {
    async fn check(&self, outcome: &Outcome) -> bool {
        !self.0.check(outcome).await
    }
}

/// Conjunction of all operands; `true` when empty.
pub struct All(pub Vec<Pred>);

#[async_trait]
impl Predicate for All {
    async fn check(&self, outcome: &Outcome) -> bool {
        let mut acc = true;
        for p in &self.0 {
            acc &= p.check(outcome).await;
        }
        acc
    }
}

/// Disjunction of all operands; `false` when empty.
pub struct Any(pub Vec<Pred>);

#[async_trait]
impl Predicate for Any {
    async fn check(&self, outcome: &Outcome) -> bool {
        let mut acc = false;
        for p in &self.0 {
            acc |= p.check(outcome).await;
        }
        acc
    }
}

/// Comparison applied by [`Tries`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

/// Counts its own invocations and compares the count against `n`.
///
/// The counter is incremented before the comparison, so the first call
/// compares `1` against `n`.
pub struct Tries {
    cmp: Cmp,
    n: u64,
    calls: AtomicU64,
}

impl Tries {
    pub fn new(cmp: Cmp, n: u64) -> Self {
        Self {
            cmp,
            n,
            calls: AtomicU64::new(0),
        }
    }

    /// Number of times the predicate has been evaluated.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Predicate for Tries {
    async fn check(&self, _outcome: &Outcome) -> bool {
        let tries = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        match self.cmp {
            Cmp::Eq => tries == self.n,
            Cmp::Lt => tries < self.n,
            Cmp::Lte => tries <= self.n,
            Cmp::Gt => tries > self.n,
            Cmp::Gte => tries >= self.n,
        }
    }
}

/// Always `true`; sleeps before answering on every call after the first.
///
/// Delays follow [`BackoffPolicy::next`]: the second call waits
/// `policy.next(0)`, the third `policy.next(1)`, and so on. Only meaningful as
/// one operand of a loop predicate.
pub struct Backoff {
    policy: BackoffPolicy,
    calls: Mutex<u32>,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            calls: Mutex::new(0),
        }
    }

    fn next_delay(&self) -> Option<Duration> {
        let mut calls = self
            .calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *calls = calls.saturating_add(1);
        match *calls {
            1 => None,
            n => Some(self.policy.next(n - 2)),
        }
    }
}

#[async_trait]
impl Predicate for Backoff {
    async fn check(&self, _outcome: &Outcome) -> bool {
        if let Some(delay) = self.next_delay() {
            tokio::time::sleep(delay).await;
        }
        true
    }
}

/// True once the token has been cancelled.
pub struct Done(pub CancellationToken);

#[async_trait]
impl Predicate for Done {
    async fn check(&self, _outcome: &Outcome) -> bool {
        self.0.is_cancelled()
    }
}

/// Wraps a plain function over the outcome.
pub struct FromFn<F>(pub F);

#[async_trait]
impl<F> Predicate for FromFn<F>
where
    F: Fn(&Outcome) -> bool + Send + Sync + 'static,
{
    async fn check(&self, outcome: &Outcome) -> bool {
        (self.0)(outcome)
    }
}

// ---- Constructors ----

/// Always true.
pub fn always() -> Pred {
    Arc::new(Constant(true))
}

/// Always false.
pub fn never() -> Pred {
    Arc::new(Constant(false))
}

pub fn not(p: Pred) -> Pred {
    Arc::new(Not(p))
}

/// And-fold over `ps`, evaluating every operand.
pub fn all(ps: impl IntoIterator<Item = Pred>) -> Pred {
    Arc::new(All(ps.into_iter().collect()))
}

/// Or-fold over `ps`, evaluating every operand.
pub fn any(ps: impl IntoIterator<Item = Pred>) -> Pred {
    Arc::new(Any(ps.into_iter().collect()))
}

pub fn tries_eq(n: u64) -> Pred {
    Arc::new(Tries::new(Cmp::Eq, n))
}

pub fn tries_lt(n: u64) -> Pred {
    Arc::new(Tries::new(Cmp::Lt, n))
}

pub fn tries_lte(n: u64) -> Pred {
    Arc::new(Tries::new(Cmp::Lte, n))
}

pub fn tries_gt(n: u64) -> Pred {
    Arc::new(Tries::new(Cmp::Gt, n))
}

pub fn tries_gte(n: u64) -> Pred {
    Arc::new(Tries::new(Cmp::Gte, n))
}

pub fn is_ok() -> Pred {
    from_fn(|o| o.is_ok())
}

pub fn is_err() -> Pred {
    from_fn(|o| o.is_err())
}

/// True for `Err(OpError::Canceled)`.
pub fn is_canceled() -> Pred {
    from_fn(|o| matches!(o, Err(OpError::Canceled)))
}

/// True when the outcome is an error accepted by `f`.
pub fn matches(f: impl Fn(&OpError) -> bool + Send + Sync + 'static) -> Pred {
    from_fn(move |o| o.as_ref().err().is_some_and(&f))
}

pub fn done(token: CancellationToken) -> Pred {
    Arc::new(Done(token))
}

pub fn not_done(token: CancellationToken) -> Pred {
    not(done(token))
}

pub fn from_fn(f: impl Fn(&Outcome) -> bool + Send + Sync + 'static) -> Pred {
    Arc::new(FromFn(f))
}

/// Doubling backoff from `start`, capped at `ceil`.
pub fn backoff(start: Duration, ceil: Duration) -> Pred {
    backoff_with(BackoffPolicy::doubling(start, ceil))
}

/// Backoff driven by an arbitrary [`BackoffPolicy`].
pub fn backoff_with(policy: BackoffPolicy) -> Pred {
    Arc::new(Backoff::new(policy))
}

#[cfg(test)]
mod tests {
    use super::*;

    const OK: Outcome = Ok(());

    fn err() -> Outcome {
        Err(OpError::fail("x"))
    }

    #[tokio::test]
    async fn constants() {
        assert!(always().check(&OK).await);
        assert!(always().check(&err()).await);
        assert!(!never().check(&OK).await);
        assert!(!never().check(&err()).await);
        assert!(!not(always()).check(&OK).await);
    }

    #[tokio::test]
    async fn or_truth_table() {
        assert!(any([always()]).check(&OK).await);
        assert!(any([always(), always()]).check(&OK).await);
        assert!(any([always(), never()]).check(&OK).await);
        assert!(any([never(), always()]).check(&OK).await);
        assert!(!any([never()]).check(&OK).await);
        assert!(!any([never(), never()]).check(&OK).await);
        assert!(!any(Vec::<Pred>::new()).check(&OK).await);
    }

    #[tokio::test]
    async fn and_truth_table() {
        assert!(all(Vec::<Pred>::new()).check(&OK).await);
        assert!(all([always(), always()]).check(&OK).await);
        assert!(!all([always(), never()]).check(&OK).await);
        assert!(!all([never(), always()]).check(&OK).await);
    }

    #[tokio::test]
    async fn and_or_evaluate_every_operand() {
        let left = Arc::new(Tries::new(Cmp::Gt, 100));
        let right = Arc::new(Tries::new(Cmp::Gt, 100));
        let p = all([left.clone() as Pred, right.clone() as Pred]);
        assert!(!p.check(&OK).await);
        assert_eq!(left.calls(), 1);
        assert_eq!(right.calls(), 1, "and must not short-circuit");

        let a = Arc::new(Tries::new(Cmp::Gte, 1));
        let b = Arc::new(Tries::new(Cmp::Gte, 1));
        let q = any([a.clone() as Pred, b.clone() as Pred]);
        assert!(q.check(&OK).await);
        assert_eq!(b.calls(), 1, "or must not short-circuit");
    }

    #[tokio::test]
    async fn tries_count_every_call() {
        let eq = tries_eq(3);
        assert!(!eq.check(&OK).await);
        assert!(!eq.check(&OK).await);
        assert!(eq.check(&OK).await);
        assert!(!eq.check(&OK).await);

        let lt = tries_lt(2);
        assert!(lt.check(&OK).await);
        assert!(!lt.check(&OK).await);

        let lte = tries_lte(2);
        assert!(lte.check(&OK).await);
        assert!(lte.check(&OK).await);
        assert!(!lte.check(&OK).await);

        let gt = tries_gt(1);
        assert!(!gt.check(&OK).await);
        assert!(gt.check(&OK).await);

        let gte = tries_gte(2);
        assert!(!gte.check(&OK).await);
        assert!(gte.check(&OK).await);
    }

    #[tokio::test]
    async fn outcome_predicates() {
        assert!(is_ok().check(&OK).await);
        assert!(!is_ok().check(&err()).await);
        assert!(is_err().check(&err()).await);
        assert!(is_canceled().check(&Err(OpError::Canceled)).await);
        assert!(!is_canceled().check(&err()).await);

        let fatal = matches(|e| matches!(e, OpError::Fatal { .. }));
        assert!(fatal.check(&Err(OpError::fatal("x"))).await);
        assert!(!fatal.check(&err()).await);
        assert!(!fatal.check(&OK).await);
    }

    #[tokio::test]
    async fn done_follows_token() {
        let token = CancellationToken::new();
        let d = done(token.clone());
        let nd = not_done(token.clone());
        assert!(!d.check(&OK).await);
        assert!(nd.check(&OK).await);
        token.cancel();
        assert!(d.check(&OK).await);
        assert!(!nd.check(&OK).await);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_sleeps_after_first_call_and_doubles() {
        let p = backoff(Duration::from_millis(10), Duration::from_millis(25));

        let start = tokio::time::Instant::now();
        assert!(p.check(&OK).await);
        assert_eq!(start.elapsed(), Duration::ZERO);

        let expected = [10u64, 20, 25, 25];
        for ms in expected {
            let before = tokio::time::Instant::now();
            assert!(p.check(&err()).await);
            assert_eq!(before.elapsed(), Duration::from_millis(ms));
        }
    }
}
