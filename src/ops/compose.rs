//! # Combinators shared by every computation shape.
//!
//! ```text
//! seq(f, g1..gn)      f ─► g1 ─► ... ─► gn      (token checked before each step)
//! par(f, g1..gn)      f ∥ g1 ∥ ... ∥ gn        (derived scope, joins everyone)
//! repeat_until(f, p)  f ─► p? ─► f ─► p? ...   (stop when p == true)
//! repeat_while(f, p)  f ─► p? ─► f ─► p? ...   (stop when p == false)
//! ite(f, p, g, z)     f ─► p? ─┬─► g
//!                              └─► z
//! guard(f, lock)      lock ─► f ─► unlock
//! once(f)             f runs at most once, every caller sees its outcome
//! ```
//!
//! ## Rules
//! - `par` never returns while a participant is still running, even after an
//!   early failure. A panicking participant is re-raised once all are joined.
//! - `repeat_*` may loop forever if the predicate never reaches its stop value.
//! - `once` memoizes the first outcome, including failures.

use std::iter;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};
use tokio::task::JoinSet;

use super::op::{Input, Op, Outcome};
use super::predicate::Pred;
use crate::error::OpError;

/// Lock type accepted by [`Op::guard`].
pub type Lock = Arc<Mutex<()>>;

/// An op that succeeds immediately, or fails with [`OpError::Canceled`] if the
/// input's token already fired.
pub fn nothing<I: Input>() -> Op<I> {
    Op::new(|input: I| async move { input.check_cancelled() })
}

/// An op that always fails with `err`.
pub fn fail<I: Input>(err: OpError) -> Op<I> {
    Op::new(move |_input: I| {
        let err = err.clone();
        async move { Err(err) }
    })
}

/// Runs `ops` in order. An empty list behaves like [`nothing`].
pub fn sequence<I: Input>(ops: impl IntoIterator<Item = Op<I>>) -> Op<I> {
    build_seq(ops.into_iter().collect())
}

/// Runs `ops` concurrently. An empty list behaves like [`nothing`].
pub fn parallel<I: Input>(ops: impl IntoIterator<Item = Op<I>>) -> Op<I> {
    build_par(ops.into_iter().collect())
}

fn build_seq<I: Input>(steps: Vec<Op<I>>) -> Op<I> {
    let steps: Arc<[Op<I>]> = steps.into();
    Op::new(move |input: I| {
        let steps = Arc::clone(&steps);
        async move {
            if steps.is_empty() {
                return input.check_cancelled();
            }
            for step in steps.iter() {
                input.check_cancelled()?;
                step.call(input.clone()).await?;
            }
            Ok(())
        }
    })
}

fn build_par<I: Input>(branches: Vec<Op<I>>) -> Op<I> {
    let branches: Arc<[Op<I>]> = branches.into();
    Op::new(move |input: I| {
        let branches = Arc::clone(&branches);
        async move {
            let scope = input.token().map(|t| t.child_token());
            let mut set = JoinSet::new();
            for branch in branches.iter() {
                let arg = match &scope {
                    Some(token) => input.scoped(token.clone()),
                    None => input.clone(),
                };
                set.spawn(branch.call(arg));
            }

            let mut first: Option<OpError> = None;
            let mut panicked = None;
            while let Some(joined) = set.join_next().await {
                let res = match joined {
                    Ok(res) => res,
                    Err(e) if e.is_panic() => {
                        panicked.get_or_insert(e.into_panic());
                        if let Some(token) = &scope {
                            token.cancel();
                        }
                        continue;
                    }
                    Err(_aborted) => Err(OpError::Canceled),
                };
                if let Err(e) = res {
                    if first.is_none() {
                        if let Some(token) = &scope {
                            token.cancel();
                        }
                        first = Some(e);
                    }
                }
            }

            if let Some(payload) = panicked {
                std::panic::resume_unwind(payload);
            }
            first.map_or(Ok(()), Err)
        }
    })
}

impl<I: Input> Op<I> {
    /// Runs `self`, then each of `rest` in order; stops at the first failure.
    pub fn seq(self, rest: impl IntoIterator<Item = Op<I>>) -> Op<I> {
        build_seq(iter::once(self).chain(rest).collect())
    }

    /// Runs `self` and every op in `rest` concurrently.
    ///
    /// For cancellable shapes all participants share a child of the caller's
    /// token; the first failure cancels it. Returns the first failure observed.
    pub fn par(self, rest: impl IntoIterator<Item = Op<I>>) -> Op<I> {
        build_par(iter::once(self).chain(rest).collect())
    }

    /// Repeats `self` until `p(outcome)` is false, returning that outcome.
    pub fn repeat_while(self, p: Pred) -> Op<I> {
        self.repeat(p, false)
    }

    /// Repeats `self` until `p(outcome)` is true, returning that outcome.
    pub fn repeat_until(self, p: Pred) -> Op<I> {
        self.repeat(p, true)
    }

    fn repeat(self, p: Pred, exit: bool) -> Op<I> {
        Op::new(move |input: I| {
            let f = self.clone();
            let p = Arc::clone(&p);
            async move {
                loop {
                    let out = f.call(input.clone()).await;
                    if p.check(&out).await == exit {
                        return out;
                    }
                }
            }
        })
    }

    /// Runs `self`, then `then` if `p(outcome)` holds, otherwise `otherwise`.
    pub fn ite(self, p: Pred, then: Op<I>, otherwise: Op<I>) -> Op<I> {
        Op::new(move |input: I| {
            let f = self.clone();
            let p = Arc::clone(&p);
            let then = then.clone();
            let otherwise = otherwise.clone();
            async move {
                let out = f.call(input.clone()).await;
                if p.check(&out).await {
                    then.call(input).await
                } else {
                    otherwise.call(input).await
                }
            }
        })
    }

    /// Holds `lock` for the whole call; released on every exit path.
    pub fn guard(self, lock: Lock) -> Op<I> {
        Op::new(move |input: I| {
            let f = self.clone();
            let lock = Arc::clone(&lock);
            async move {
                let _held = lock.lock().await;
                f.call(input).await
            }
        })
    }

    /// Runs `self` at most once across all calls of the returned op.
    ///
    /// Concurrent callers wait for the single execution and all receive its
    /// outcome. The input of the first caller wins.
    pub fn once(self) -> Op<I> {
        let cell: Arc<OnceCell<Outcome>> = Arc::new(OnceCell::new());
        Op::new(move |input: I| {
            let f = self.clone();
            let cell = Arc::clone(&cell);
            async move { cell.get_or_init(|| f.call(input)).await.clone() }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::op::{Closure, Tasklet};
    use crate::ops::predicate::{self, tries_eq};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn counting(hits: &Arc<AtomicUsize>, fail: bool) -> Closure {
        let hits = Arc::clone(hits);
        Closure::new(move |()| {
            let hits = Arc::clone(&hits);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                if fail { Err(OpError::fail("boom")) } else { Ok(()) }
            }
        })
    }

    #[tokio::test]
    async fn seq_short_circuits_on_first_failure() {
        for k in 0..5 {
            let hits: Vec<Arc<AtomicUsize>> =
                (0..5).map(|_| Arc::new(AtomicUsize::new(0))).collect();
            let ops: Vec<Closure> = hits
                .iter()
                .enumerate()
                .map(|(i, h)| counting(h, i == k))
                .collect();

            let err = sequence(ops).run().await.unwrap_err();
            assert_eq!(err, OpError::fail("boom"));
            for (i, h) in hits.iter().enumerate() {
                let expected = usize::from(i <= k);
                assert_eq!(h.load(Ordering::SeqCst), expected, "k={k} i={i}");
            }
        }
    }

    #[tokio::test]
    async fn seq_checks_token_between_steps() {
        let ran = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();

        let t = token.clone();
        let cancel_it = Tasklet::new(move |_ctx| {
            let t = t.clone();
            async move {
                t.cancel();
                Ok(())
            }
        });
        let r = Arc::clone(&ran);
        let after = Tasklet::new(move |_ctx| {
            let r = Arc::clone(&r);
            async move {
                r.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let out = cancel_it.seq([after]).call(token).await;
        assert_eq!(out, Err(OpError::Canceled));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn seq_of_cancelled_token_runs_nothing() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let t = Tasklet::new(move |_ctx| {
            let h = Arc::clone(&h);
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(sequence([t]).call(token).await, Err(OpError::Canceled));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn par_waits_for_every_participant() {
        let slow_done = Arc::new(AtomicBool::new(false));
        let done = Arc::clone(&slow_done);
        let slow = Closure::new(move |()| {
            let done = Arc::clone(&done);
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                done.store(true, Ordering::SeqCst);
                Ok(())
            }
        });
        let fast_fail = fail::<()>(OpError::fail("early"));

        let out = fast_fail.par([slow]).run().await;
        assert_eq!(out, Err(OpError::fail("early")));
        assert!(slow_done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn par_failure_cancels_siblings() {
        let observed = Arc::new(AtomicBool::new(false));
        let o = Arc::clone(&observed);
        let sibling = Tasklet::new(move |ctx: CancellationToken| {
            let o = Arc::clone(&o);
            async move {
                ctx.cancelled().await;
                o.store(true, Ordering::SeqCst);
                Err(OpError::Canceled)
            }
        });
        let failing = Tasklet::new(|_ctx| async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Err(OpError::fail("first"))
        });

        let caller = CancellationToken::new();
        let out = sibling.par([failing]).call(caller.clone()).await;
        assert_eq!(out, Err(OpError::fail("first")));
        assert!(observed.load(Ordering::SeqCst));
        assert!(!caller.is_cancelled(), "derived scope must not leak upward");
    }

    #[tokio::test]
    async fn par_of_successes_is_ok() {
        let hits = Arc::new(AtomicUsize::new(0));
        let ops: Vec<Closure> = (0..16).map(|_| counting(&hits, false)).collect();
        parallel(ops).run().await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 16);
    }

    #[tokio::test]
    #[should_panic(expected = "participant exploded")]
    async fn par_reraises_panics() {
        let boom = Closure::new(|()| async {
            if true {
                panic!("participant exploded");
            }
            Ok(())
        });
        let _ = boom.par([nothing()]).run().await;
    }

    #[tokio::test]
    async fn repeat_until_tries_eq_runs_exactly_m_times() {
        for m in 1..6u64 {
            let hits = Arc::new(AtomicUsize::new(0));
            let op = counting(&hits, m % 2 == 0).repeat_until(tries_eq(m));
            let out = op.run().await;
            assert_eq!(hits.load(Ordering::SeqCst) as u64, m);
            assert_eq!(out.is_err(), m % 2 == 0);
        }
    }

    #[tokio::test]
    async fn repeat_while_stops_when_predicate_turns_false() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let op = Closure::new(move |()| {
            let h = Arc::clone(&h);
            async move {
                if h.fetch_add(1, Ordering::SeqCst) < 3 {
                    Ok(())
                } else {
                    Err(OpError::fail("fourth"))
                }
            }
        })
        .repeat_while(predicate::is_ok());

        assert_eq!(op.run().await, Err(OpError::fail("fourth")));
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn ite_branches_on_outcome() {
        let then_hits = Arc::new(AtomicUsize::new(0));
        let else_hits = Arc::new(AtomicUsize::new(0));

        let op = fail::<()>(OpError::fail("x")).ite(
            predicate::is_err(),
            counting(&then_hits, false),
            counting(&else_hits, false),
        );
        op.run().await.unwrap();
        assert_eq!(then_hits.load(Ordering::SeqCst), 1);
        assert_eq!(else_hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn guard_serializes_calls() {
        let lock: Lock = Arc::new(Mutex::new(()));
        let inside = Arc::new(AtomicUsize::new(0));
        let overlap = Arc::new(AtomicBool::new(false));

        let (i, o) = (Arc::clone(&inside), Arc::clone(&overlap));
        let critical = Closure::new(move |()| {
            let (i, o) = (Arc::clone(&i), Arc::clone(&o));
            async move {
                if i.fetch_add(1, Ordering::SeqCst) > 0 {
                    o.store(true, Ordering::SeqCst);
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
                i.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .guard(lock);

        let all: Vec<Closure> = (0..8).map(|_| critical.clone()).collect();
        parallel(all).run().await.unwrap();
        assert!(!overlap.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn once_runs_single_time_for_concurrent_callers() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let op = Closure::new(move |()| {
            let h = Arc::clone(&h);
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Err(OpError::fail("memoized"))
            }
        })
        .once();

        let callers: Vec<Closure> = (0..10).map(|_| op.clone()).collect();
        let out = parallel(callers).run().await;
        assert_eq!(out, Err(OpError::fail("memoized")));
        assert_eq!(op.run().await, Err(OpError::fail("memoized")));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn nothing_reports_cancellation() {
        assert!(nothing::<CancellationToken>().run().await.is_ok());
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(
            nothing::<CancellationToken>().call(token).await,
            Err(OpError::Canceled)
        );
    }
}
