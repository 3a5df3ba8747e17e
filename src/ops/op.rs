//! # One computation type, four shapes.
//!
//! [`Op<I>`] wraps a function `Fn(I) -> Future<Output = Outcome>` that builds a
//! fresh future per call. The input type picks the shape:
//!
//! | alias        | input                               | capability                 |
//! |--------------|-------------------------------------|----------------------------|
//! | [`Closure`]  | `()`                                | plain                      |
//! | [`Tasklet`]  | `CancellationToken`                 | cancellable                |
//! | [`Statelet`] | [`LoaderRef`]                       | state-aware                |
//! | [`Routine`]  | `(CancellationToken, LoaderRef)`    | state-aware + cancellable  |
//!
//! Combinators (see [`compose`](super::compose)) are written once against the
//! [`Input`] trait, which tells them whether the shape carries a token and how
//! to hand a derived token down to children.
//!
//! ## Example
//! ```rust
//! use drainvisor::{OpError, Tasklet};
//! use tokio_util::sync::CancellationToken;
//!
//! let hello = Tasklet::new(|ctx: CancellationToken| async move {
//!     if ctx.is_cancelled() {
//!         return Err(OpError::Canceled);
//!     }
//!     Ok(())
//! });
//! let twice = hello.clone().seq([hello]);
//! # let _ = twice;
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::core::{Config, Orchestrator};
use crate::drain::LoaderRef;
use crate::error::OpError;

/// Result of running any computation.
pub type Outcome = Result<(), OpError>;

/// Boxed future returned by [`Op::call`].
pub type BoxOutcome = BoxFuture<'static, Outcome>;

/// Plain computation: no inputs.
pub type Closure = Op<()>;
/// Cancellable computation.
pub type Tasklet = Op<CancellationToken>;
/// State-aware computation.
pub type Statelet = Op<LoaderRef>;
/// State-aware, cancellable computation. The orchestrator runs these.
pub type Routine = Op<(CancellationToken, LoaderRef)>;

/// Input of a computation shape.
///
/// Implemented for the four shape inputs only; combinators rely on
/// `token()` to decide whether to check and derive cancellation scopes.
pub trait Input: Clone + Send + Sync + 'static {
    /// Cancellation token carried by this input, if the shape is cancellable.
    fn token(&self) -> Option<&CancellationToken>;

    /// Same input with its token replaced by `token`.
    ///
    /// Token-less shapes return a clone of themselves.
    fn scoped(&self, token: CancellationToken) -> Self;

    /// `Err(Canceled)` if the carried token already fired.
    fn check_cancelled(&self) -> Result<(), OpError> {
        match self.token() {
            Some(t) if t.is_cancelled() => Err(OpError::Canceled),
            _ => Ok(()),
        }
    }
}

impl Input for () {
    fn token(&self) -> Option<&CancellationToken> {
        None
    }

    fn scoped(&self, _token: CancellationToken) -> Self {}
}

impl Input for CancellationToken {
    fn token(&self) -> Option<&CancellationToken> {
        Some(self)
    }

    fn scoped(&self, token: CancellationToken) -> Self {
        token
    }
}

impl Input for LoaderRef {
    fn token(&self) -> Option<&CancellationToken> {
        None
    }

    fn scoped(&self, _token: CancellationToken) -> Self {
        Arc::clone(self)
    }
}

impl Input for (CancellationToken, LoaderRef) {
    fn token(&self) -> Option<&CancellationToken> {
        Some(&self.0)
    }

    fn scoped(&self, token: CancellationToken) -> Self {
        (token, Arc::clone(&self.1))
    }
}

type OpFn<I> = dyn Fn(I) -> BoxOutcome + Send + Sync;

/// A fallible computation over input `I`.
///
/// Cloning is cheap (one `Arc`). Ops are immutable: combinators build new ops
/// and never touch their operands.
pub struct Op<I> {
    f: Arc<OpFn<I>>,
}

impl<I> Clone for Op<I> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<I> std::fmt::Debug for Op<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Op")
            .field("input", &std::any::type_name::<I>())
            .finish()
    }
}

impl<I: Input> Op<I> {
    /// Wraps a function that creates a new future per call.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        Self {
            f: Arc::new(move |input| Box::pin(f(input))),
        }
    }

    /// Starts one invocation.
    pub fn call(&self, input: I) -> BoxOutcome {
        (self.f)(input)
    }

    /// Fixes every input, narrowing to a [`Closure`].
    pub fn apply(&self, input: I) -> Closure {
        let op = self.clone();
        Closure::new(move |()| op.call(input.clone()))
    }
}

impl Closure {
    /// Runs the closure.
    pub async fn run(&self) -> Outcome {
        self.call(()).await
    }
}

impl Tasklet {
    /// Runs the tasklet with a fresh, never-cancelled token.
    pub async fn run(&self) -> Outcome {
        self.call(CancellationToken::new()).await
    }
}

impl Routine {
    /// Fixes the loader, narrowing to a [`Tasklet`].
    pub fn with_loader(&self, loader: LoaderRef) -> Tasklet {
        let op = self.clone();
        Tasklet::new(move |ctx| op.call((ctx, Arc::clone(&loader))))
    }

    /// Fixes the token, narrowing to a [`Statelet`].
    pub fn with_token(&self, ctx: CancellationToken) -> Statelet {
        let op = self.clone();
        Statelet::new(move |loader| op.call((ctx.clone(), loader)))
    }

    /// Runs the routine under a default [`Orchestrator`] listening to OS signals.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn run(&self, ctx: CancellationToken) -> Outcome {
        Orchestrator::builder(Config::default())
            .build()
            .run(ctx, self.clone())
            .await
    }
}
