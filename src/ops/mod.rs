//! Composable fallible computations.
//!
//! - [`op`]: the [`Op`] type, its four shapes and the [`Input`] trait
//! - [`compose`]: `seq`, `par`, `repeat_*`, `ite`, `guard`, `once`
//! - [`predicate`]: loop and retry predicates

pub mod compose;
pub mod op;
pub mod predicate;

pub use compose::{Lock, fail, nothing, parallel, sequence};
pub use op::{BoxOutcome, Closure, Input, Op, Outcome, Routine, Statelet, Tasklet};
pub use predicate::{Pred, Predicate};
