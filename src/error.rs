//! Error type shared by every computation in drainvisor.
//!
//! [`OpError`] is the failure half of an [`Outcome`](crate::Outcome). It is
//! produced by user computations, by the algebra itself (cancellation checks)
//! and by the admission retry helpers.
//!
//! Helper methods (`as_label`, `as_message`) exist for logs and metrics, and
//! [`OpError::is_retryable`] gives a sensible default for retry predicates.

use std::fmt::Display;
use std::time::Duration;

use thiserror::Error;

/// # Errors produced by computations.
///
/// The algebra only ever creates [`OpError::Canceled`] on its own; everything
/// else comes from user code. [`OpError::Rejected`] is a synthetic outcome fed
/// to retry predicates when an admission is denied, it never escapes a
/// successful call.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OpError {
    /// Ordinary failure; may succeed if retried.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Non-recoverable failure (should not be retried).
    #[error("fatal error (no retry): {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// The computation exceeded a time budget.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The budget that was exceeded.
        timeout: Duration,
    },

    /// The cancellation token of the computation fired.
    #[error("operation cancelled")]
    Canceled,

    /// An admission was denied because the coordinator is not accepting.
    #[error("admission rejected")]
    Rejected,
}

impl OpError {
    /// Shorthand for [`OpError::Fail`].
    pub fn fail(error: impl Display) -> Self {
        OpError::Fail {
            error: error.to_string(),
        }
    }

    /// Shorthand for [`OpError::Fatal`].
    pub fn fatal(error: impl Display) -> Self {
        OpError::Fatal {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use drainvisor::OpError;
    ///
    /// assert_eq!(OpError::Canceled.as_label(), "op_canceled");
    /// assert_eq!(OpError::fail("boom").as_label(), "op_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            OpError::Fail { .. } => "op_failed",
            OpError::Fatal { .. } => "op_fatal",
            OpError::Timeout { .. } => "op_timeout",
            OpError::Canceled => "op_canceled",
            OpError::Rejected => "op_rejected",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            OpError::Fail { error } => format!("error: {error}"),
            OpError::Fatal { error } => format!("fatal: {error}"),
            OpError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            OpError::Canceled => "operation cancelled".to_string(),
            OpError::Rejected => "admission rejected".to_string(),
        }
    }

    /// Indicates whether the error type is safe to retry.
    ///
    /// Returns `true` for [`OpError::Fail`], [`OpError::Timeout`] and
    /// [`OpError::Rejected`], `false` otherwise.
    ///
    /// # Example
    /// ```
    /// use drainvisor::OpError;
    ///
    /// assert!(OpError::fail("boom").is_retryable());
    /// assert!(!OpError::fatal("nope").is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OpError::Fail { .. } | OpError::Timeout { .. } | OpError::Rejected
        )
    }

    /// True for [`OpError::Canceled`].
    pub fn is_canceled(&self) -> bool {
        matches!(self, OpError::Canceled)
    }

    /// Whether an unbounded drain may be attempted again after this failure.
    ///
    /// Only outcomes that say "not yet" qualify; anything else means an unload
    /// action broke its contract.
    pub(crate) fn is_transient(&self) -> bool {
        matches!(self, OpError::Canceled | OpError::Timeout { .. })
    }
}
