//! Error types for the reactive runtime.
//!
//! The runtime has no error path of its own for ordinary reads and writes:
//! panics raised by user getters, effect bodies and callbacks unwind to the
//! caller of the operation that ran them. The variants here cover the
//! situations the runtime detects itself. The two faults are raised with
//! [`std::panic::panic_any`], so a caller catching the unwind can downcast
//! the payload to `ReactiveError`.

use thiserror::Error;

use crate::reactive::{SubscriberId, TargetId};

/// Errors detected by the reactive runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A cleanup function panicked while being run before a re-run or on stop.
    ///
    /// This error is logged and counted, never propagated.
    #[error("cleanup function panicked: {message}")]
    CleanupPanicked {
        /// The panic payload, if it was a string.
        message: String,
    },

    /// A computation was started again while already running, more times
    /// than the configured limit allows.
    ///
    /// Usually a computation that writes to a value it reads, with the value
    /// changing on every run. Raised as the panic payload.
    #[error("computation {subscriber} re-entered itself {depth} times, exceeding the limit of {limit}")]
    ReentryExceeded {
        /// The computation that kept re-entering.
        subscriber: SubscriberId,
        /// Nested runs of that computation already on the stack.
        depth: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// A memo read itself while computing its first value.
    ///
    /// Raised as the panic payload.
    #[error("memo {target} read itself before it had a value")]
    MemoCycle {
        /// The memo's tracking target.
        target: TargetId,
    },
}

impl ReactiveError {
    /// Build a `CleanupPanicked` error from a panic payload.
    pub(crate) fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "<non-string panic payload>".to_string()
        };
        Self::CleanupPanicked { message }
    }
}
