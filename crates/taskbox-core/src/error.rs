//! Core domain errors.

use thiserror::Error;

use crate::status::InvocationStatus;

/// Core domain errors for taskbox.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Invalid state transition.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition {
        from: InvocationStatus,
        to: InvocationStatus,
    },

    /// Progress reported while the invocation is not running.
    #[error("Invocation is {0}; progress is no longer accepted")]
    ProgressRejected(InvocationStatus),

    /// A terminal result was already recorded.
    #[error("Invocation already finished")]
    AlreadyFinished,
}
