//! Error types for the taskbox runtime.

use taskbox_core::{Failure, SchemaError, TaskError, TaskName};
use thiserror::Error;

/// Errors returned to the caller before an invocation exists.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// No task is registered under this name.
    #[error("Unknown task '{0}'")]
    UnknownTask(TaskName),

    /// HTTP transport could not be built.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Task registration failed.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Errors from capability calls made by a task body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    /// The invocation is over (finished, timed out or cancelled).
    #[error("Capabilities revoked: invocation is no longer running")]
    Revoked,
}

impl From<CapabilityError> for Failure {
    fn from(error: CapabilityError) -> Self {
        TaskError::generic(error.to_string()).into()
    }
}

/// Errors from task registration.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A task with this name is already registered.
    #[error("Task '{0}' is already registered")]
    AlreadyRegistered(TaskName),

    /// One of the task's schemas is malformed.
    #[error("Task '{task}' has an invalid {which} schema: {source}")]
    InvalidSchema {
        task: TaskName,
        which: &'static str,
        #[source]
        source: SchemaError,
    },
}

/// Errors raised by an [`HttpTransport`](crate::fetch::HttpTransport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// Underlying HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Method name is not a valid HTTP method.
    #[error("Invalid HTTP method '{0}'")]
    InvalidMethod(String),

    /// URL could not be parsed.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Transport has no response for this request.
    #[error("No route for {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskbox_core::ErrorKind;

    #[test]
    fn test_revoked_capability_is_generic_failure() {
        let failure: Failure = CapabilityError::Revoked.into();
        assert_eq!(
            failure.as_tagged().map(TaskError::kind),
            Some(ErrorKind::Generic)
        );
    }

    #[test]
    fn test_error_messages() {
        let err = RuntimeError::UnknownTask(TaskName::new("nope"));
        assert_eq!(err.to_string(), "Unknown task 'nope'");

        let err = TransportError::InvalidMethod("FETCH ME".to_string());
        assert_eq!(err.to_string(), "Invalid HTTP method 'FETCH ME'");
    }
}
