//! The closed error taxonomy that crosses the task boundary.
//!
//! Task bodies fail with a [`Failure`]. A failure is either already tagged
//! with a [`TaskError`] (built through the error constructors or raised by
//! `fetch`) or untyped, in which case the runtime classifies it before it
//! reaches the caller. The caller only ever sees a [`TaskError`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Discriminant of [`TaskError`], ordered most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "SchemaError")]
    Schema,
    #[serde(rename = "TimeoutError")]
    Timeout,
    #[serde(rename = "CancelledError")]
    Cancelled,
    #[serde(rename = "NetworkError")]
    Network,
    #[serde(rename = "DataError")]
    Data,
    #[serde(rename = "GenericError")]
    Generic,
}

impl ErrorKind {
    /// All kinds, most specific first.
    pub const ALL: [ErrorKind; 6] = [
        Self::Schema,
        Self::Timeout,
        Self::Cancelled,
        Self::Network,
        Self::Data,
        Self::Generic,
    ];

    /// Lower is more specific.
    pub fn specificity(&self) -> u8 {
        match self {
            Self::Schema => 0,
            Self::Timeout => 1,
            Self::Cancelled => 2,
            Self::Network => 3,
            Self::Data => 4,
            Self::Generic => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Schema => "SchemaError",
            Self::Timeout => "TimeoutError",
            Self::Cancelled => "CancelledError",
            Self::Network => "NetworkError",
            Self::Data => "DataError",
            Self::Generic => "GenericError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the task a schema error was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaDirection {
    Input,
    Output,
}

/// A classified task error, as delivered to the caller.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TaskError {
    /// Input or output did not match the declared schema.
    #[serde(rename = "SchemaError")]
    #[error("{message}")]
    Schema {
        message: String,
        /// JSON path of the offending field.
        path: String,
        direction: SchemaDirection,
    },

    /// Network failure or non-2xx upstream response.
    #[serde(rename = "NetworkError")]
    #[error("{message}")]
    Network {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cause: Option<String>,
    },

    /// Upstream data had an unexpected shape or content.
    #[serde(rename = "DataError")]
    #[error("{message}")]
    Data {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cause: Option<String>,
    },

    /// The invocation deadline elapsed.
    #[serde(rename = "TimeoutError")]
    #[error("{message}")]
    Timeout { message: String, after_ms: u64 },

    /// The caller cancelled the invocation.
    #[serde(rename = "CancelledError")]
    #[error("{message}")]
    Cancelled { message: String },

    /// Anything else.
    #[serde(rename = "GenericError")]
    #[error("{message}")]
    Generic {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cause: Option<String>,
    },
}

impl TaskError {
    pub fn data(message: impl Into<String>) -> Self {
        Self::Data {
            message: message.into(),
            cause: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            status: None,
            body: None,
            cause: None,
        }
    }

    /// Network error for a non-2xx response.
    pub fn network_status(message: impl Into<String>, status: u16, body: Value) -> Self {
        Self::Network {
            message: message.into(),
            status: Some(status),
            body: Some(body),
            cause: None,
        }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
            cause: None,
        }
    }

    pub fn timeout(after_ms: u64) -> Self {
        Self::Timeout {
            message: format!("Invocation exceeded its deadline of {after_ms}ms"),
            after_ms,
        }
    }

    pub fn cancelled() -> Self {
        Self::Cancelled {
            message: "Invocation was cancelled by the caller".to_string(),
        }
    }

    pub fn schema(
        message: impl Into<String>,
        path: impl Into<String>,
        direction: SchemaDirection,
    ) -> Self {
        Self::Schema {
            message: message.into(),
            path: path.into(),
            direction,
        }
    }

    /// Attach a cause description. No-op for kinds that carry none.
    pub fn with_cause(mut self, description: impl Into<String>) -> Self {
        match &mut self {
            Self::Network { cause, .. } | Self::Data { cause, .. } | Self::Generic { cause, .. } => {
                *cause = Some(description.into());
            }
            Self::Schema { .. } | Self::Timeout { .. } | Self::Cancelled { .. } => {}
        }
        self
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Schema { .. } => ErrorKind::Schema,
            Self::Network { .. } => ErrorKind::Network,
            Self::Data { .. } => ErrorKind::Data,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Generic { .. } => ErrorKind::Generic,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Schema { message, .. }
            | Self::Network { message, .. }
            | Self::Data { message, .. }
            | Self::Timeout { message, .. }
            | Self::Cancelled { message }
            | Self::Generic { message, .. } => message,
        }
    }
}

/// Where an untyped failure was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOrigin {
    /// The task body itself.
    Task,
    /// Inside the `fetch` capability.
    Fetch,
}

/// What a task body returns on failure.
pub enum Failure {
    /// Already classified.
    Tagged(TaskError),
    /// Not yet classified; the runtime decides the kind.
    Untyped {
        message: String,
        origin: FailureOrigin,
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
}

impl Failure {
    /// Untyped failure raised by the task body.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Untyped {
            message: message.into(),
            origin: FailureOrigin::Task,
            source: None,
        }
    }

    /// Untyped failure wrapping an arbitrary error.
    pub fn from_error<E>(origin: FailureOrigin, error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Untyped {
            message: error.to_string(),
            origin,
            source: Some(Box::new(error)),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Tagged(error) => error.message(),
            Self::Untyped { message, .. } => message,
        }
    }

    /// The tagged error, if any.
    pub fn as_tagged(&self) -> Option<&TaskError> {
        match self {
            Self::Tagged(error) => Some(error),
            Self::Untyped { .. } => None,
        }
    }
}

impl From<TaskError> for Failure {
    fn from(error: TaskError) -> Self {
        Self::Tagged(error)
    }
}

impl From<serde_json::Error> for Failure {
    fn from(error: serde_json::Error) -> Self {
        Self::from_error(FailureOrigin::Task, error)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tagged(error) => write!(f, "{}: {}", error.kind(), error),
            Self::Untyped { message, .. } => f.write_str(message),
        }
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tagged(error) => f.debug_tuple("Tagged").field(error).finish(),
            Self::Untyped {
                message,
                origin,
                source,
            } => f
                .debug_struct("Untyped")
                .field("message", message)
                .field("origin", origin)
                .field("source", &source.as_ref().map(|s| s.to_string()))
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kinds_ordered_by_specificity() {
        let ranks: Vec<u8> = ErrorKind::ALL.iter().map(|k| k.specificity()).collect();
        let mut sorted = ranks.clone();
        sorted.sort();
        assert_eq!(ranks, sorted);
        assert_eq!(ErrorKind::ALL[0], ErrorKind::Schema);
        assert_eq!(ErrorKind::ALL[5], ErrorKind::Generic);
    }

    #[test]
    fn test_task_error_serializes_with_kind_tag() {
        let err = TaskError::network_status("HTTP 401", 401, json!({"cod": 401}));
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(
            value,
            json!({"kind": "NetworkError", "message": "HTTP 401", "status": 401, "body": {"cod": 401}})
        );

        let back: TaskError = serde_json::from_value(value).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn test_with_cause() {
        let err = TaskError::generic("boom").with_cause("io error");
        assert!(matches!(err, TaskError::Generic { cause: Some(ref c), .. } if c == "io error"));

        let err = TaskError::cancelled().with_cause("ignored");
        assert_eq!(err, TaskError::cancelled());
    }

    #[test]
    fn test_failure_display() {
        let tagged = Failure::from(TaskError::data("bad shape"));
        assert_eq!(tagged.to_string(), "DataError: bad shape");
        assert_eq!(tagged.as_tagged().map(TaskError::kind), Some(ErrorKind::Data));

        let untyped = Failure::msg("plain");
        assert_eq!(untyped.to_string(), "plain");
        assert!(untyped.as_tagged().is_none());
    }

    #[test]
    fn test_serde_error_becomes_untyped_task_failure() {
        let err = serde_json::from_str::<u32>("\"x\"").unwrap_err();
        match Failure::from(err) {
            Failure::Untyped { origin, source, .. } => {
                assert_eq!(origin, FailureOrigin::Task);
                assert!(source.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
