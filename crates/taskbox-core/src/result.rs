//! Terminal result of an invocation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::taxonomy::TaskError;

/// Exactly one per invocation.
///
/// Serializes as `{"ok": <output>}` or `{"error": {"kind": ..., "message": ...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalResult {
    Ok(Value),
    Error(TaskError),
}

impl TerminalResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn output(&self) -> Option<&Value> {
        match self {
            Self::Ok(value) => Some(value),
            Self::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&TaskError> {
        match self {
            Self::Ok(_) => None,
            Self::Error(error) => Some(error),
        }
    }
}

impl From<Result<Value, TaskError>> for TerminalResult {
    fn from(result: Result<Value, TaskError>) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(error) => Self::Error(error),
        }
    }
}
