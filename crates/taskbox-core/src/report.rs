//! Archived summary of a finished invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{InvocationId, TaskName};
use crate::progress::ProgressEvent;
use crate::result::TerminalResult;
use crate::status::InvocationStatus;
use crate::taxonomy::TaskError;

/// Everything the caller gets once an invocation is over: status, the full
/// progress log and the terminal result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationReport {
    pub invocation_id: InvocationId,
    pub task: TaskName,
    pub status: InvocationStatus,
    pub input: Value,
    /// Every event, in emission order, regardless of channel buffering.
    pub events: Vec<ProgressEvent>,
    /// `None` only for a report taken before the invocation finished.
    pub result: Option<TerminalResult>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl InvocationReport {
    pub fn is_success(&self) -> bool {
        self.status == InvocationStatus::Succeeded
    }

    pub fn output(&self) -> Option<&Value> {
        self.result.as_ref().and_then(TerminalResult::output)
    }

    pub fn error(&self) -> Option<&TaskError> {
        self.result.as_ref().and_then(TerminalResult::error)
    }

    /// Event step labels in order.
    pub fn steps(&self) -> Vec<&str> {
        self.events.iter().map(|e| e.step.as_str()).collect()
    }

    /// Wall time from creation to finish, in milliseconds.
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.created_at).num_milliseconds())
    }
}
