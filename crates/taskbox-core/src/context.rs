//! Read-only view of an invocation handed to context-aware tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{InvocationId, TaskName};

/// Metadata about the invocation a task body is running in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationContext {
    invocation_id: InvocationId,
    task: TaskName,
    started_at: DateTime<Utc>,
    input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deadline: Option<DateTime<Utc>>,
}

impl InvocationContext {
    pub fn new(
        invocation_id: InvocationId,
        task: TaskName,
        started_at: DateTime<Utc>,
        input: Value,
        deadline: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            invocation_id,
            task,
            started_at,
            input,
            deadline,
        }
    }

    pub fn invocation_id(&self) -> &InvocationId {
        &self.invocation_id
    }

    pub fn task(&self) -> &TaskName {
        &self.task
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// The validated input.
    pub fn input(&self) -> &Value {
        &self.input
    }

    /// Wall-clock deadline, if the invocation has one.
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }
}
