//! Invocation status and its transition rules.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of one invocation.
///
/// ```text
/// pending -> running -> validating_output -> succeeded
///    |          |               |
///    +----------+---------------+--> failed
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStatus {
    /// Created, input not yet validated.
    #[default]
    Pending,
    /// Task body is executing.
    Running,
    /// Task body returned; output is being checked against the output schema.
    ValidatingOutput,
    /// Terminal: output accepted.
    Succeeded,
    /// Terminal: input rejected, task raised, output rejected, or deadline hit.
    Failed,
}

impl InvocationStatus {
    /// Returns true if the invocation is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns true if the task body may still emit progress.
    pub fn accepts_progress(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_transition_to(&self, next: InvocationStatus) -> bool {
        use InvocationStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Failed)
                | (Running, ValidatingOutput)
                | (Running, Failed)
                | (ValidatingOutput, Succeeded)
                | (ValidatingOutput, Failed)
        )
    }

    /// Lowercase name used in logs and serialized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::ValidatingOutput => "validating_output",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for InvocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_have_no_outgoing_edges() {
        use InvocationStatus::*;
        for terminal in [Succeeded, Failed] {
            for next in [Pending, Running, ValidatingOutput, Succeeded, Failed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_no_reentry_into_running() {
        use InvocationStatus::*;
        assert!(!ValidatingOutput.can_transition_to(Running));
        assert!(!Running.can_transition_to(Running));
        assert!(!Pending.can_transition_to(Succeeded));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let s = serde_json::to_string(&InvocationStatus::ValidatingOutput).unwrap();
        assert_eq!(s, "\"validating_output\"");
    }
}
