//! The runtime-owned record of one invocation.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::CoreError;
use crate::ids::{InvocationId, TaskName};
use crate::progress::{ProgressEvent, ProgressUpdate};
use crate::report::InvocationReport;
use crate::result::TerminalResult;
use crate::status::InvocationStatus;

/// State of a single invocation: status, event log and terminal result.
///
/// Every mutation goes through the status state machine. Once a terminal
/// result is recorded the event log is frozen.
#[derive(Debug, Clone)]
pub struct InvocationRecord {
    id: InvocationId,
    task: TaskName,
    status: InvocationStatus,
    input: Value,
    events: Vec<ProgressEvent>,
    result: Option<TerminalResult>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl InvocationRecord {
    /// Create a pending record.
    pub fn new(id: InvocationId, task: TaskName, input: Value) -> Self {
        Self {
            id,
            task,
            status: InvocationStatus::Pending,
            input,
            events: Vec::new(),
            result: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn id(&self) -> &InvocationId {
        &self.id
    }

    pub fn task(&self) -> &TaskName {
        &self.task
    }

    pub fn status(&self) -> InvocationStatus {
        self.status
    }

    pub fn input(&self) -> &Value {
        &self.input
    }

    pub fn events(&self) -> &[ProgressEvent] {
        &self.events
    }

    pub fn result(&self) -> Option<&TerminalResult> {
        self.result.as_ref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Input accepted; the task body is about to run.
    pub fn start(&mut self) -> Result<DateTime<Utc>, CoreError> {
        self.transition(InvocationStatus::Running)?;
        let now = Utc::now();
        self.started_at = Some(now);
        Ok(now)
    }

    /// Append a progress event and return a copy of it. Only allowed while
    /// running.
    pub fn push_progress(&mut self, update: ProgressUpdate) -> Result<ProgressEvent, CoreError> {
        if !self.status.accepts_progress() {
            return Err(CoreError::ProgressRejected(self.status));
        }
        let event = ProgressEvent::record(self.events.len() as u64, update);
        self.events.push(event.clone());
        Ok(event)
    }

    /// Task body returned a value; output validation begins.
    pub fn begin_output_validation(&mut self) -> Result<(), CoreError> {
        self.transition(InvocationStatus::ValidatingOutput)
    }

    /// Record the terminal result.
    ///
    /// A success is only accepted after output validation began; a failure
    /// is accepted from any non-terminal state.
    pub fn finish(&mut self, result: TerminalResult) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(CoreError::AlreadyFinished);
        }
        let next = if result.is_ok() {
            InvocationStatus::Succeeded
        } else {
            InvocationStatus::Failed
        };
        self.transition(next)?;
        self.result = Some(result);
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Snapshot of the record as a report.
    pub fn report(&self) -> InvocationReport {
        InvocationReport {
            invocation_id: self.id.clone(),
            task: self.task.clone(),
            status: self.status,
            input: self.input.clone(),
            events: self.events.clone(),
            result: self.result.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }

    fn transition(&mut self, next: InvocationStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidStateTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::TaskError;
    use serde_json::json;

    fn record() -> InvocationRecord {
        InvocationRecord::new(
            InvocationId::new("inv-1"),
            TaskName::new("addition"),
            json!({"num1": 2, "num2": 3}),
        )
    }

    #[test]
    fn test_happy_path() {
        let mut rec = record();
        assert_eq!(rec.status(), InvocationStatus::Pending);

        rec.start().unwrap();
        rec.push_progress(ProgressUpdate::new(0.5, "half", "Halfway")).unwrap();
        rec.push_progress(ProgressUpdate::new(1.0, "done", "Done")).unwrap();
        rec.begin_output_validation().unwrap();
        rec.finish(TerminalResult::Ok(json!({"sum": 5}))).unwrap();

        assert_eq!(rec.status(), InvocationStatus::Succeeded);
        let seqs: Vec<u64> = rec.events().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1]);

        let report = rec.report();
        assert!(report.started_at.is_some());
        assert!(report.finished_at.is_some());
    }

    #[test]
    fn test_progress_rejected_outside_running() {
        let mut rec = record();
        let err = rec
            .push_progress(ProgressUpdate::new(0.1, "early", "Too early"))
            .unwrap_err();
        assert_eq!(err, CoreError::ProgressRejected(InvocationStatus::Pending));

        rec.start().unwrap();
        rec.finish(TerminalResult::Error(TaskError::generic("boom"))).unwrap();

        let err = rec
            .push_progress(ProgressUpdate::new(0.9, "late", "Too late"))
            .unwrap_err();
        assert_eq!(err, CoreError::ProgressRejected(InvocationStatus::Failed));
        assert!(rec.events().is_empty());
    }

    #[test]
    fn test_success_requires_output_validation() {
        let mut rec = record();
        rec.start().unwrap();
        let err = rec.finish(TerminalResult::Ok(json!(null))).unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidStateTransition {
                from: InvocationStatus::Running,
                to: InvocationStatus::Succeeded,
            }
        );
    }

    #[test]
    fn test_input_rejection_fails_from_pending() {
        let mut rec = record();
        rec.finish(TerminalResult::Error(TaskError::data("x"))).unwrap();
        assert_eq!(rec.status(), InvocationStatus::Failed);
        assert!(rec.started_at().is_none());
    }

    #[test]
    fn test_terminal_result_recorded_once() {
        let mut rec = record();
        rec.start().unwrap();
        rec.finish(TerminalResult::Error(TaskError::timeout(10))).unwrap();
        let err = rec.finish(TerminalResult::Error(TaskError::cancelled())).unwrap_err();
        assert_eq!(err, CoreError::AlreadyFinished);
        assert_eq!(
            rec.result().and_then(TerminalResult::error).map(TaskError::kind),
            Some(crate::taxonomy::ErrorKind::Timeout)
        );
    }
}
