//! Progress events emitted by a running task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a task body passes to `report_progress`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Completion fraction. Clamped into `[0, 1]` when recorded.
    pub progress: f64,
    /// Short machine-friendly label, e.g. `"step_2_complete"`.
    pub step: String,
    /// Human readable message.
    pub message: String,
    /// Optional structured payload.
    #[serde(default)]
    pub data: Value,
}

impl ProgressUpdate {
    pub fn new(progress: f64, step: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            progress,
            step: step.into(),
            message: message.into(),
            data: Value::Null,
        }
    }

    /// Attach a structured payload.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

/// A recorded progress event. Append-only; never reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Position in the invocation's log, starting at 0.
    pub seq: u64,
    /// Completion fraction in `[0, 1]`.
    pub progress: f64,
    pub step: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    /// When the runtime recorded the event.
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    /// Record an update at position `seq`, stamped with the current time.
    pub fn record(seq: u64, update: ProgressUpdate) -> Self {
        Self {
            seq,
            progress: clamp_progress(update.progress),
            step: update.step,
            message: update.message,
            data: update.data,
            timestamp: Utc::now(),
        }
    }
}

/// Clamp into `[0, 1]`; NaN becomes 0.
pub fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clamp_progress() {
        assert_eq!(clamp_progress(-0.5), 0.0);
        assert_eq!(clamp_progress(1.7), 1.0);
        assert_eq!(clamp_progress(0.4), 0.4);
        assert_eq!(clamp_progress(f64::NAN), 0.0);
        assert_eq!(clamp_progress(f64::INFINITY), 1.0);
    }

    #[test]
    fn test_record_clamps_and_keeps_payload() {
        let update = ProgressUpdate::new(2.0, "step_1", "Processing").with_data(json!({"n": 1}));
        let event = ProgressEvent::record(3, update);
        assert_eq!(event.seq, 3);
        assert_eq!(event.progress, 1.0);
        assert_eq!(event.step, "step_1");
        assert_eq!(event.data, json!({"n": 1}));
    }

    #[test]
    fn test_null_data_is_omitted() {
        let event = ProgressEvent::record(0, ProgressUpdate::new(0.0, "initialization", "Starting"));
        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("data").is_none());
        assert!(value.get("timestamp").is_some());
    }
}
