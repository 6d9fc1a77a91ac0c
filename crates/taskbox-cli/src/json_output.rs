//! JSON lines output for `run --json`.

use serde::Serialize;
use serde_json::{json, Value};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use taskbox_runtime::{InvocationId, ProgressEvent, TaskName, TerminalResult};

/// Global flag to enable JSON output mode.
static JSON_MODE_ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable JSON output mode.
pub fn enable_json_mode() {
    JSON_MODE_ENABLED.store(true, Ordering::SeqCst);
}

/// Check if JSON mode is enabled.
pub fn is_json_mode() -> bool {
    JSON_MODE_ENABLED.load(Ordering::SeqCst)
}

/// JSON event types that can be emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonEventType {
    InvocationStarted,
    Progress,
    Lagged,
    Succeeded,
    Failed,
}

/// A JSON event to be output to stdout.
#[derive(Debug, Clone, Serialize)]
pub struct JsonEvent {
    pub event: JsonEventType,
    pub timestamp: String,
    pub data: Value,
}

impl JsonEvent {
    /// Create a new JSON event with the current timestamp.
    pub fn new(event: JsonEventType, data: Value) -> Self {
        Self {
            event,
            timestamp: chrono::Utc::now().to_rfc3339(),
            data,
        }
    }

    /// Output this event as a JSON line to stdout.
    pub fn emit(&self) {
        if !is_json_mode() {
            return;
        }
        if let Ok(json) = serde_json::to_string(self) {
            let mut stdout = io::stdout().lock();
            let _ = writeln!(stdout, "{}", json);
            let _ = stdout.flush();
        }
    }
}

pub fn emit_invocation_started(id: &InvocationId, task: &TaskName) {
    JsonEvent::new(
        JsonEventType::InvocationStarted,
        json!({
            "invocation_id": id,
            "task": task,
        }),
    )
    .emit();
}

pub fn emit_progress(event: &ProgressEvent) {
    JsonEvent::new(
        JsonEventType::Progress,
        serde_json::to_value(event).unwrap_or(Value::Null),
    )
    .emit();
}

pub fn emit_lagged(skipped: u64) {
    JsonEvent::new(JsonEventType::Lagged, json!({ "skipped": skipped })).emit();
}

/// Emit `succeeded` or `failed` with the terminal result as data.
pub fn emit_finished(result: &TerminalResult) {
    finished_event(result).emit();
}

fn finished_event(result: &TerminalResult) -> JsonEvent {
    let event = if result.is_ok() {
        JsonEventType::Succeeded
    } else {
        JsonEventType::Failed
    };
    JsonEvent::new(event, serde_json::to_value(result).unwrap_or(Value::Null))
}
