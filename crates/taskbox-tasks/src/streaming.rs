//! `streaming-example`: a multi-step job that reports progress as it goes.
//!
//! Emits, in order: `initialization`, then for each step `step_N` and
//! `step_N_complete`, then `finalizing` and `completed`. With
//! `simulate_error` set it emits an `error` event during step
//! `steps / 2 + 1` and fails with an untyped error.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use rand::Rng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use taskbox_core::{Failure, InvocationContext, ProgressUpdate};
use taskbox_runtime::{Capabilities, ContextTaskFn, TaskDescriptor, TaskEntry};
use tracing::{debug, warn};

use crate::{generate_schema, parse_input, to_output};

fn default_steps() -> u32 {
    5
}

fn default_delay() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StreamingInput {
    /// Number of processing steps.
    #[serde(default = "default_steps")]
    pub steps: u32,
    /// Simulated work per step, in milliseconds.
    #[serde(default = "default_delay")]
    pub delay: u64,
    /// Fail partway through.
    #[serde(default)]
    pub simulate_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StepResult {
    pub step: u32,
    /// RFC 3339 time the step finished.
    pub timestamp: String,
    pub data: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Summary {
    pub total_steps: u32,
    pub successful_steps: u32,
    /// `None` when no step ran.
    pub average_value: Option<f64>,
    pub first_result: Option<StepResult>,
    pub last_result: Option<StepResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Metadata {
    pub task_completed_at: String,
    pub execution_context: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StreamingOutput {
    pub success: bool,
    pub steps_completed: u32,
    /// Milliseconds of simulated work, `steps * delay`.
    pub total_processing_time: u64,
    pub results: Vec<StepResult>,
    pub summary: Summary,
    pub metadata: Metadata,
}

pub struct StreamingExample;

impl StreamingExample {
    pub const NAME: &'static str = "streaming-example";

    pub fn descriptor() -> TaskDescriptor {
        TaskDescriptor::new(Self::NAME, TaskEntry::with_context(StreamingExample))
            .with_description("Simulates a multi-step job with progress reporting")
            .with_input_schema(generate_schema::<StreamingInput>())
            .with_output_schema(generate_schema::<StreamingOutput>())
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[async_trait]
impl ContextTaskFn for StreamingExample {
    async fn call(
        &self,
        input: Value,
        context: InvocationContext,
        caps: Capabilities,
    ) -> Result<Value, Failure> {
        let input: StreamingInput = parse_input(input)?;
        let steps = input.steps;

        caps.report_progress(
            ProgressUpdate::new(0.0, "initialization", "Starting streaming example task")
                .with_data(json!({"input_steps": steps, "input_delay": input.delay})),
        )?;

        let mut results: Vec<StepResult> = Vec::with_capacity(steps as usize);
        for i in 0..steps {
            let n = i + 1;
            let step_progress = f64::from(n) / f64::from(steps);

            caps.report_progress(
                ProgressUpdate::new(
                    step_progress * 0.8,
                    format!("step_{n}"),
                    format!("Processing step {n} of {steps}"),
                )
                .with_data(json!({
                    "current_step": n,
                    "total_steps": steps,
                    "items_processed": i,
                })),
            )?;

            if input.delay > 0 {
                caps.sleep(Duration::from_millis(input.delay)).await?;
            }

            if input.simulate_error && i == steps / 2 {
                warn!(step = n, "Simulating failure");
                caps.report_progress(
                    ProgressUpdate::new(
                        step_progress * 0.5,
                        "error",
                        format!("Simulated error at step {n}"),
                    )
                    .with_data(json!({"error_type": "simulation", "error_step": n})),
                )?;
                return Err(Failure::msg(format!("Simulated error at step {n}")));
            }

            let value: f64 = rand::thread_rng().gen_range(0.0..100.0);
            let result = StepResult {
                step: n,
                timestamp: now_rfc3339(),
                data: format!("Result from step {n}"),
                value,
            };
            caps.report_progress(
                ProgressUpdate::new(
                    step_progress,
                    format!("step_{n}_complete"),
                    format!("Completed step {n}"),
                )
                .with_data(to_output(&result)?),
            )?;
            debug!(step = n, value, "Step complete");
            results.push(result);
        }

        caps.report_progress(
            ProgressUpdate::new(0.95, "finalizing", "Finalizing results and cleanup")
                .with_data(json!({"total_results": results.len(), "processing_complete": true})),
        )?;

        let average_value = (!results.is_empty())
            .then(|| results.iter().map(|r| r.value).sum::<f64>() / results.len() as f64);
        let summary = Summary {
            total_steps: steps,
            successful_steps: results.len() as u32,
            average_value,
            first_result: results.first().cloned(),
            last_result: results.last().cloned(),
        };
        let output = to_output(&StreamingOutput {
            success: true,
            steps_completed: steps,
            total_processing_time: u64::from(steps) * input.delay,
            results,
            summary,
            metadata: Metadata {
                task_completed_at: now_rfc3339(),
                execution_context: to_output(&context)?,
            },
        })?;

        caps.report_progress(
            ProgressUpdate::new(1.0, "completed", "Task completed successfully").with_data(json!({
                "output_size": output.to_string().len(),
                "final_result": output["summary"].clone(),
            })),
        )?;

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::runtime;
    use std::sync::Arc;
    use taskbox_core::{ErrorKind, InvocationStatus, TaskError};
    use taskbox_runtime::{InvocationUpdate, StaticTransport};

    #[tokio::test]
    async fn test_three_steps_emit_nine_ordered_events() {
        let rt = runtime(Arc::new(StaticTransport::new()));
        let report = rt
            .run(StreamingExample::NAME, json!({"steps": 3, "delay": 0}))
            .await
            .unwrap();

        assert_eq!(report.status, InvocationStatus::Succeeded);
        assert_eq!(
            report.steps(),
            vec![
                "initialization",
                "step_1",
                "step_1_complete",
                "step_2",
                "step_2_complete",
                "step_3",
                "step_3_complete",
                "finalizing",
                "completed",
            ]
        );

        let progress: Vec<f64> = report.events.iter().map(|e| e.progress).collect();
        assert_eq!(progress[0], 0.0);
        assert!((progress[1] - 0.8 / 3.0).abs() < 1e-9);
        assert!((progress[2] - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(progress[7], 0.95);
        assert_eq!(progress[8], 1.0);

        let output = report.output().unwrap();
        assert_eq!(output["steps_completed"], 3);
        assert_eq!(output["total_processing_time"], 0);
        assert_eq!(output["results"].as_array().map(Vec::len), Some(3));
        assert_eq!(
            output["metadata"]["execution_context"]["invocation_id"],
            report.invocation_id.as_str()
        );
    }

    #[tokio::test]
    async fn test_simulated_error_fails_after_error_event() {
        let rt = runtime(Arc::new(StaticTransport::new()));
        let report = rt
            .run(
                StreamingExample::NAME,
                json!({"steps": 4, "delay": 0, "simulate_error": true}),
            )
            .await
            .unwrap();

        assert_eq!(report.status, InvocationStatus::Failed);
        assert_eq!(
            report.steps(),
            vec![
                "initialization",
                "step_1",
                "step_1_complete",
                "step_2",
                "step_2_complete",
                "step_3",
                "error",
            ]
        );
        assert_eq!(report.error().map(TaskError::kind), Some(ErrorKind::Generic));
        assert_eq!(
            report.error().map(TaskError::message),
            Some("Simulated error at step 3")
        );
    }

    #[tokio::test]
    async fn test_defaults_apply() {
        let input: StreamingInput = parse_input(json!({})).unwrap();
        assert_eq!(input.steps, 5);
        assert_eq!(input.delay, 1000);
        assert!(!input.simulate_error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_stream_with_delay() {
        let rt = runtime(Arc::new(StaticTransport::new()));
        let mut handle = rt
            .submit(StreamingExample::NAME, json!({"steps": 2, "delay": 1000}))
            .unwrap();

        let mut labels = Vec::new();
        let mut last = None;
        while let Some(update) = handle.next().await {
            match update {
                InvocationUpdate::Progress(event) => labels.push(event.step),
                other => last = Some(other),
            }
        }

        assert_eq!(labels.len(), 7);
        assert!(matches!(last, Some(InvocationUpdate::Finished(ref r)) if r.is_ok()));
        let report = handle.wait().await;
        assert_eq!(report.output().map(|o| o["total_processing_time"].clone()), Some(json!(2000)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_stops_stream() {
        let rt = runtime(Arc::new(StaticTransport::new()));
        let handle = rt
            .submit_with_timeout(
                StreamingExample::NAME,
                json!({"steps": 5, "delay": 1000}),
                Some(Duration::from_millis(1500)),
            )
            .unwrap();

        let report = handle.wait().await;
        assert_eq!(report.error().map(TaskError::kind), Some(ErrorKind::Timeout));
        assert_eq!(
            report.steps(),
            vec!["initialization", "step_1", "step_1_complete", "step_2"]
        );
    }
}
