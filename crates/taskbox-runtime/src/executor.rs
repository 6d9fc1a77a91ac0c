//! Runtime entry point: submits invocations and drives them to a terminal
//! result.
//!
//! Each invocation gets its own driver task. The driver validates the input,
//! spawns the task body with a fresh capability set, races the body against
//! the deadline and caller cancellation, classifies failures, validates the
//! output and records exactly one terminal result.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use taskbox_core::schema;
use taskbox_core::{
    Failure, InvocationContext, InvocationId, InvocationRecord, InvocationReport,
    InvocationStatus, SchemaDirection, TaskError, TaskName, TerminalResult,
};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::capability::Capabilities;
use crate::channel::{channel, InvocationUpdate, ProgressSubscriber};
use crate::classify::{classify, classify_panic};
use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::fetch::{HttpTransport, ReqwestTransport};
use crate::invocation::InvocationShared;
use crate::registry::TaskRegistry;
use crate::task::TaskDescriptor;

/// Runs registered tasks.
///
/// # Example
///
/// ```rust,no_run
/// use serde_json::json;
/// use taskbox_runtime::{Failure, Runtime, RuntimeConfig, TaskDescriptor, TaskEntry, TaskRegistry};
///
/// async fn run() -> Result<(), Box<dyn std::error::Error>> {
///     let mut registry = TaskRegistry::new();
///     registry.register(TaskDescriptor::new(
///         "echo",
///         TaskEntry::unary_fn(|input, _caps| async move { Ok::<_, Failure>(input) }),
///     ))?;
///
///     let runtime = Runtime::new(registry, RuntimeConfig::default())?;
///     let report = runtime.run("echo", json!({"hello": "world"})).await?;
///     println!("{}", serde_json::to_string_pretty(&report)?);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Runtime {
    registry: Arc<TaskRegistry>,
    transport: Arc<dyn HttpTransport>,
    config: RuntimeConfig,
}

impl Runtime {
    /// Create a runtime that reaches the network through `reqwest`.
    pub fn new(registry: TaskRegistry, config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(registry, config, Arc::new(transport)))
    }

    /// Create a runtime with a custom HTTP transport.
    pub fn with_transport(
        registry: TaskRegistry,
        config: RuntimeConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            transport,
            config,
        }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Start an invocation. Must be called within a tokio runtime.
    pub fn submit(&self, task: &str, input: Value) -> Result<InvocationHandle, RuntimeError> {
        self.submit_with_timeout(task, input, None)
    }

    /// Start an invocation with an explicit deadline.
    ///
    /// The deadline is taken from, in order: `timeout`, the task descriptor,
    /// the runtime config. With none of them set the invocation runs until
    /// it returns or is cancelled.
    pub fn submit_with_timeout(
        &self,
        task: &str,
        input: Value,
        timeout: Option<Duration>,
    ) -> Result<InvocationHandle, RuntimeError> {
        let descriptor = self
            .registry
            .get(task)
            .ok_or_else(|| RuntimeError::UnknownTask(TaskName::new(task)))?;

        let timeout = timeout
            .or(descriptor.timeout())
            .or(self.config.default_timeout);

        let id = InvocationId::generate();
        let task_name = descriptor.name().clone();
        let (sender, updates) = channel(self.config.progress_buffer);
        let record = InvocationRecord::new(id.clone(), task_name.clone(), input.clone());
        let shared = Arc::new(InvocationShared::new(record, sender));
        let cancel = CancellationToken::new();

        let driver = Driver {
            descriptor,
            shared: shared.clone(),
            transport: self.transport.clone(),
            input,
            timeout,
            cancel: cancel.clone(),
        };
        let span = info_span!("invocation", id = %id, task = %task_name);
        let driver = tokio::spawn(driver.run().instrument(span));

        Ok(InvocationHandle {
            id,
            task: task_name,
            shared,
            updates,
            cancel,
            driver,
        })
    }

    /// Submit and wait for the report.
    pub async fn run(&self, task: &str, input: Value) -> Result<InvocationReport, RuntimeError> {
        Ok(self.submit(task, input)?.wait().await)
    }
}

/// Caller's view of a running invocation.
pub struct InvocationHandle {
    id: InvocationId,
    task: TaskName,
    shared: Arc<InvocationShared>,
    updates: ProgressSubscriber,
    cancel: CancellationToken,
    driver: JoinHandle<()>,
}

impl InvocationHandle {
    pub fn id(&self) -> &InvocationId {
        &self.id
    }

    pub fn task(&self) -> &TaskName {
        &self.task
    }

    /// Next progress update; the terminal result comes last, then `None`.
    pub async fn next(&mut self) -> Option<InvocationUpdate> {
        self.updates.recv().await
    }

    /// Ask the runtime to stop the invocation. No effect once it finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn status(&self) -> InvocationStatus {
        self.shared.status()
    }

    /// Snapshot of the invocation so far.
    pub fn report(&self) -> InvocationReport {
        self.shared.report()
    }

    /// Wait for the terminal result and return the full report.
    pub async fn wait(self) -> InvocationReport {
        if let Err(e) = self.driver.await {
            error!(invocation_id = %self.id, error = %e, "Invocation driver failed");
        }
        self.shared.report()
    }
}

struct Driver {
    descriptor: Arc<TaskDescriptor>,
    shared: Arc<InvocationShared>,
    transport: Arc<dyn HttpTransport>,
    input: Value,
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

enum Outcome {
    Returned(Result<Result<Value, Failure>, JoinError>),
    TimedOut(Duration),
    Cancelled,
}

impl Driver {
    async fn run(self) {
        let Driver {
            descriptor,
            shared,
            transport,
            input,
            timeout,
            cancel,
        } = self;
        let _guard = FinishGuard {
            shared: shared.clone(),
        };

        if let Err(err) = schema::validate(descriptor.input_schema(), &input) {
            warn!(path = %err.path, error = %err, "Input rejected");
            let error = TaskError::schema(
                format!("Input does not match schema: {err}"),
                err.path,
                SchemaDirection::Input,
            );
            record_result(&shared, TerminalResult::Error(error));
            return;
        }

        let started_at = match shared.start() {
            Ok(at) => at,
            Err(e) => {
                error!(error = %e, "Failed to start invocation");
                return;
            }
        };
        // A timeout too large to represent is no deadline at all.
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let wall_deadline = timeout
            .and_then(|t| chrono::Duration::from_std(t).ok())
            .and_then(|t| started_at.checked_add_signed(t));

        let report = shared.report();
        let context = InvocationContext::new(
            report.invocation_id,
            report.task,
            started_at,
            input.clone(),
            wall_deadline,
        );
        let revoke = CancellationToken::new();
        let caps = Capabilities::new(shared.clone(), context.clone(), transport, revoke.clone());

        info!(timeout_ms = timeout.map(|t| t.as_millis() as u64), "Invocation started");

        let mut body = tokio::spawn(
            descriptor
                .entry()
                .invoke(input, context, caps)
                .in_current_span(),
        );

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Outcome::Cancelled,
            _ = deadline_elapsed(deadline) => Outcome::TimedOut(timeout.unwrap_or_default()),
            joined = &mut body => Outcome::Returned(joined),
        };

        // Retained capabilities go dead before the terminal result is
        // recorded, so nothing the body does while winding down lands after it.
        revoke.cancel();
        body.abort();

        let result = match outcome {
            Outcome::Returned(Ok(Ok(output))) => check_output(&shared, &descriptor, output),
            Outcome::Returned(Ok(Err(failure))) => {
                debug!(failure = %failure, "Task body raised");
                TerminalResult::Error(classify(failure))
            }
            Outcome::Returned(Err(join_error)) => {
                error!(error = %join_error, "Task body panicked");
                TerminalResult::Error(classify_panic(join_error))
            }
            Outcome::TimedOut(after) => TerminalResult::Error(TaskError::timeout(
                u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
            )),
            Outcome::Cancelled => TerminalResult::Error(TaskError::cancelled()),
        };

        record_result(&shared, result);
    }
}

/// Records a generic error if the driver exits without a terminal result.
struct FinishGuard {
    shared: Arc<InvocationShared>,
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        if !self.shared.status().is_terminal() {
            record_result(
                &self.shared,
                TerminalResult::Error(TaskError::generic("Invocation ended without a result")),
            );
        }
    }
}

async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn check_output(
    shared: &InvocationShared,
    descriptor: &TaskDescriptor,
    output: Value,
) -> TerminalResult {
    if let Err(e) = shared.begin_output_validation() {
        error!(error = %e, "Cannot validate output");
        return TerminalResult::Error(TaskError::generic(e.to_string()));
    }

    match schema::validate(descriptor.output_schema(), &output) {
        Ok(()) => TerminalResult::Ok(output),
        Err(err) => {
            warn!(path = %err.path, error = %err, "Output rejected");
            TerminalResult::Error(TaskError::schema(
                format!("Output does not match schema: {err}"),
                err.path,
                SchemaDirection::Output,
            ))
        }
    }
}

fn record_result(shared: &InvocationShared, result: TerminalResult) {
    match &result {
        TerminalResult::Ok(_) => info!("Invocation succeeded"),
        TerminalResult::Error(e) => warn!(kind = %e.kind(), error = %e, "Invocation failed"),
    }
    if let Err(e) = shared.finish(result) {
        error!(error = %e, "Failed to record terminal result");
    }
}
