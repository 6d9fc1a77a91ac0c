//! Task entry points and descriptors.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use taskbox_core::{Failure, InvocationContext, TaskName};

use crate::capability::Capabilities;

/// A task body that only needs its input and capabilities.
///
/// Implement this trait for tasks with state or configuration, or use
/// [`TaskEntry::unary_fn`] for a plain async closure.
#[async_trait]
pub trait TaskFn: Send + Sync {
    async fn call(&self, input: Value, caps: Capabilities) -> Result<Value, Failure>;
}

/// A task body that also receives the invocation context.
#[async_trait]
pub trait ContextTaskFn: Send + Sync {
    async fn call(
        &self,
        input: Value,
        context: InvocationContext,
        caps: Capabilities,
    ) -> Result<Value, Failure>;
}

pub(crate) type TaskFuture = Pin<Box<dyn Future<Output = Result<Value, Failure>> + Send + 'static>>;

/// How the runtime calls a task body.
#[derive(Clone)]
pub enum TaskEntry {
    /// `body(input, caps)`
    Unary(Arc<dyn TaskFn>),
    /// `body(input, context, caps)`
    WithContext(Arc<dyn ContextTaskFn>),
}

impl TaskEntry {
    pub fn unary<T: TaskFn + 'static>(task: T) -> Self {
        Self::Unary(Arc::new(task))
    }

    pub fn with_context<T: ContextTaskFn + 'static>(task: T) -> Self {
        Self::WithContext(Arc::new(task))
    }

    /// Unary entry from an async closure.
    pub fn unary_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(Value, Capabilities) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Failure>> + Send + 'static,
    {
        Self::Unary(Arc::new(UnaryClosure(f)))
    }

    /// Context-aware entry from an async closure.
    pub fn with_context_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(Value, InvocationContext, Capabilities) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Failure>> + Send + 'static,
    {
        Self::WithContext(Arc::new(ContextClosure(f)))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Unary(_) => "unary",
            Self::WithContext(_) => "with_context",
        }
    }

    /// Owned future running the body, ready to be spawned.
    pub(crate) fn invoke(
        &self,
        input: Value,
        context: InvocationContext,
        caps: Capabilities,
    ) -> TaskFuture {
        match self.clone() {
            Self::Unary(task) => Box::pin(async move { task.call(input, caps).await }),
            Self::WithContext(task) => {
                Box::pin(async move { task.call(input, context, caps).await })
            }
        }
    }
}

impl fmt::Debug for TaskEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskEntry::{}", self.kind_name())
    }
}

struct UnaryClosure<F>(F);

#[async_trait]
impl<F, Fut> TaskFn for UnaryClosure<F>
where
    F: Fn(Value, Capabilities) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, Failure>> + Send + 'static,
{
    async fn call(&self, input: Value, caps: Capabilities) -> Result<Value, Failure> {
        (self.0)(input, caps).await
    }
}

struct ContextClosure<F>(F);

#[async_trait]
impl<F, Fut> ContextTaskFn for ContextClosure<F>
where
    F: Fn(Value, InvocationContext, Capabilities) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, Failure>> + Send + 'static,
{
    async fn call(
        &self,
        input: Value,
        context: InvocationContext,
        caps: Capabilities,
    ) -> Result<Value, Failure> {
        (self.0)(input, context, caps).await
    }
}

/// A registered task. Immutable once registered.
#[derive(Debug, Clone)]
pub struct TaskDescriptor {
    name: TaskName,
    description: String,
    input_schema: Value,
    output_schema: Value,
    entry: TaskEntry,
    timeout: Option<Duration>,
}

impl TaskDescriptor {
    /// Create a descriptor that accepts any input and any output.
    pub fn new(name: impl Into<TaskName>, entry: TaskEntry) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            input_schema: Value::Bool(true),
            output_schema: Value::Bool(true),
            entry,
            timeout: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = schema;
        self
    }

    /// Deadline for this task, unless the caller passes one.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &TaskName {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    pub fn output_schema(&self) -> &Value {
        &self.output_schema
    }

    pub fn entry(&self) -> &TaskEntry {
        &self.entry
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}
