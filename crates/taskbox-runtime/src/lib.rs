//! Taskbox runtime
//!
//! Runs task bodies behind the task execution contract:
//! - input and output are checked against the task's schemas
//! - the body only sees an injected [`Capabilities`] set
//! - progress events stream back over a per-invocation channel
//! - failures are classified into the closed [`TaskError`] taxonomy
//! - every invocation ends with exactly one [`TerminalResult`]
//!
//! # Example
//!
//! ```rust,no_run
//! use serde_json::json;
//! use taskbox_runtime::{
//!     Capabilities, Failure, InvocationUpdate, ProgressUpdate, Runtime, RuntimeConfig,
//!     TaskDescriptor, TaskEntry, TaskRegistry,
//! };
//!
//! async fn run() -> Result<(), Box<dyn std::error::Error>> {
//!     let entry = TaskEntry::unary_fn(|input, caps: Capabilities| async move {
//!         caps.report_progress(ProgressUpdate::new(0.5, "halfway", "Half done"))?;
//!         Ok::<_, Failure>(input)
//!     });
//!
//!     let mut registry = TaskRegistry::new();
//!     registry.register(TaskDescriptor::new("echo", entry))?;
//!     let runtime = Runtime::new(registry, RuntimeConfig::default())?;
//!
//!     let mut handle = runtime.submit("echo", json!({"hello": "world"}))?;
//!     while let Some(update) = handle.next().await {
//!         if let InvocationUpdate::Progress(event) = update {
//!             println!("{:.0}% {}", event.progress * 100.0, event.message);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod capability;
mod channel;
mod classify;
mod config;
mod error;
mod executor;
mod fetch;
mod invocation;
mod registry;
mod task;

// Re-export main types
pub use capability::{Capabilities, ErrorFactory};
pub use channel::{InvocationUpdate, ProgressBuffer, ProgressSubscriber, MAX_PROGRESS_CAPACITY};
pub use classify::{classify, classify_panic};
pub use config::RuntimeConfig;
pub use error::{CapabilityError, RegistryError, RuntimeError, TransportError};
pub use executor::{InvocationHandle, Runtime};
pub use fetch::{
    form_body, FetchOptions, FetchResponse, HttpRequest, HttpResponse, HttpTransport,
    ReqwestTransport, StaticTransport,
};
pub use registry::TaskRegistry;
pub use task::{ContextTaskFn, TaskDescriptor, TaskEntry, TaskFn};

pub use taskbox_core::{
    ErrorKind, Failure, FailureOrigin, InvocationContext, InvocationId, InvocationReport,
    InvocationStatus, ProgressEvent, ProgressUpdate, SchemaDirection, TaskError, TaskName,
    TerminalResult,
};
