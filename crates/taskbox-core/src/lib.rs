//! Taskbox Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Async runtimes
//! - Network/HTTP
//! - Task implementations
//!
//! All types here represent the task execution contract: schemas, the
//! invocation state machine, progress events and the error taxonomy.

pub mod context;
pub mod error;
pub mod ids;
pub mod invocation;
pub mod progress;
pub mod report;
pub mod result;
pub mod schema;
pub mod status;
pub mod taxonomy;

// Re-export commonly used types
pub use context::InvocationContext;
pub use error::CoreError;
pub use ids::{InvocationId, TaskName};
pub use invocation::InvocationRecord;
pub use progress::{clamp_progress, ProgressEvent, ProgressUpdate};
pub use report::InvocationReport;
pub use result::TerminalResult;
pub use schema::{SchemaError, Violation};
pub use status::InvocationStatus;
pub use taxonomy::{ErrorKind, Failure, FailureOrigin, SchemaDirection, TaskError};
