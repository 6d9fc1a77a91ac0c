//! The capability set handed to a task body.
//!
//! A [`Capabilities`] value is bound to exactly one invocation. It is the only
//! way a task body reaches the outside world, and it goes inert as soon as
//! the invocation is over: progress is rejected, `sleep` and `fetch` return
//! [`CapabilityError::Revoked`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use taskbox_core::{
    Failure, InvocationContext, ProgressUpdate, SchemaDirection, TaskError,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::CapabilityError;
use crate::fetch::{self, FetchOptions, FetchResponse, HttpTransport};
use crate::invocation::InvocationShared;

/// Capabilities bound to one invocation. Cloning shares the binding.
#[derive(Clone)]
pub struct Capabilities {
    inner: Arc<Inner>,
}

struct Inner {
    shared: Arc<InvocationShared>,
    context: InvocationContext,
    transport: Arc<dyn HttpTransport>,
    revoke: CancellationToken,
}

impl Capabilities {
    pub(crate) fn new(
        shared: Arc<InvocationShared>,
        context: InvocationContext,
        transport: Arc<dyn HttpTransport>,
        revoke: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                shared,
                context,
                transport,
                revoke,
            }),
        }
    }

    /// Perform an HTTP request.
    ///
    /// JSON responses are parsed, other bodies come back as a string and an
    /// empty body as `null`. A non-2xx status fails with a tagged network
    /// error carrying the status and body.
    pub async fn fetch(
        &self,
        url: &str,
        options: FetchOptions,
        body: Option<String>,
    ) -> Result<FetchResponse, Failure> {
        if self.is_revoked() {
            return Err(CapabilityError::Revoked.into());
        }
        tokio::select! {
            result = fetch::fetch(self.inner.transport.as_ref(), url, options, body) => result,
            _ = self.inner.revoke.cancelled() => Err(CapabilityError::Revoked.into()),
        }
    }

    /// Append a progress event. Never blocks.
    pub fn report_progress(&self, update: ProgressUpdate) -> Result<(), CapabilityError> {
        if self.inner.revoke.is_cancelled() {
            return Err(CapabilityError::Revoked);
        }
        self.inner.shared.emit(update).map_err(|e| {
            debug!(error = %e, "Progress rejected");
            CapabilityError::Revoked
        })
    }

    /// Read-only metadata about the invocation.
    pub fn context(&self) -> &InvocationContext {
        &self.inner.context
    }

    /// Constructors for tagged failures.
    pub fn errors(&self) -> ErrorFactory {
        ErrorFactory {
            started_at: self.inner.context.started_at(),
        }
    }

    /// Suspend this invocation for `duration`. Ends early with `Revoked` if
    /// the invocation times out or is cancelled meanwhile.
    pub async fn sleep(&self, duration: Duration) -> Result<(), CapabilityError> {
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.inner.revoke.cancelled() => Err(CapabilityError::Revoked),
        }
    }

    /// True once the invocation no longer accepts capability calls.
    pub fn is_revoked(&self) -> bool {
        self.inner.revoke.is_cancelled() || !self.inner.shared.status().accepts_progress()
    }
}

/// Builds tagged failures so the classifier never has to look at messages.
#[derive(Debug, Clone, Copy)]
pub struct ErrorFactory {
    started_at: DateTime<Utc>,
}

impl ErrorFactory {
    pub fn data(&self, message: impl Into<String>) -> Failure {
        TaskError::data(message).into()
    }

    pub fn network(&self, message: impl Into<String>) -> Failure {
        TaskError::network(message).into()
    }

    pub fn generic(&self, message: impl Into<String>) -> Failure {
        TaskError::generic(message).into()
    }

    /// Schema error raised by the task about its own input.
    pub fn schema(&self, message: impl Into<String>, path: impl Into<String>) -> Failure {
        TaskError::schema(message, path, SchemaDirection::Input).into()
    }

    /// Timeout declared by the task; `after_ms` is the time since start.
    pub fn timeout(&self, message: impl Into<String>) -> Failure {
        let elapsed = (Utc::now() - self.started_at).num_milliseconds().max(0);
        TaskError::Timeout {
            message: message.into(),
            after_ms: elapsed as u64,
        }
        .into()
    }
}
