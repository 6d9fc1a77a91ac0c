//! Runtime configuration.

use std::time::Duration;

use crate::channel::ProgressBuffer;

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Deadline applied to invocations whose task declares none.
    pub default_timeout: Option<Duration>,

    /// Buffering policy of each invocation's progress channel.
    pub progress_buffer: ProgressBuffer,

    /// Per-request timeout of the HTTP transport.
    pub http_timeout: Duration,

    /// User-Agent sent by the HTTP transport.
    pub user_agent: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_timeout: None,
            progress_buffer: ProgressBuffer::Unbounded,
            http_timeout: Duration::from_secs(30),
            user_agent: format!("taskbox/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl RuntimeConfig {
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn with_progress_buffer(mut self, buffer: ProgressBuffer) -> Self {
        self.progress_buffer = buffer;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
