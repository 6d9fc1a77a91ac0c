//! Command line settings mapped onto the runtime configuration.

use std::time::Duration;

use taskbox_runtime::{ProgressBuffer, RuntimeConfig};
use tracing_subscriber::EnvFilter;

/// Filter used when neither `--log-level` nor `RUST_LOG` is set.
pub const DEFAULT_LOG_FILTER: &str = "taskbox=info";

/// Settings for a single `run`.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Invocation deadline in milliseconds.
    pub timeout_ms: Option<u64>,

    /// Bound of the progress channel; unbounded when unset.
    pub progress_capacity: Option<usize>,
}

impl RunConfig {
    pub fn runtime_config(&self) -> RuntimeConfig {
        let mut config = RuntimeConfig::default();
        if let Some(ms) = self.timeout_ms {
            config = config.with_default_timeout(Duration::from_millis(ms));
        }
        if let Some(capacity) = self.progress_capacity {
            config = config.with_progress_buffer(ProgressBuffer::drop_oldest(capacity));
        }
        config
    }
}

/// Build the log filter: `--log-level` wins over `RUST_LOG`.
pub fn log_filter(log_level: Option<&str>) -> EnvFilter {
    let filter = match log_level {
        Some(level) => EnvFilter::try_new(level).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    };
    filter.unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}
