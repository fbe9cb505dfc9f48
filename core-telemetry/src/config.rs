//! Telemetry batcher configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the telemetry batcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Collector URL batches are POSTed to.
    #[serde(default)]
    pub endpoint: String,

    /// Pending events that trigger an immediate flush (default: 10).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Timer flush period (default: 30s).
    #[serde(default = "default_flush_interval")]
    pub flush_interval: Duration,

    /// Failed resends before a queued batch is dropped (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Minimum age of a queued batch before it is resent (default: 5s).
    #[serde(default = "default_retry_delay")]
    pub retry_delay: Duration,

    /// Retry queue processing period (default: 10s).
    #[serde(default = "default_retry_check_interval")]
    pub retry_check_interval: Duration,

    /// Pending events kept before the oldest are dropped (default: 1000).
    #[serde(default = "default_max_pending_events")]
    pub max_pending_events: usize,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_batch_size() -> usize {
    10
}

fn default_flush_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_retry_check_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_max_pending_events() -> usize {
    1000
}

fn default_user_agent() -> String {
    format!("adc-core/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            batch_size: default_batch_size(),
            flush_interval: default_flush_interval(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            retry_check_interval: default_retry_check_interval(),
            max_pending_events: default_max_pending_events(),
            user_agent: default_user_agent(),
        }
    }
}

impl TelemetryConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_retry_check_interval(mut self, interval: Duration) -> Self {
        self.retry_check_interval = interval;
        self
    }

    pub fn with_max_pending_events(mut self, max: usize) -> Self {
        self.max_pending_events = max;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(format!(
                "telemetry endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            ));
        }

        if self.batch_size == 0 {
            return Err("batch_size must be greater than 0".to_string());
        }

        if self.max_pending_events < self.batch_size {
            return Err(format!(
                "max_pending_events ({}) must be at least batch_size ({})",
                self.max_pending_events, self.batch_size
            ));
        }

        if self.flush_interval.is_zero() || self.retry_check_interval.is_zero() {
            return Err("flush and retry intervals must be greater than 0".to_string());
        }

        Ok(())
    }
}
