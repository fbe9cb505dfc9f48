//! Error recovery configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the error recovery engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Attempts per recovery session before giving up (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first attempt; doubled for each further one (default: 1s).
    #[serde(default = "default_base_delay")]
    pub base_delay: Duration,

    /// Upper bound on any single backoff delay (default: 30s).
    #[serde(default = "default_max_delay")]
    pub max_delay: Duration,

    /// How long network-wait blocks for connectivity (default: 30s).
    #[serde(default = "default_network_wait_timeout")]
    pub network_wait_timeout: Duration,

    /// Upper bound on a single source load (default: 10s).
    #[serde(default = "default_source_load_timeout")]
    pub source_load_timeout: Duration,

    /// Extra URLs tried after the track's own alternates.
    #[serde(default)]
    pub fallback_urls: Vec<String>,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_network_wait_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_source_load_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
            network_wait_timeout: default_network_wait_timeout(),
            source_load_timeout: default_source_load_timeout(),
            fallback_urls: Vec::new(),
        }
    }
}

impl RecoveryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_network_wait_timeout(mut self, timeout: Duration) -> Self {
        self.network_wait_timeout = timeout;
        self
    }

    pub fn with_source_load_timeout(mut self, timeout: Duration) -> Self {
        self.source_load_timeout = timeout;
        self
    }

    pub fn with_fallback_urls(mut self, urls: Vec<String>) -> Self {
        self.fallback_urls = urls;
        self
    }

    /// Backoff before attempt `attempt` (1-based): `base * 2^(attempt-1)`,
    /// capped at `max_delay`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be greater than 0".to_string());
        }

        if self.base_delay > self.max_delay {
            return Err(format!(
                "base_delay ({:?}) must not exceed max_delay ({:?})",
                self.base_delay, self.max_delay
            ));
        }

        if self.network_wait_timeout.is_zero() || self.source_load_timeout.is_zero() {
            return Err("recovery timeouts must be greater than 0".to_string());
        }

        Ok(())
    }
}
