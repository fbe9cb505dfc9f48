//! Per-session engine tuning.
//!
//! Bridges and feature switches come from [`core_runtime::config::CoreConfig`];
//! this document only carries the numbers each engine is tuned with. Every
//! section and every field is optional:
//!
//! ```json
//! {
//!   "cache": { "max_cache_size_bytes": 20971520 },
//!   "recovery": { "max_attempts": 5 },
//!   "telemetry": { "batch_size": 25 }
//! }
//! ```

use crate::error::{CoreError, Result};
use core_playback::{BufferConfig, CacheConfig, RecoveryConfig};
use core_telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub buffer: BufferConfig,

    #[serde(default)]
    pub recovery: RecoveryConfig,

    /// Batching knobs. An empty `endpoint` is filled from the core config.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl SessionConfig {
    /// Parse a JSON document; missing sections fall back to defaults.
    pub fn from_json_str(document: &str) -> Result<Self> {
        let config: SessionConfig = serde_json::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_buffer(mut self, buffer: BufferConfig) -> Self {
        self.buffer = buffer;
        self
    }

    pub fn with_recovery(mut self, recovery: RecoveryConfig) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryConfig) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Validate the engine sections.
    ///
    /// The telemetry section is checked by the session once its endpoint is
    /// known.
    pub fn validate(&self) -> Result<()> {
        self.cache
            .validate()
            .map_err(|e| CoreError::Config(format!("cache: {}", e)))?;
        self.buffer
            .validate()
            .map_err(|e| CoreError::Config(format!("buffer: {}", e)))?;
        self.recovery
            .validate()
            .map_err(|e| CoreError::Config(format!("recovery: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn empty_document_yields_defaults() {
        let config = SessionConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.cache.max_cache_size_bytes, 50 * 1024 * 1024);
        assert_eq!(config.recovery.max_attempts, 3);
        assert_eq!(config.telemetry.batch_size, 10);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = SessionConfig::from_json_str(
            r#"{
                "cache": { "max_cache_size_bytes": 1024 },
                "recovery": { "max_attempts": 5, "base_delay": { "secs": 2, "nanos": 0 } },
                "telemetry": { "endpoint": "https://t.example.com", "batch_size": 4 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.cache.max_cache_size_bytes, 1024);
        assert_eq!(config.cache.download_timeout, Duration::from_secs(60));
        assert_eq!(config.recovery.max_attempts, 5);
        assert_eq!(config.recovery.base_delay, Duration::from_secs(2));
        assert_eq!(config.recovery.max_delay, Duration::from_secs(30));
        assert_eq!(config.telemetry.batch_size, 4);
        assert_eq!(config.telemetry.flush_interval, Duration::from_secs(30));
        assert_eq!(config.buffer, BufferConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let result = SessionConfig::from_json_str(r#"{ "cache": { "max_cache_size_bytes": 0 } }"#);
        assert!(matches!(result, Err(CoreError::Config(ref msg)) if msg.starts_with("cache")));

        let result = SessionConfig::from_json_str("{ not json");
        assert!(matches!(result, Err(CoreError::Parse(_))));
    }
}
