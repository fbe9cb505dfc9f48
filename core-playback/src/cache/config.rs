//! Cache configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the asset cache engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Ceiling on the total size of cached payloads (default: 50 MiB).
    ///
    /// Eviction runs after every insert, so the ceiling holds once each
    /// preload settles.
    #[serde(default = "default_max_cache_size_bytes")]
    pub max_cache_size_bytes: u64,

    /// Upper bound for a single download, headers to last chunk (default: 60s).
    #[serde(default = "default_download_timeout")]
    pub download_timeout: Duration,

    /// Preload the next track when the active strategy allows it (default: true).
    #[serde(default = "default_speculative_preload")]
    pub speculative_preload: bool,
}

fn default_max_cache_size_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_speculative_preload() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cache_size_bytes: default_max_cache_size_bytes(),
            download_timeout: default_download_timeout(),
            speculative_preload: default_speculative_preload(),
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum cache size.
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_cache_size_bytes = bytes;
        self
    }

    /// Set download timeout.
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn with_speculative_preload(mut self, enabled: bool) -> Self {
        self.speculative_preload = enabled;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_cache_size_bytes == 0 {
            return Err("max_cache_size_bytes must be greater than 0".to_string());
        }

        if self.download_timeout.is_zero() {
            return Err("download_timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}
