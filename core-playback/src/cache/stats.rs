//! Cache statistics and download progress

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Snapshot of the asset cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cached payloads
    pub entries: usize,

    /// Total bytes held by cached payloads
    pub total_bytes: u64,

    /// Configured ceiling
    pub max_bytes: u64,

    /// Number of preloads currently in flight
    pub active_downloads: usize,

    /// `get_cached_url` calls that found a payload
    pub hits: u64,

    /// `get_cached_url` calls that found nothing
    pub misses: u64,

    /// Entries removed to respect the ceiling
    pub evictions: u64,

    /// Bytes released by eviction
    pub evicted_bytes: u64,

    /// Failed preloads since the engine was created
    pub error_count: u64,
}

impl CacheStats {
    /// Cache usage as a percentage of the ceiling.
    pub fn usage_percentage(&self) -> f64 {
        if self.max_bytes == 0 {
            return 0.0;
        }

        (self.total_bytes as f64 / self.max_bytes as f64) * 100.0
    }

    /// Returns true if the cache is near capacity (>90%).
    pub fn is_near_capacity(&self) -> bool {
        self.usage_percentage() > 90.0
    }

    /// Bytes above the ceiling (0 when within bounds).
    pub fn space_needed(&self) -> u64 {
        self.total_bytes.saturating_sub(self.max_bytes)
    }

    /// Memory held by cached payloads, in megabytes.
    pub fn memory_usage_mb(&self) -> f64 {
        self.total_bytes as f64 / (1024.0 * 1024.0)
    }

    /// Hit rate percentage; 0 before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            return 0.0;
        }

        (self.hits as f64 / lookups as f64) * 100.0
    }
}

/// Download progress information for a specific track.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadProgress {
    /// Track identifier
    pub track_id: String,

    /// Expected payload size, when known
    pub total_bytes: Option<u64>,

    /// Bytes downloaded so far
    pub downloaded_bytes: u64,

    /// Download progress percentage (0-100)
    pub progress_percent: u8,

    /// Current download speed in bytes/second
    pub speed_bytes_per_sec: u64,

    /// Estimated time remaining in seconds
    pub eta_seconds: Option<u64>,

    #[serde(skip)]
    started_at: Instant,
}

impl DownloadProgress {
    /// Create new download progress tracker.
    pub fn new(track_id: String, total_bytes: Option<u64>) -> Self {
        Self {
            track_id,
            total_bytes,
            downloaded_bytes: 0,
            progress_percent: 0,
            speed_bytes_per_sec: 0,
            eta_seconds: None,
            started_at: Instant::now(),
        }
    }

    /// Update progress with the running byte count.
    pub fn update(&mut self, downloaded_bytes: u64) {
        let elapsed_ms = self.started_at.elapsed().as_millis().max(1) as u64;

        self.downloaded_bytes = downloaded_bytes;

        if let Some(total) = self.total_bytes.filter(|total| *total > 0) {
            let percent = (downloaded_bytes as f64 / total as f64) * 100.0;
            self.progress_percent = percent.min(100.0) as u8;
        }

        self.speed_bytes_per_sec = downloaded_bytes.saturating_mul(1000) / elapsed_ms;

        self.eta_seconds = match (self.total_bytes, self.speed_bytes_per_sec) {
            (Some(total), speed) if speed > 0 => {
                Some(total.saturating_sub(downloaded_bytes) / speed)
            }
            _ => None,
        };
    }

    /// Returns true if download is complete.
    pub fn is_complete(&self) -> bool {
        matches!(self.total_bytes, Some(total) if self.downloaded_bytes >= total)
    }

    /// Format speed as human-readable string.
    pub fn speed_string(&self) -> String {
        format_bytes_per_sec(self.speed_bytes_per_sec)
    }

    /// Format ETA as human-readable string.
    pub fn eta_string(&self) -> String {
        match self.eta_seconds {
            Some(secs) => format_duration_seconds(secs),
            None => "calculating...".to_string(),
        }
    }
}

/// Format bytes per second as human-readable string.
fn format_bytes_per_sec(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B/s", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB/s", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB/s", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Format duration in seconds as human-readable string.
fn format_duration_seconds(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}
