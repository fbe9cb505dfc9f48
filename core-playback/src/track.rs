//! # Track Model
//!
//! Immutable track descriptors built by the caller when assembling a
//! playlist, plus the per-track load state the cache engine maintains
//! alongside them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Declared quality tier of an encoded source. Ordered low to high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Low,
    Medium,
    High,
    Lossless,
}

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Low => "low",
            QualityTier::Medium => "medium",
            QualityTier::High => "high",
            QualityTier::Lossless => "lossless",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoding of an audio source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Ogg,
    Opus,
    Aac,
    Flac,
    Wav,
    Webm,
}

impl AudioFormat {
    /// MIME type handed to the host codec probe.
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Opus => "audio/ogg; codecs=\"opus\"",
            AudioFormat::Aac => "audio/aac",
            AudioFormat::Flac => "audio/flac",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Webm => "audio/webm",
        }
    }

    /// Guess the format from a URL's file extension.
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let extension = path.rsplit_once('.')?.1.to_ascii_lowercase();
        match extension.as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "ogg" | "oga" => Some(AudioFormat::Ogg),
            "opus" => Some(AudioFormat::Opus),
            "aac" | "m4a" => Some(AudioFormat::Aac),
            "flac" => Some(AudioFormat::Flac),
            "wav" => Some(AudioFormat::Wav),
            "webm" => Some(AudioFormat::Webm),
            _ => None,
        }
    }
}

/// One encoded rendition of a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSource {
    pub url: String,
    pub format: AudioFormat,
    pub quality: QualityTier,
    /// Declared payload size; used when the server omits Content-Length.
    #[serde(default)]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub duration: Option<Duration>,
}

impl AudioSource {
    pub fn new(url: impl Into<String>, format: AudioFormat, quality: QualityTier) -> Self {
        Self {
            url: url.into(),
            format,
            quality,
            size_bytes: None,
            duration: None,
        }
    }

    pub fn with_size(mut self, bytes: u64) -> Self {
        self.size_bytes = Some(bytes);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

/// Descriptive metadata shown by the UI and attached to analytics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<u16>,
    pub bitrate_kbps: Option<u32>,
}

/// Immutable track descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    /// Declaration order matters: it breaks quality ties during format selection.
    pub sources: Vec<AudioSource>,
    #[serde(default)]
    pub metadata: Option<TrackMetadata>,
}

impl Track {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            sources: Vec::new(),
            metadata: None,
        }
    }

    pub fn with_source(mut self, source: AudioSource) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_metadata(mut self, metadata: TrackMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Longest declared source duration.
    pub fn duration(&self) -> Option<Duration> {
        self.sources.iter().filter_map(|s| s.duration).max()
    }
}

/// Mutable load state kept by the cache engine for each track it has seen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackLoadState {
    pub preloaded: bool,
    /// Download progress (0-100).
    pub buffer_progress: u8,
    pub load_error: Option<String>,
}
