//! Media element bridge traits and supporting types.
//!
//! The core never decodes audio itself. It drives a host-provided media
//! element (an `<audio>` element on the web, a native player elsewhere)
//! through [`MediaElement`] and asks the host which encodings it can play
//! through [`MediaCapabilities`].

use crate::error::Result;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A contiguous span of buffered media, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Inclusive on both ends, so a position sitting exactly on the buffered
    /// edge still counts as inside the range.
    pub fn contains(&self, position: f64) -> bool {
        position >= self.start && position <= self.end
    }
}

/// How much data the element has available around the playback position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

/// Error codes reported by the media element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaErrorCode {
    /// Fetching was aborted by the user agent.
    Aborted,
    /// A network error interrupted the fetch.
    Network,
    /// The payload could not be decoded.
    Decode,
    /// The source or its format is not supported.
    SrcNotSupported,
}

impl MediaErrorCode {
    /// Map the numeric `MediaError.code` values (1-4).
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(MediaErrorCode::Aborted),
            2 => Some(MediaErrorCode::Network),
            3 => Some(MediaErrorCode::Decode),
            4 => Some(MediaErrorCode::SrcNotSupported),
            _ => None,
        }
    }
}

/// Where the element should read its payload from.
#[derive(Clone, PartialEq)]
pub enum MediaSource {
    /// Stream directly from a remote URL.
    Remote { url: String, mime: Option<String> },
    /// Play a fully cached payload. `handle` is the opaque URL the host uses
    /// to refer to the in-memory object.
    Memory {
        handle: String,
        data: Bytes,
        mime: Option<String>,
    },
}

impl MediaSource {
    pub fn remote(url: impl Into<String>, mime: Option<String>) -> Self {
        MediaSource::Remote {
            url: url.into(),
            mime,
        }
    }

    /// The URL the element loads from.
    pub fn url(&self) -> &str {
        match self {
            MediaSource::Remote { url, .. } => url,
            MediaSource::Memory { handle, .. } => handle,
        }
    }

    pub fn mime(&self) -> Option<&str> {
        match self {
            MediaSource::Remote { mime, .. } | MediaSource::Memory { mime, .. } => mime.as_deref(),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, MediaSource::Remote { .. })
    }
}

impl fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaSource::Remote { url, mime } => f
                .debug_struct("Remote")
                .field("url", url)
                .field("mime", mime)
                .finish(),
            MediaSource::Memory { handle, data, mime } => f
                .debug_struct("Memory")
                .field("handle", handle)
                .field("bytes", &data.len())
                .field("mime", mime)
                .finish(),
        }
    }
}

/// Answer to "can this host play the given MIME type".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanPlay {
    No,
    Maybe,
    Probably,
}

impl CanPlay {
    pub fn is_playable(&self) -> bool {
        !matches!(self, CanPlay::No)
    }
}

/// Host codec support probe.
pub trait MediaCapabilities: Send + Sync {
    fn can_play_type(&self, mime: &str) -> CanPlay;
}

/// Seekable, bufferable media element owned by the host.
///
/// Getters are synchronous snapshots of the element state. `load` resolves
/// once the element can start playing the new source, or fails with the
/// element's error.
#[async_trait::async_trait]
pub trait MediaElement: Send + Sync {
    /// Buffered time ranges, ordered by start time.
    fn buffered(&self) -> Vec<TimeRange>;

    /// Current playback position in seconds.
    fn current_time(&self) -> f64;

    /// Total duration in seconds, when known.
    fn duration(&self) -> Option<f64>;

    fn ready_state(&self) -> ReadyState;

    /// The last error raised by the element, if any.
    fn error(&self) -> Option<MediaErrorCode>;

    /// The source currently assigned to the element.
    fn current_source(&self) -> Option<MediaSource>;

    /// Assign a new source and wait until it is playable.
    async fn load(&self, source: MediaSource) -> Result<()>;

    async fn seek(&self, position: f64) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    /// Volume is normalized to `0.0..=1.0`.
    fn set_volume(&self, volume: f32) -> Result<()>;
}
