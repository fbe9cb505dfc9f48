//! Playback failure classification.

use crate::error::PlaybackError;
use bridge_traits::MediaErrorCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure classes the recovery engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Network,
    Decode,
    Aborted,
    UnsupportedSource,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Decode => "decode",
            ErrorKind::Aborted => "aborted",
            ErrorKind::UnsupportedSource => "unsupported-source",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Decode and unsupported-source failures are permanent.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ErrorKind::Decode | ErrorKind::UnsupportedSource)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<MediaErrorCode> for ErrorKind {
    fn from(code: MediaErrorCode) -> Self {
        match code {
            MediaErrorCode::Aborted => ErrorKind::Aborted,
            MediaErrorCode::Network => ErrorKind::Network,
            MediaErrorCode::Decode => ErrorKind::Decode,
            MediaErrorCode::SrcNotSupported => ErrorKind::UnsupportedSource,
        }
    }
}

/// A classified playback failure.
///
/// The recoverability flag is fixed by the kind at classification time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioError {
    pub kind: ErrorKind,
    pub message: String,
    pub recoverable: bool,
    pub media_code: Option<MediaErrorCode>,
}

impl AudioError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            recoverable: kind.is_recoverable(),
            media_code: None,
        }
    }

    /// Classify an error reported by the media element.
    ///
    /// A missing code is classified as `Unknown`.
    pub fn from_media_code(code: Option<MediaErrorCode>, message: impl Into<String>) -> Self {
        let kind = code.map(ErrorKind::from).unwrap_or(ErrorKind::Unknown);
        Self {
            media_code: code,
            ..Self::new(kind, message)
        }
    }

    /// Classify an engine-side failure, e.g. a rejected preload.
    pub fn from_playback_error(error: &PlaybackError) -> Self {
        let kind = match error {
            PlaybackError::UnsupportedFormat(_) => ErrorKind::UnsupportedSource,
            PlaybackError::DecodeFailed(_) => ErrorKind::Decode,
            e if e.is_network_error() || e.is_transient() => ErrorKind::Network,
            _ => ErrorKind::Unknown,
        };
        Self::new(kind, error.to_string())
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}
