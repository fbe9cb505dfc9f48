//! # Playback Error Types
//!
//! Error types for asset delivery, buffering and recovery.
//!
//! Every variant is `Clone`: a coalesced preload hands the same rejection to
//! every caller waiting on it.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// Track declares no sources at all.
    #[error("Track has no sources: {0}")]
    NoSources(String),

    /// Audio source is unavailable (e.g., network error, asset deleted).
    #[error("Audio source unavailable: {0}")]
    SourceUnavailable(String),

    // ========================================================================
    // Network Errors
    // ========================================================================
    /// Download failed at the transport level.
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    /// Download or source load exceeded its time budget.
    #[error("Timed out after {0} ms")]
    Timeout(u64),

    // ========================================================================
    // Format Errors
    // ========================================================================
    /// The host cannot play the declared encoding.
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// The payload could not be decoded by the host.
    #[error("Decoding error: {0}")]
    DecodeFailed(String),

    // ========================================================================
    // Cache Errors
    // ========================================================================
    /// Track is not available in the asset cache.
    #[error("Track not cached: {0}")]
    NotCached(String),

    // ========================================================================
    // Recovery Errors
    // ========================================================================
    /// The failure is permanent; no recovery was attempted.
    #[error("Non-recoverable {kind} error for track {track_id}: {message}")]
    NonRecoverable {
        track_id: String,
        kind: String,
        message: String,
    },

    /// Every recovery attempt failed.
    #[error("Recovery failed for track {track_id} after {attempts} attempts: {message}")]
    RecoveryFailed {
        track_id: String,
        attempts: u32,
        message: String,
    },

    /// Recovery stopped because the track was switched away from.
    #[error("Recovery abandoned for track {0}")]
    RecoveryAbandoned(String),

    /// No fallback source is left to try.
    #[error("No fallback source left for track {0}")]
    FallbackExhausted(String),

    // ========================================================================
    // Playback Control Errors
    // ========================================================================
    /// Attempted operation when no track is loaded.
    #[error("No track loaded")]
    NoTrackLoaded,

    /// Invalid volume value (must be in range [0.0, 1.0]).
    #[error("Invalid volume: {0} (must be between 0.0 and 1.0)")]
    InvalidVolume(f32),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Host bridge failure.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Invalid engine configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            PlaybackError::DownloadFailed(_)
            | PlaybackError::SourceUnavailable(_)
            | PlaybackError::Timeout(_) => true,
            PlaybackError::Bridge(e) => e.is_network(),
            _ => false,
        }
    }

    /// Returns `true` if this error is due to network issues.
    pub fn is_network_error(&self) -> bool {
        match self {
            PlaybackError::DownloadFailed(_) | PlaybackError::Timeout(_) => true,
            PlaybackError::Bridge(e) => e.is_network(),
            _ => false,
        }
    }

    /// Returns `true` if this error is related to audio format/codec issues.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::UnsupportedFormat(_) | PlaybackError::DecodeFailed(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
