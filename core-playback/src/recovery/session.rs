//! Recovery strategies and per-track session bookkeeping.

use super::classify::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// What a single recovery attempt does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecoveryStrategy {
    /// Re-set the current source and restore the position.
    Reload,
    /// Switch to an alternate source not tried yet in this session.
    Fallback,
    /// Wait for connectivity, then reload.
    NetworkWait,
    /// Confirm the host can play the declared type before retrying.
    FormatRenegotiation,
}

impl RecoveryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryStrategy::Reload => "reload",
            RecoveryStrategy::Fallback => "fallback",
            RecoveryStrategy::NetworkWait => "network-wait",
            RecoveryStrategy::FormatRenegotiation => "format-renegotiation",
        }
    }
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy for the given error kind and 1-based attempt number.
pub fn select_strategy(kind: ErrorKind, attempt: u32) -> RecoveryStrategy {
    match (kind, attempt) {
        (ErrorKind::Network, 0 | 1) => RecoveryStrategy::Reload,
        (ErrorKind::Network, 2) => RecoveryStrategy::Fallback,
        (ErrorKind::Network, _) => RecoveryStrategy::NetworkWait,
        (ErrorKind::Aborted, _) => RecoveryStrategy::Reload,
        (ErrorKind::UnsupportedSource, 0 | 1) => RecoveryStrategy::Fallback,
        (ErrorKind::UnsupportedSource, _) => RecoveryStrategy::FormatRenegotiation,
        (ErrorKind::Decode, _) => RecoveryStrategy::Fallback,
        (ErrorKind::Unknown, _) => RecoveryStrategy::Reload,
    }
}

/// One executed (or executing) attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveryAttempt {
    pub attempt: u32,
    pub strategy: RecoveryStrategy,
    pub delay: Duration,
    pub started_at: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryOutcome {
    InProgress,
    Success,
    Failure,
    Abandoned,
}

/// Bookkeeping for one track's recovery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoverySession {
    pub track_id: String,
    pub error_kind: ErrorKind,
    pub started_at: DateTime<Utc>,
    pub attempts: Vec<RecoveryAttempt>,
    pub outcome: RecoveryOutcome,
    /// The alternate URL that restored playback, if any.
    pub fallback_url: Option<String>,
    /// URLs loaded by this session, successful or not.
    pub tried_urls: Vec<String>,
    #[serde(skip)]
    pub(crate) abandoned: bool,
}

impl RecoverySession {
    pub fn new(track_id: impl Into<String>, error_kind: ErrorKind) -> Self {
        Self {
            track_id: track_id.into(),
            error_kind,
            started_at: Utc::now(),
            attempts: Vec::new(),
            outcome: RecoveryOutcome::InProgress,
            fallback_url: None,
            tried_urls: Vec::new(),
            abandoned: false,
        }
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempts.len() as u32
    }

    pub fn is_active(&self) -> bool {
        self.outcome == RecoveryOutcome::InProgress
    }

    pub fn has_tried(&self, url: &str) -> bool {
        self.tried_urls.iter().any(|tried| tried == url)
    }
}

/// Aggregate recovery figures for the UI.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecoveryStats {
    /// Sessions currently in progress.
    pub active_sessions: usize,
    /// Sessions that reached a terminal outcome.
    pub total_sessions: u64,
    /// Share of finished sessions that succeeded, 0.0-1.0.
    pub success_rate: f64,
    pub average_attempts: f64,
}
