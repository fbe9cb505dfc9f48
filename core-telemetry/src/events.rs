//! Telemetry event model and the mapping from engine events.

use chrono::{DateTime, Utc};
use core_runtime::events::{BufferEvent, CacheEvent, CoreEvent, PlaybackEvent, RecoveryEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Performance measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "metric", rename_all = "snake_case")]
pub enum PerformanceMetric {
    /// A track payload finished loading.
    TrackLoad {
        track_id: String,
        load_time_ms: u64,
        bytes: u64,
        from_cache: bool,
    },
    /// Playback ran out of buffered data.
    BufferStarved { track_id: String, health: u8 },
    StrategyChange { from: String, to: String },
    CacheEviction { track_id: String, bytes: u64 },
    /// A recovery attempt is about to run after `delay_ms`.
    RecoveryAttempt {
        track_id: String,
        attempt: u32,
        strategy: String,
        delay_ms: u64,
    },
    /// One recovery attempt did not restore playback.
    RecoveryAttemptFailed {
        track_id: String,
        attempt: u32,
        strategy: String,
        message: String,
    },
    /// Terminal outcome of a recovery session.
    Recovery {
        track_id: String,
        attempts: u32,
        outcome: String,
    },
    Custom { name: String, value: f64 },
}

/// Listener actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BehaviorEvent {
    TrackStarted { track_id: String, from_cache: bool },
    Play { track_id: String, position_ms: u64 },
    Pause { track_id: String, position_ms: u64 },
    Seek {
        track_id: String,
        from_ms: u64,
        to_ms: u64,
    },
    VolumeChange { volume_percent: u8 },
    /// A terminal error was shown to the listener. The underlying error is
    /// recorded separately when it occurs.
    ErrorShown {
        track_id: Option<String>,
        message: String,
        recoverable: bool,
    },
    Custom {
        name: String,
        #[serde(default)]
        properties: BTreeMap<String, String>,
    },
}

/// An error observed anywhere in the delivery pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub kind: String,
    pub message: String,
    pub track_id: Option<String>,
    pub recoverable: bool,
}

impl ErrorEvent {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            track_id: None,
            recoverable: false,
        }
    }

    pub fn for_track(mut self, track_id: impl Into<String>) -> Self {
        self.track_id = Some(track_id.into());
        self
    }

    pub fn recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", content = "data", rename_all = "snake_case")]
pub enum TelemetryPayload {
    Performance(PerformanceMetric),
    Behavior(BehaviorEvent),
    Error(ErrorEvent),
}

impl TelemetryPayload {
    /// Translate an engine event into telemetry.
    ///
    /// Progress ticks and healthy buffer samples are not recorded.
    pub fn from_core_event(event: &CoreEvent) -> Option<Self> {
        match event {
            CoreEvent::Cache(event) => Self::from_cache_event(event),
            CoreEvent::Buffer(event) => Self::from_buffer_event(event),
            CoreEvent::Recovery(event) => Some(Self::from_recovery_event(event)),
            CoreEvent::Playback(event) => Some(Self::from_playback_event(event)),
        }
    }

    fn from_cache_event(event: &CacheEvent) -> Option<Self> {
        match event {
            CacheEvent::Preloaded {
                track_id,
                bytes,
                load_time_ms,
            } => Some(TelemetryPayload::Performance(PerformanceMetric::TrackLoad {
                track_id: track_id.clone(),
                load_time_ms: *load_time_ms,
                bytes: *bytes,
                from_cache: false,
            })),
            CacheEvent::PreloadFailed { track_id, message } => Some(TelemetryPayload::Error(
                ErrorEvent::new("preload", message.clone())
                    .for_track(track_id.clone())
                    .recoverable(true),
            )),
            CacheEvent::Evicted { track_id, bytes } => Some(TelemetryPayload::Performance(
                PerformanceMetric::CacheEviction {
                    track_id: track_id.clone(),
                    bytes: *bytes,
                },
            )),
            CacheEvent::PreloadStarted { .. } | CacheEvent::PreloadProgress { .. } => None,
        }
    }

    fn from_buffer_event(event: &BufferEvent) -> Option<Self> {
        match event {
            BufferEvent::StrategyChanged { from, to } => Some(TelemetryPayload::Performance(
                PerformanceMetric::StrategyChange {
                    from: from.clone(),
                    to: to.clone(),
                },
            )),
            BufferEvent::HealthUpdated {
                track_id,
                health,
                starved: true,
                ..
            } => Some(TelemetryPayload::Performance(
                PerformanceMetric::BufferStarved {
                    track_id: track_id.clone(),
                    health: *health,
                },
            )),
            BufferEvent::HealthUpdated { .. } | BufferEvent::NetworkSampled { .. } => None,
        }
    }

    fn from_recovery_event(event: &RecoveryEvent) -> Self {
        match event {
            RecoveryEvent::ErrorClassified {
                track_id,
                kind,
                recoverable,
                message,
            } => TelemetryPayload::Error(
                ErrorEvent::new(kind.clone(), message.clone())
                    .for_track(track_id.clone())
                    .recoverable(*recoverable),
            ),
            RecoveryEvent::AttemptStarted {
                track_id,
                attempt,
                strategy,
                delay_ms,
            } => TelemetryPayload::Performance(PerformanceMetric::RecoveryAttempt {
                track_id: track_id.clone(),
                attempt: *attempt,
                strategy: strategy.clone(),
                delay_ms: *delay_ms,
            }),
            RecoveryEvent::AttemptFailed {
                track_id,
                attempt,
                strategy,
                message,
            } => TelemetryPayload::Performance(PerformanceMetric::RecoveryAttemptFailed {
                track_id: track_id.clone(),
                attempt: *attempt,
                strategy: strategy.clone(),
                message: message.clone(),
            }),
            RecoveryEvent::Succeeded {
                track_id, attempts, ..
            } => recovery_outcome(track_id, *attempts, "success"),
            RecoveryEvent::Failed {
                track_id, attempts, ..
            } => recovery_outcome(track_id, *attempts, "failure"),
            RecoveryEvent::Abandoned { track_id, attempts } => {
                recovery_outcome(track_id, *attempts, "abandoned")
            }
        }
    }

    fn from_playback_event(event: &PlaybackEvent) -> Self {
        let behavior = match event {
            PlaybackEvent::TrackLoaded {
                track_id,
                from_cache,
                ..
            } => BehaviorEvent::TrackStarted {
                track_id: track_id.clone(),
                from_cache: *from_cache,
            },
            PlaybackEvent::Played {
                track_id,
                position_ms,
            } => BehaviorEvent::Play {
                track_id: track_id.clone(),
                position_ms: *position_ms,
            },
            PlaybackEvent::Paused {
                track_id,
                position_ms,
            } => BehaviorEvent::Pause {
                track_id: track_id.clone(),
                position_ms: *position_ms,
            },
            PlaybackEvent::Seeked {
                track_id,
                from_ms,
                to_ms,
            } => BehaviorEvent::Seek {
                track_id: track_id.clone(),
                from_ms: *from_ms,
                to_ms: *to_ms,
            },
            PlaybackEvent::VolumeChanged { volume_percent } => BehaviorEvent::VolumeChange {
                volume_percent: *volume_percent,
            },
            PlaybackEvent::Error {
                track_id,
                message,
                recoverable,
            } => BehaviorEvent::ErrorShown {
                track_id: track_id.clone(),
                message: message.clone(),
                recoverable: *recoverable,
            },
        };
        TelemetryPayload::Behavior(behavior)
    }
}

fn recovery_outcome(track_id: &str, attempts: u32, outcome: &str) -> TelemetryPayload {
    TelemetryPayload::Performance(PerformanceMetric::Recovery {
        track_id: track_id.to_string(),
        attempts,
        outcome: outcome.to_string(),
    })
}

/// A payload stamped with its session and time of capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub id: Uuid,
    pub session_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: TelemetryPayload,
}

impl TelemetryEvent {
    pub fn new(session_id: Uuid, timestamp: DateTime<Utc>, payload: TelemetryPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            timestamp,
            payload,
        }
    }
}
