//! Analytics session aggregates.

use crate::events::{BehaviorEvent, PerformanceMetric, TelemetryPayload};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One analytics session per player lifetime.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSession {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub tracks_played: u64,
    pub total_play_time_ms: u64,
    /// Running mean over every recorded track load.
    pub average_load_time_ms: f64,
    pub load_samples: u64,
    pub error_count: u64,
    pub user_agent: String,
    pub network_type: Option<String>,
    #[serde(skip)]
    playing_since: Option<DateTime<Utc>>,
}

impl AnalyticsSession {
    pub fn new(user_agent: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            started_at,
            ended_at: None,
            tracks_played: 0,
            total_play_time_ms: 0,
            average_load_time_ms: 0.0,
            load_samples: 0,
            error_count: 0,
            user_agent: user_agent.into(),
            network_type: None,
            playing_since: None,
        }
    }

    /// Fold one payload captured at `at` into the aggregates.
    pub fn record(&mut self, payload: &TelemetryPayload, at: DateTime<Utc>) {
        match payload {
            TelemetryPayload::Performance(PerformanceMetric::TrackLoad { load_time_ms, .. }) => {
                self.load_samples += 1;
                self.average_load_time_ms +=
                    (*load_time_ms as f64 - self.average_load_time_ms) / self.load_samples as f64;
            }
            TelemetryPayload::Behavior(BehaviorEvent::TrackStarted { .. }) => {
                self.stop_clock(at);
                self.tracks_played += 1;
            }
            TelemetryPayload::Behavior(BehaviorEvent::Play { .. }) => {
                if self.playing_since.is_none() {
                    self.playing_since = Some(at);
                }
            }
            TelemetryPayload::Behavior(BehaviorEvent::Pause { .. }) => self.stop_clock(at),
            TelemetryPayload::Error(_) => self.error_count += 1,
            _ => {}
        }
    }

    pub fn end(&mut self, at: DateTime<Utc>) {
        self.stop_clock(at);
        self.ended_at.get_or_insert(at);
    }

    pub fn is_playing(&self) -> bool {
        self.playing_since.is_some()
    }

    fn stop_clock(&mut self, at: DateTime<Utc>) {
        if let Some(since) = self.playing_since.take() {
            let elapsed = (at - since).num_milliseconds().max(0) as u64;
            self.total_play_time_ms += elapsed;
        }
    }
}
