//! # Playback Session
//!
//! One [`PlaybackSession`] owns one instance of every engine and drives them
//! from the host's playback events.
//!
//! ```text
//!  host player ──load/play/seek──> PlaybackSession ──> AssetCacheEngine
//!       │                              │    │               │
//!       └──progress/error ticks───────>│    └──> ErrorRecoveryEngine
//!                                      │               │
//!                               BufferStrategist       │
//!                                      │               │
//!                                      └── EventBus ───┴──> TelemetryBatcher
//! ```
//!
//! Statistics are polled: [`PlaybackSession::engine_stats`],
//! [`PlaybackSession::buffer_stats`], [`PlaybackSession::recovery_stats`] and
//! [`PlaybackSession::analytics_summary`] are cheap snapshots.

use crate::config::SessionConfig;
use crate::error::{CoreError, Result};
use bridge_traits::{MediaElement, MediaSource};
use core_playback::{
    AssetCacheEngine, AudioError, BufferHealth, BufferStats, BufferStrategist,
    ErrorRecoveryEngine, PlaybackError, RecoveryStats, Track,
};
use core_playback::recovery::RecoveryReport;
use core_runtime::config::CoreConfig;
use core_runtime::events::{BufferEvent, CoreEvent, EventBus, ListenerId, PlaybackEvent};
use core_telemetry::{AnalyticsSummary, TelemetryBatcher, TelemetryHost};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Terminal failure shown to the user until the next successful load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorState {
    pub track_id: Option<String>,
    pub message: String,
    pub recoverable: bool,
}

/// Snapshot polled by the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStats {
    /// Health of the current track's buffer (0-100).
    pub buffer_health: f64,
    /// Bytes per second of the current or most recent download.
    pub loading_speed: f64,
    pub error_count: u64,
    pub total_play_time: Duration,
    pub average_load_time: Duration,
    pub memory_usage_mb: f64,
}

#[derive(Default)]
struct DriverState {
    current: Option<Track>,
    error: Option<ErrorState>,
    volume: Option<f32>,
    playing_since: Option<Instant>,
    play_time: Duration,
    load_samples: u32,
    total_load_time: Duration,
    last_speed: f64,
    media_errors: u64,
}

impl DriverState {
    fn stop_clock(&mut self) {
        if let Some(since) = self.playing_since.take() {
            self.play_time += since.elapsed();
        }
    }

    fn play_time(&self) -> Duration {
        self.play_time
            + self
                .playing_since
                .map(|since| since.elapsed())
                .unwrap_or_default()
    }
}

/// Playback façade over the cache, strategist, recovery and telemetry
/// engines.
pub struct PlaybackSession {
    core: CoreConfig,
    element: Arc<dyn MediaElement>,
    event_bus: EventBus,
    strategist: Arc<BufferStrategist>,
    cache: AssetCacheEngine,
    recovery: ErrorRecoveryEngine,
    telemetry: Option<TelemetryBatcher>,
    telemetry_listener: Option<ListenerId>,
    driver: Mutex<DriverState>,
    cancel: CancellationToken,
    started: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PlaybackSession {
    /// Build every engine from the host bridges in `core` and the tuning in
    /// `config`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] when a section fails validation,
    /// including a telemetry section left without an endpoint while
    /// telemetry is enabled.
    pub fn new(
        core: CoreConfig,
        config: SessionConfig,
        element: Arc<dyn MediaElement>,
    ) -> Result<Self> {
        core.validate()?;
        config.validate()?;

        let SessionConfig {
            mut cache,
            buffer,
            recovery,
            telemetry,
        } = config;

        if !core.features.enable_speculative_preload {
            cache.speculative_preload = false;
        }

        let event_bus = EventBus::default();
        let strategist = Arc::new(BufferStrategist::new(buffer, event_bus.clone()));
        let cache = AssetCacheEngine::new(
            cache,
            Arc::clone(&core.http_client),
            Arc::clone(&core.media_capabilities),
            Arc::clone(&strategist),
            event_bus.clone(),
        );
        let recovery = ErrorRecoveryEngine::new(
            recovery,
            Arc::clone(&strategist),
            Arc::clone(&core.media_capabilities),
            core.network_monitor.clone(),
            event_bus.clone(),
        );

        let telemetry = if core.features.enable_telemetry {
            let mut telemetry = telemetry;
            if telemetry.endpoint.is_empty() {
                if let Some(endpoint) = &core.telemetry_endpoint {
                    telemetry.endpoint = endpoint.clone();
                }
            }
            telemetry
                .validate()
                .map_err(|e| CoreError::Config(format!("telemetry: {}", e)))?;

            let mut host = TelemetryHost::new(
                Arc::clone(&core.http_client),
                Arc::clone(&core.clock),
            );
            if let Some(beacon) = &core.beacon_transport {
                host = host.with_beacon(Arc::clone(beacon));
            }
            if core.features.enable_lifecycle_flush {
                if let Some(lifecycle) = &core.lifecycle_observer {
                    host = host.with_lifecycle(Arc::clone(lifecycle));
                }
            }
            Some(TelemetryBatcher::new(telemetry, host))
        } else {
            None
        };

        let telemetry_listener = telemetry
            .as_ref()
            .map(|batcher| forward_to_telemetry(&event_bus, batcher.clone(), &strategist));

        info!(
            telemetry = telemetry.is_some(),
            network_awareness = core.features.enable_network_awareness,
            "Playback session created"
        );

        Ok(Self {
            core,
            element,
            event_bus,
            strategist,
            cache,
            recovery,
            telemetry,
            telemetry_listener,
            driver: Mutex::new(DriverState::default()),
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Spawn the background work: network watching (when enabled) and the
    /// telemetry timers. Must run inside a Tokio runtime; repeat calls are
    /// no-ops.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        if self.core.features.enable_network_awareness {
            if let Some(monitor) = self.core.network_monitor.clone() {
                let strategist = Arc::clone(&self.strategist);
                let cancel = self.cancel.child_token();
                self.tasks
                    .lock()
                    .push(tokio::spawn(strategist.watch(monitor, cancel)));
            }
        }

        if let Some(telemetry) = &self.telemetry {
            telemetry.start();
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn cache(&self) -> &AssetCacheEngine {
        &self.cache
    }

    pub fn strategist(&self) -> &Arc<BufferStrategist> {
        &self.strategist
    }

    pub fn recovery(&self) -> &ErrorRecoveryEngine {
        &self.recovery
    }

    pub fn telemetry(&self) -> Option<&TelemetryBatcher> {
        self.telemetry.as_ref()
    }

    pub fn current_track(&self) -> Option<Track> {
        self.driver.lock().current.clone()
    }

    // ------------------------------------------------------------------
    // Playback driver
    // ------------------------------------------------------------------

    /// Make `track` current, preload it (and `next` when the strategy allows)
    /// and hand the playable source to the media element.
    ///
    /// A failed preload falls back to streaming from the best playable
    /// remote source. A failed element load goes through recovery.
    #[instrument(skip(self, track, next), fields(track_id = %track.id))]
    pub async fn load_track(&self, track: Track, next: Option<Track>) -> Result<()> {
        let previous = {
            let mut driver = self.driver.lock();
            driver.stop_clock();
            driver.error = None;
            driver.current.replace(track.clone())
        };

        if let Some(previous) = previous.filter(|p| p.id != track.id) {
            if self.recovery.abandon(&previous.id) {
                debug!(previous = %previous.id, "Abandoned recovery for previous track");
            }
            self.strategist.clear_track(&previous.id);
        }

        let (source, from_cache) = match self.cache.manage_buffer(&track, next.as_ref()).await {
            Ok(report) => {
                if !report.from_cache {
                    self.record_load(report.bytes, report.load_time);
                }
                match self.cache.get_cached_url(&track.id) {
                    Some(source) => (source, report.from_cache),
                    None => (self.remote_source(&track)?, false),
                }
            }
            Err(e) => {
                warn!(error = %e, "Preload failed, streaming from origin");
                match self.remote_source(&track) {
                    Ok(source) => (source, false),
                    Err(_) => {
                        self.surface_error(Some(&track.id), &e, false);
                        return Err(e.into());
                    }
                }
            }
        };

        if !self.is_current(&track.id) {
            debug!("Track superseded before it finished loading");
            return Ok(());
        }

        if let Err(e) = self.element.load(source).await {
            let error = PlaybackError::from(e);
            warn!(error = %error, "Media element rejected the source");
            self.recover_current(&track, AudioError::from_playback_error(&error))
                .await?;
        }

        self.event_bus
            .emit(CoreEvent::Playback(PlaybackEvent::TrackLoaded {
                track_id: track.id.clone(),
                title: track.title.clone(),
                from_cache,
            }));
        Ok(())
    }

    pub async fn play(&self) -> Result<()> {
        let track = self.require_track()?;
        self.element.play().await.map_err(PlaybackError::from)?;

        {
            let mut driver = self.driver.lock();
            if driver.playing_since.is_none() {
                driver.playing_since = Some(Instant::now());
            }
        }

        self.event_bus
            .emit(CoreEvent::Playback(PlaybackEvent::Played {
                track_id: track.id,
                position_ms: seconds_to_ms(self.element.current_time()),
            }));
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        let track = self.require_track()?;
        self.element.pause().await.map_err(PlaybackError::from)?;
        self.driver.lock().stop_clock();

        self.event_bus
            .emit(CoreEvent::Playback(PlaybackEvent::Paused {
                track_id: track.id,
                position_ms: seconds_to_ms(self.element.current_time()),
            }));
        Ok(())
    }

    /// Seek to `position` seconds, clamped to the element's duration, and
    /// resample buffer health at the new position.
    pub async fn seek(&self, position: f64) -> Result<BufferHealth> {
        let track = self.require_track()?;
        let mut target = if position.is_finite() { position.max(0.0) } else { 0.0 };
        if let Some(duration) = self.element.duration() {
            target = target.min(duration);
        }

        let from = self.element.current_time();
        self.element.seek(target).await.map_err(PlaybackError::from)?;

        self.event_bus
            .emit(CoreEvent::Playback(PlaybackEvent::Seeked {
                track_id: track.id.clone(),
                from_ms: seconds_to_ms(from),
                to_ms: seconds_to_ms(target),
            }));

        Ok(self
            .strategist
            .monitor_buffer_health(&track.id, self.element.as_ref()))
    }

    pub fn set_volume(&self, volume: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(PlaybackError::InvalidVolume(volume).into());
        }
        self.element.set_volume(volume).map_err(PlaybackError::from)?;
        self.driver.lock().volume = Some(volume);

        self.event_bus
            .emit(CoreEvent::Playback(PlaybackEvent::VolumeChanged {
                volume_percent: (volume * 100.0).round() as u8,
            }));
        Ok(())
    }

    pub fn volume(&self) -> Option<f32> {
        self.driver.lock().volume
    }

    /// Progress tick from the media element: recompute buffer health.
    pub fn on_progress(&self) -> Result<BufferHealth> {
        let track = self.require_track()?;
        Ok(self
            .strategist
            .monitor_buffer_health(&track.id, self.element.as_ref()))
    }

    /// Error event from the media element: classify it and run recovery.
    ///
    /// A failed recovery is surfaced through [`PlaybackSession::error_state`].
    pub async fn on_media_error(&self) -> Result<RecoveryReport> {
        let track = self.require_track()?;
        let code = self.element.error();
        let message = match code {
            Some(code) => format!("media element reported {:?}", code),
            None => "media element reported an unknown error".to_string(),
        };
        self.recover_current(&track, AudioError::from_media_code(code, message))
            .await
    }

    pub fn error_state(&self) -> Option<ErrorState> {
        self.driver.lock().error.clone()
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    pub fn engine_stats(&self) -> EngineStats {
        let (current, play_time, average_load_time, last_speed, media_errors) = {
            let driver = self.driver.lock();
            let average = if driver.load_samples == 0 {
                Duration::ZERO
            } else {
                driver.total_load_time / driver.load_samples
            };
            (
                driver.current.as_ref().map(|t| t.id.clone()),
                driver.play_time(),
                average,
                driver.last_speed,
                driver.media_errors,
            )
        };

        let buffer_health = current
            .as_deref()
            .and_then(|id| self.strategist.buffer_health(id))
            .map(|h| h.health)
            .unwrap_or(0.0);
        let loading_speed = current
            .as_deref()
            .and_then(|id| self.cache.download_progress(id))
            .map(|p| p.speed_bytes_per_sec as f64)
            .unwrap_or(last_speed);

        EngineStats {
            buffer_health,
            loading_speed,
            error_count: self.cache.error_count() + media_errors,
            total_play_time: play_time,
            average_load_time,
            memory_usage_mb: self.cache.cache_stats().memory_usage_mb(),
        }
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.strategist.stats()
    }

    pub fn recovery_stats(&self) -> RecoveryStats {
        self.recovery.stats()
    }

    /// `None` when telemetry is disabled.
    pub fn analytics_summary(&self) -> Option<AnalyticsSummary> {
        self.telemetry.as_ref().map(|t| t.summary())
    }

    /// Stop background work, abandon in-flight recovery, flush analytics
    /// and release cached payloads.
    pub async fn shutdown(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();

        let current = {
            let mut driver = self.driver.lock();
            driver.stop_clock();
            driver.current.clone()
        };
        if let Some(track) = current {
            self.recovery.abandon(&track.id);
        }

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }

        if let Some(telemetry) = &self.telemetry {
            let outcome = telemetry.shutdown().await;
            debug!(?outcome, "Telemetry flushed on shutdown");
        }
        if let Some(id) = self.telemetry_listener {
            self.event_bus.off(id);
        }

        self.cache.clear();
        self.recovery.clear_all();
        info!("Playback session shut down");
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn require_track(&self) -> Result<Track> {
        self.current_track()
            .ok_or_else(|| PlaybackError::NoTrackLoaded.into())
    }

    fn is_current(&self, track_id: &str) -> bool {
        self.driver
            .lock()
            .current
            .as_ref()
            .is_some_and(|t| t.id == track_id)
    }

    fn remote_source(&self, track: &Track) -> Result<MediaSource> {
        let source = self
            .cache
            .detect_optimal_format(&track.sources)
            .ok_or_else(|| PlaybackError::NoSources(track.id.clone()))?;
        Ok(MediaSource::remote(
            source.url.clone(),
            Some(source.mime_type().to_string()),
        ))
    }

    fn record_load(&self, bytes: u64, load_time: Duration) {
        let mut driver = self.driver.lock();
        driver.load_samples += 1;
        driver.total_load_time += load_time;
        let secs = load_time.as_secs_f64();
        if secs > 0.0 {
            driver.last_speed = bytes as f64 / secs;
        }
    }

    async fn recover_current(&self, track: &Track, error: AudioError) -> Result<RecoveryReport> {
        self.driver.lock().media_errors += 1;
        let recoverable = error.recoverable;

        match self
            .recovery
            .recover(track, self.element.as_ref(), error)
            .await
        {
            Ok(report) => {
                let mut driver = self.driver.lock();
                if driver.current.as_ref().is_some_and(|t| t.id == track.id) {
                    driver.error = None;
                }
                Ok(report)
            }
            Err(e @ PlaybackError::RecoveryAbandoned(_)) => Err(e.into()),
            Err(e) => {
                if self.is_current(&track.id) {
                    self.surface_error(Some(&track.id), &e, recoverable);
                }
                Err(e.into())
            }
        }
    }

    fn surface_error(&self, track_id: Option<&str>, error: &PlaybackError, recoverable: bool) {
        let state = ErrorState {
            track_id: track_id.map(str::to_string),
            message: error.to_string(),
            recoverable,
        };
        warn!(message = %state.message, "Playback error surfaced");
        self.driver.lock().error = Some(state.clone());

        self.event_bus
            .emit(CoreEvent::Playback(PlaybackEvent::Error {
                track_id: state.track_id,
                message: state.message,
                recoverable,
            }));
    }
}

/// Forward every engine event into the batcher and keep the session's
/// connection type current.
fn forward_to_telemetry(
    bus: &EventBus,
    batcher: TelemetryBatcher,
    strategist: &BufferStrategist,
) -> ListenerId {
    if let Some(info) = strategist.network_info() {
        batcher.set_network_type(info.network_type.map(|t| t.as_str().to_string()));
    }
    bus.on(move |event| {
        if let CoreEvent::Buffer(BufferEvent::NetworkSampled { network_type, .. }) = event {
            batcher.set_network_type(network_type.clone());
        }
        batcher.ingest(event);
    })
}

fn seconds_to_ms(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    }
}
