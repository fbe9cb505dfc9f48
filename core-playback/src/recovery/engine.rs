//! # Error Recovery Engine
//!
//! Runs a bounded, backing-off sequence of recovery strategies for a track
//! whose playback failed.
//!
//! Each track gets at most one recovery session. Attempts are executed in an
//! explicit loop: pick a strategy for the error kind and attempt number, wait
//! the backoff delay, execute. A failed attempt consumes one unit of the
//! attempt budget and the loop continues with the next strategy.

use super::classify::AudioError;
use super::config::RecoveryConfig;
use super::session::{
    select_strategy, RecoveryAttempt, RecoveryOutcome, RecoverySession, RecoveryStats,
    RecoveryStrategy,
};
use crate::buffer::BufferStrategist;
use crate::error::{PlaybackError, Result};
use crate::track::{AudioFormat, AudioSource, Track};
use bridge_traits::{MediaCapabilities, MediaElement, MediaSource, NetworkMonitor};
use chrono::Utc;
use core_runtime::events::{CoreEvent, EventBus, RecoveryEvent};
use core_runtime::logging::redact_url;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, instrument, warn};

/// Outcome of a successful recovery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveryReport {
    pub track_id: String,
    pub attempts: u32,
    /// Strategy of the attempt that restored playback.
    pub strategy: RecoveryStrategy,
    pub fallback_url: Option<String>,
    pub elapsed: Duration,
}

#[derive(Default)]
struct Totals {
    finished: u64,
    succeeded: u64,
    attempts: u64,
}

enum Step {
    Attempt {
        attempt: u32,
        strategy: RecoveryStrategy,
        delay: Duration,
    },
    Abandoned(u32),
    Exhausted {
        attempts: u32,
        message: String,
    },
}

/// Drives recovery sessions for failed tracks.
pub struct ErrorRecoveryEngine {
    config: RecoveryConfig,
    strategist: Arc<BufferStrategist>,
    capabilities: Arc<dyn MediaCapabilities>,
    network: Option<Arc<dyn NetworkMonitor>>,
    event_bus: EventBus,
    sessions: Mutex<HashMap<String, RecoverySession>>,
    totals: Mutex<Totals>,
}

impl ErrorRecoveryEngine {
    pub fn new(
        config: RecoveryConfig,
        strategist: Arc<BufferStrategist>,
        capabilities: Arc<dyn MediaCapabilities>,
        network: Option<Arc<dyn NetworkMonitor>>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            config,
            strategist,
            capabilities,
            network,
            event_bus,
            sessions: Mutex::new(HashMap::new()),
            totals: Mutex::new(Totals::default()),
        }
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Try to restore playback of `track` on `element` after `error`.
    ///
    /// Non-recoverable errors fail immediately with zero attempts. Otherwise
    /// attempts run until one succeeds, the attempt budget is spent, or the
    /// session is abandoned.
    #[instrument(skip(self, track, element, error), fields(track_id = %track.id, kind = %error.kind))]
    pub async fn recover(
        &self,
        track: &Track,
        element: &dyn MediaElement,
        error: AudioError,
    ) -> Result<RecoveryReport> {
        let track_id = track.id.clone();
        self.emit(RecoveryEvent::ErrorClassified {
            track_id: track_id.clone(),
            kind: error.kind.as_str().to_string(),
            recoverable: error.recoverable,
            message: error.message.clone(),
        });

        if let Some(failure) = self.retained_failure(&track_id, &error) {
            debug!("Track already failed recovery");
            return Err(failure);
        }

        if !error.recoverable {
            return Err(self.fail_immediately(&track_id, &error));
        }

        let started = Instant::now();
        let resume_position = element.current_time();
        self.open_session(&track_id, &error);

        loop {
            let step = self.next_step(&track_id, &error);
            let (attempt, strategy, delay) = match step {
                Step::Attempt {
                    attempt,
                    strategy,
                    delay,
                } => (attempt, strategy, delay),
                Step::Abandoned(attempts) => return Err(self.finish_abandoned(&track_id, attempts)),
                Step::Exhausted { attempts, message } => {
                    return Err(self.finish_failed(&track_id, attempts, message))
                }
            };

            debug!(attempt, strategy = %strategy, delay_ms = delay.as_millis() as u64, "Recovery attempt scheduled");
            self.emit(RecoveryEvent::AttemptStarted {
                track_id: track_id.clone(),
                attempt,
                strategy: strategy.as_str().to_string(),
                delay_ms: delay.as_millis() as u64,
            });

            sleep(delay).await;

            if self.is_abandoned(&track_id) {
                return Err(self.finish_abandoned(&track_id, attempt));
            }

            match self
                .execute(strategy, track, element, resume_position)
                .await
            {
                Ok(fallback_url) => {
                    return Ok(self.finish_succeeded(
                        &track_id,
                        attempt,
                        strategy,
                        fallback_url,
                        started.elapsed(),
                    ));
                }
                Err(e) => {
                    warn!(attempt, strategy = %strategy, error = %e, "Recovery attempt failed");
                    if let Some(session) = self.sessions.lock().get_mut(&track_id) {
                        if let Some(record) = session.attempts.last_mut() {
                            record.error = Some(e.to_string());
                        }
                    }
                    self.emit(RecoveryEvent::AttemptFailed {
                        track_id: track_id.clone(),
                        attempt,
                        strategy: strategy.as_str().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    /// Mark an in-flight session abandoned; its loop stops before the next
    /// attempt. Returns `false` if no session is in progress for the track.
    pub fn abandon(&self, track_id: &str) -> bool {
        match self.sessions.lock().get_mut(track_id) {
            Some(session) if session.is_active() => {
                session.abandoned = true;
                debug!(track_id, "Recovery session marked abandoned");
                true
            }
            _ => false,
        }
    }

    pub fn session(&self, track_id: &str) -> Option<RecoverySession> {
        self.sessions.lock().get(track_id).cloned()
    }

    pub fn has_active_session(&self, track_id: &str) -> bool {
        self.sessions
            .lock()
            .get(track_id)
            .is_some_and(RecoverySession::is_active)
    }

    pub fn clear_session(&self, track_id: &str) -> bool {
        self.sessions.lock().remove(track_id).is_some()
    }

    pub fn clear_all(&self) {
        self.sessions.lock().clear();
    }

    pub fn stats(&self) -> RecoveryStats {
        let active_sessions = self
            .sessions
            .lock()
            .values()
            .filter(|session| session.is_active())
            .count();
        let totals = self.totals.lock();

        let (success_rate, average_attempts) = if totals.finished == 0 {
            (0.0, 0.0)
        } else {
            (
                totals.succeeded as f64 / totals.finished as f64,
                totals.attempts as f64 / totals.finished as f64,
            )
        };

        RecoveryStats {
            active_sessions,
            total_sessions: totals.finished,
            success_rate,
            average_attempts,
        }
    }

    // ------------------------------------------------------------------
    // Session bookkeeping
    // ------------------------------------------------------------------

    /// Terminal error for a track whose retained session already failed and
    /// has nothing left to try. It is not counted again in the totals.
    fn retained_failure(&self, track_id: &str, error: &AudioError) -> Option<PlaybackError> {
        let sessions = self.sessions.lock();
        let session = sessions.get(track_id)?;
        if session.outcome != RecoveryOutcome::Failure {
            return None;
        }

        if !error.recoverable {
            return Some(PlaybackError::NonRecoverable {
                track_id: track_id.to_string(),
                kind: error.kind.as_str().to_string(),
                message: error.message.clone(),
            });
        }

        let attempts = session.attempt_count();
        if attempts < self.config.max_attempts {
            return None;
        }
        let message = session
            .attempts
            .last()
            .and_then(|record| record.error.clone())
            .unwrap_or_else(|| error.message.clone());
        Some(PlaybackError::RecoveryFailed {
            track_id: track_id.to_string(),
            attempts,
            message,
        })
    }

    fn open_session(&self, track_id: &str, error: &AudioError) {
        let mut sessions = self.sessions.lock();
        let session = sessions
            .entry(track_id.to_string())
            .or_insert_with(|| RecoverySession::new(track_id, error.kind));
        session.error_kind = error.kind;
        session.outcome = RecoveryOutcome::InProgress;
        session.abandoned = false;
    }

    fn next_step(&self, track_id: &str, error: &AudioError) -> Step {
        let mut sessions = self.sessions.lock();
        let Some(session) = sessions.get_mut(track_id) else {
            // Cleared from under us; nothing left to drive.
            return Step::Abandoned(0);
        };

        if session.abandoned {
            return Step::Abandoned(session.attempt_count());
        }

        let attempts = session.attempt_count();
        if attempts >= self.config.max_attempts {
            let message = session
                .attempts
                .last()
                .and_then(|record| record.error.clone())
                .unwrap_or_else(|| error.message.clone());
            return Step::Exhausted { attempts, message };
        }

        let attempt = attempts + 1;
        let strategy = select_strategy(error.kind, attempt);
        let delay = self.config.backoff_delay(attempt);
        session.attempts.push(RecoveryAttempt {
            attempt,
            strategy,
            delay,
            started_at: Utc::now(),
            success: false,
            error: None,
        });

        Step::Attempt {
            attempt,
            strategy,
            delay,
        }
    }

    fn is_abandoned(&self, track_id: &str) -> bool {
        self.sessions
            .lock()
            .get(track_id)
            .map_or(true, |session| session.abandoned)
    }

    fn fail_immediately(&self, track_id: &str, error: &AudioError) -> PlaybackError {
        let mut session = RecoverySession::new(track_id, error.kind);
        session.outcome = RecoveryOutcome::Failure;
        self.sessions.lock().insert(track_id.to_string(), session);
        self.totals.lock().finished += 1;

        warn!(track_id, kind = %error.kind, "Non-recoverable playback error");
        self.emit(RecoveryEvent::Failed {
            track_id: track_id.to_string(),
            attempts: 0,
            message: error.message.clone(),
        });

        PlaybackError::NonRecoverable {
            track_id: track_id.to_string(),
            kind: error.kind.as_str().to_string(),
            message: error.message.clone(),
        }
    }

    fn finish_succeeded(
        &self,
        track_id: &str,
        attempts: u32,
        strategy: RecoveryStrategy,
        fallback_url: Option<String>,
        elapsed: Duration,
    ) -> RecoveryReport {
        self.sessions.lock().remove(track_id);
        {
            let mut totals = self.totals.lock();
            totals.finished += 1;
            totals.succeeded += 1;
            totals.attempts += u64::from(attempts);
        }

        info!(
            track_id,
            attempts,
            strategy = %strategy,
            fallback_url = fallback_url.as_deref().map(redact_url).unwrap_or_default(),
            "Playback recovered"
        );
        self.emit(RecoveryEvent::Succeeded {
            track_id: track_id.to_string(),
            attempts,
            fallback_url: fallback_url.clone(),
        });

        RecoveryReport {
            track_id: track_id.to_string(),
            attempts,
            strategy,
            fallback_url,
            elapsed,
        }
    }

    fn finish_failed(&self, track_id: &str, attempts: u32, message: String) -> PlaybackError {
        if let Some(session) = self.sessions.lock().get_mut(track_id) {
            session.outcome = RecoveryOutcome::Failure;
        }
        {
            let mut totals = self.totals.lock();
            totals.finished += 1;
            totals.attempts += u64::from(attempts);
        }

        warn!(track_id, attempts, error = %message, "Recovery failed");
        self.emit(RecoveryEvent::Failed {
            track_id: track_id.to_string(),
            attempts,
            message: message.clone(),
        });

        PlaybackError::RecoveryFailed {
            track_id: track_id.to_string(),
            attempts,
            message,
        }
    }

    fn finish_abandoned(&self, track_id: &str, attempts: u32) -> PlaybackError {
        if let Some(session) = self.sessions.lock().get_mut(track_id) {
            session.outcome = RecoveryOutcome::Abandoned;
        }

        info!(track_id, attempts, "Recovery abandoned");
        self.emit(RecoveryEvent::Abandoned {
            track_id: track_id.to_string(),
            attempts,
        });

        PlaybackError::RecoveryAbandoned(track_id.to_string())
    }

    fn emit(&self, event: RecoveryEvent) {
        self.event_bus.emit(CoreEvent::Recovery(event));
    }

    // ------------------------------------------------------------------
    // Strategies
    // ------------------------------------------------------------------

    /// Run one strategy. On success returns the alternate URL that was
    /// loaded, if the strategy switched sources.
    async fn execute(
        &self,
        strategy: RecoveryStrategy,
        track: &Track,
        element: &dyn MediaElement,
        resume_position: f64,
    ) -> Result<Option<String>> {
        match strategy {
            RecoveryStrategy::Reload => self
                .reload(track, element, resume_position)
                .await
                .map(|_| None),
            RecoveryStrategy::Fallback => self
                .fallback(track, element, resume_position)
                .await
                .map(Some),
            RecoveryStrategy::NetworkWait => {
                self.wait_for_network().await;
                self.reload(track, element, resume_position)
                    .await
                    .map(|_| None)
            }
            RecoveryStrategy::FormatRenegotiation => {
                self.renegotiate(track, element, resume_position).await
            }
        }
    }

    async fn reload(&self, track: &Track, element: &dyn MediaElement, resume_position: f64) -> Result<()> {
        let source = element
            .current_source()
            .or_else(|| {
                track
                    .sources
                    .first()
                    .map(|s| MediaSource::remote(&s.url, Some(s.mime_type().to_string())))
            })
            .ok_or_else(|| PlaybackError::NoSources(track.id.clone()))?;

        self.load_and_resume(element, source, resume_position).await
    }

    async fn fallback(
        &self,
        track: &Track,
        element: &dyn MediaElement,
        resume_position: f64,
    ) -> Result<String> {
        let current_url = element.current_source().map(|s| s.url().to_string());

        let mut candidates: Vec<(String, Option<String>)> = self
            .strategist
            .fallback_sources(track, current_url.as_deref())
            .into_iter()
            .map(|source| {
                let mime = source.mime_type().to_string();
                (source.url, Some(mime))
            })
            .collect();
        candidates.extend(self.config.fallback_urls.iter().map(|url| {
            let mime = AudioFormat::from_url(url).map(|f| f.mime_type().to_string());
            (url.clone(), mime)
        }));

        let mut last_error = None;
        for (url, mime) in candidates {
            if current_url.as_deref() == Some(url.as_str()) || !self.claim_url(&track.id, &url) {
                continue;
            }

            debug!(url = %redact_url(&url), "Trying fallback source");
            match self
                .load_and_resume(element, MediaSource::remote(&url, mime), resume_position)
                .await
            {
                Ok(()) => {
                    if let Some(session) = self.sessions.lock().get_mut(&track.id) {
                        session.fallback_url = Some(url.clone());
                    }
                    return Ok(url);
                }
                Err(e) => {
                    debug!(url = %redact_url(&url), error = %e, "Fallback source failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| PlaybackError::FallbackExhausted(track.id.clone())))
    }

    /// Record `url` as tried in the track's session. `false` if it already was.
    fn claim_url(&self, track_id: &str, url: &str) -> bool {
        let mut sessions = self.sessions.lock();
        match sessions.get_mut(track_id) {
            Some(session) if session.has_tried(url) => false,
            Some(session) => {
                session.tried_urls.push(url.to_string());
                true
            }
            None => true,
        }
    }

    /// Block until the host reports connectivity or the wait times out.
    /// Either way the caller reloads afterwards.
    async fn wait_for_network(&self) {
        let Some(monitor) = &self.network else {
            return;
        };

        // Subscribe before checking so a change in between is not missed.
        let mut changes = match monitor.subscribe_changes().await {
            Ok(changes) => changes,
            Err(e) => {
                warn!(error = %e, "Network changes unavailable, reloading without waiting");
                return;
            }
        };
        if monitor.is_connected().await {
            return;
        }

        let limit = self.config.network_wait_timeout;
        info!(timeout_ms = limit.as_millis() as u64, "Waiting for connectivity");
        let wait = async {
            while let Some(info) = changes.next().await {
                if info.is_online() {
                    return true;
                }
            }
            false
        };

        match timeout(limit, wait).await {
            Ok(true) => debug!("Connectivity restored"),
            Ok(false) => warn!("Network change stream closed while offline"),
            Err(_) => warn!(timeout_ms = limit.as_millis() as u64, "Still offline after waiting"),
        }
    }

    async fn renegotiate(
        &self,
        track: &Track,
        element: &dyn MediaElement,
        resume_position: f64,
    ) -> Result<Option<String>> {
        let current = element.current_source();
        let current_url = current.as_ref().map(|s| s.url().to_string());
        let declared = track
            .sources
            .iter()
            .find(|s| Some(s.url.as_str()) == current_url.as_deref())
            .or_else(|| track.sources.first());

        let mime = current
            .as_ref()
            .and_then(|s| s.mime().map(str::to_string))
            .or_else(|| declared.map(|s| s.mime_type().to_string()));

        if let Some(mime) = &mime {
            if self.capabilities.can_play_type(mime).is_playable() {
                debug!(mime = %mime, "Declared type is playable; reloading");
                self.reload(track, element, resume_position).await?;
                return Ok(None);
            }
        }

        let mut alternate: Option<&AudioSource> = None;
        for source in &track.sources {
            if Some(source.url.as_str()) == current_url.as_deref()
                || !self.capabilities.can_play_type(source.mime_type()).is_playable()
            {
                continue;
            }
            if alternate.map_or(true, |best| source.quality > best.quality) {
                alternate = Some(source);
            }
        }

        match alternate {
            Some(source) => {
                debug!(url = %redact_url(&source.url), mime = source.mime_type(), "Renegotiated format");
                self.claim_url(&track.id, &source.url);
                let media = MediaSource::remote(&source.url, Some(source.mime_type().to_string()));
                self.load_and_resume(element, media, resume_position).await?;
                if let Some(session) = self.sessions.lock().get_mut(&track.id) {
                    session.fallback_url = Some(source.url.clone());
                }
                Ok(Some(source.url.clone()))
            }
            None => Err(PlaybackError::UnsupportedFormat(
                mime.unwrap_or_else(|| "unknown".to_string()),
            )),
        }
    }

    async fn load_and_resume(
        &self,
        element: &dyn MediaElement,
        source: MediaSource,
        resume_position: f64,
    ) -> Result<()> {
        let limit = self.config.source_load_timeout;
        match timeout(limit, element.load(source)).await {
            Ok(result) => result?,
            Err(_) => return Err(PlaybackError::Timeout(limit.as_millis() as u64)),
        }

        if resume_position > 0.0 {
            element.seek(resume_position).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ErrorRecoveryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorRecoveryEngine")
            .field("config", &self.config)
            .field("sessions", &self.sessions.lock().len())
            .field("network", &self.network.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferConfig;
    use crate::test_support::{all_formats, ScriptedElement, ScriptedNetwork};
    use crate::track::QualityTier;
    use bridge_traits::{BridgeError, CanPlay, MediaErrorCode, NetworkInfo};
    use mockall::mock;

    mock! {
        Capabilities {}
        impl MediaCapabilities for Capabilities {
            fn can_play_type(&self, mime: &str) -> CanPlay;
        }
    }

    struct Fixture {
        engine: Arc<ErrorRecoveryEngine>,
        element: Arc<ScriptedElement>,
        events: Arc<Mutex<Vec<RecoveryEvent>>>,
    }

    fn fixture_with(
        config: RecoveryConfig,
        capabilities: Arc<dyn MediaCapabilities>,
        network: Option<Arc<dyn NetworkMonitor>>,
    ) -> Fixture {
        let bus = EventBus::new(64);
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        bus.on(move |event| {
            if let CoreEvent::Recovery(e) = event {
                sink.lock().push(e.clone());
            }
        });

        let strategist = Arc::new(BufferStrategist::new(BufferConfig::default(), bus.clone()));
        let engine = Arc::new(ErrorRecoveryEngine::new(
            config,
            strategist,
            capabilities,
            network,
            bus,
        ));
        let element = Arc::new(ScriptedElement::new());
        Fixture {
            engine,
            element,
            events,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(RecoveryConfig::default(), all_formats(), None)
    }

    fn single_source_track() -> Track {
        Track::new("t1", "Track").with_source(AudioSource::new(
            "a.ogg",
            AudioFormat::Ogg,
            QualityTier::Medium,
        ))
    }

    fn network_error() -> AudioError {
        AudioError::from_media_code(Some(MediaErrorCode::Network), "connection reset")
    }

    fn playing(element: &ScriptedElement, url: &str, position: f64) {
        element.set_source(MediaSource::remote(url, Some("audio/ogg".into())));
        element.set_buffer(180.0, position, vec![]);
    }

    fn started_delays(events: &Mutex<Vec<RecoveryEvent>>) -> Vec<u64> {
        events
            .lock()
            .iter()
            .filter_map(|e| match e {
                RecoveryEvent::AttemptStarted { delay_ms, .. } => Some(*delay_ms),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_recoverable_fails_without_attempts() {
        let f = fixture();
        playing(&f.element, "a.ogg", 10.0);
        let error = AudioError::from_media_code(Some(MediaErrorCode::Decode), "bad frame");

        let result = f
            .engine
            .recover(&single_source_track(), f.element.as_ref(), error)
            .await;

        assert!(matches!(result, Err(PlaybackError::NonRecoverable { .. })));
        assert!(f.element.loads().is_empty());

        let session = f.engine.session("t1").unwrap();
        assert_eq!(session.attempt_count(), 0);
        assert_eq!(session.outcome, RecoveryOutcome::Failure);
        assert_eq!(f.engine.stats().total_sessions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_failure_hits_ceiling() {
        let f = fixture();
        playing(&f.element, "a.ogg", 10.0);
        f.element.fail_url("a.ogg");

        let started = Instant::now();
        let result = f
            .engine
            .recover(&single_source_track(), f.element.as_ref(), network_error())
            .await;

        match result {
            Err(PlaybackError::RecoveryFailed { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected RecoveryFailed, got {:?}", other),
        }

        assert_eq!(started_delays(&f.events), vec![1000, 2000, 4000]);
        assert!(started.elapsed() >= Duration::from_millis(7000));

        let session = f.engine.session("t1").unwrap();
        assert_eq!(session.outcome, RecoveryOutcome::Failure);
        let strategies: Vec<_> = session.attempts.iter().map(|a| a.strategy).collect();
        assert_eq!(
            strategies,
            vec![
                RecoveryStrategy::Reload,
                RecoveryStrategy::Fallback,
                RecoveryStrategy::NetworkWait,
            ]
        );
        assert!(session.attempts.iter().all(|a| a.error.is_some()));

        // A retained failed session is already at the ceiling.
        let again = f
            .engine
            .recover(&single_source_track(), f.element.as_ref(), network_error())
            .await;
        assert!(matches!(again, Err(PlaybackError::RecoveryFailed { attempts: 3, .. })));
        assert_eq!(f.engine.session("t1").unwrap().attempt_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_restores_position() {
        let f = fixture();
        playing(&f.element, "a.ogg", 42.5);
        let error = AudioError::from_media_code(Some(MediaErrorCode::Aborted), "aborted");

        let report = f
            .engine
            .recover(&single_source_track(), f.element.as_ref(), error)
            .await
            .unwrap();

        assert_eq!(report.attempts, 1);
        assert_eq!(report.strategy, RecoveryStrategy::Reload);
        assert_eq!(f.element.loads(), vec!["a.ogg".to_string()]);
        assert_eq!(f.element.seeks(), vec![42.5]);
        assert!(f.engine.session("t1").is_none());

        let stats = f.engine.stats();
        assert_eq!(stats.success_rate, 1.0);
        assert_eq!(stats.average_attempts, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_switches_source() {
        let f = fixture();
        playing(&f.element, "a.ogg", 12.0);
        f.element
            .script_loads(vec![Err(BridgeError::Network("reset".into()))]);
        let track = single_source_track()
            .with_source(AudioSource::new("a.mp3", AudioFormat::Mp3, QualityTier::Low));

        let report = f
            .engine
            .recover(&track, f.element.as_ref(), network_error())
            .await
            .unwrap();

        assert_eq!(report.attempts, 2);
        assert_eq!(report.fallback_url.as_deref(), Some("a.mp3"));
        assert_eq!(
            f.element.loads(),
            vec!["a.ogg".to_string(), "a.mp3".to_string()]
        );
        assert_eq!(f.element.seeks(), vec![12.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_uses_configured_urls() {
        let f = fixture_with(
            RecoveryConfig::default()
                .with_fallback_urls(vec!["https://mirror/a.ogg?sig=1".into()]),
            all_formats(),
            None,
        );
        playing(&f.element, "a.ogg", 0.0);
        f.element.fail_url("a.ogg");

        let report = f
            .engine
            .recover(&single_source_track(), f.element.as_ref(), network_error())
            .await
            .unwrap();

        assert_eq!(report.fallback_url.as_deref(), Some("https://mirror/a.ogg?sig=1"));
        assert!(f.element.seeks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_wait_resumes_when_online() {
        let network = ScriptedNetwork::new(NetworkInfo::offline());
        let f = fixture_with(
            RecoveryConfig::default(),
            all_formats(),
            Some(network.clone() as Arc<dyn NetworkMonitor>),
        );
        playing(&f.element, "a.ogg", 5.0);
        f.element.script_loads(vec![Err(BridgeError::Network("offline".into()))]);

        let engine = Arc::clone(&f.engine);
        let element = Arc::clone(&f.element);
        let task = tokio::spawn(async move {
            engine
                .recover(&single_source_track(), element.as_ref(), network_error())
                .await
        });

        // Past the 1s + 2s + 4s backoff; now blocked on connectivity.
        sleep(Duration::from_secs(10)).await;
        assert_eq!(network.subscriptions(), 1);
        network.push(NetworkInfo::connected());

        let report = task.await.unwrap().unwrap();
        assert_eq!(report.attempts, 3);
        assert_eq!(report.strategy, RecoveryStrategy::NetworkWait);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_wait_reloads_after_timeout() {
        let network = ScriptedNetwork::new(NetworkInfo::offline());
        let f = fixture_with(
            RecoveryConfig::default().with_network_wait_timeout(Duration::from_secs(5)),
            all_formats(),
            Some(network as Arc<dyn NetworkMonitor>),
        );
        playing(&f.element, "a.ogg", 8.0);
        f.element.script_loads(vec![Err(BridgeError::Network("offline".into()))]);

        let started = Instant::now();
        let report = f
            .engine
            .recover(&single_source_track(), f.element.as_ref(), network_error())
            .await
            .unwrap();

        assert_eq!(report.attempts, 3);
        assert_eq!(report.strategy, RecoveryStrategy::NetworkWait);
        // 1s + 2s + 4s of backoff, then the full 5s wait before the reload.
        assert!(started.elapsed() >= Duration::from_secs(12));
        assert_eq!(f.element.loads(), vec!["a.ogg".to_string(); 2]);
        assert_eq!(f.element.seeks(), vec![8.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_wait_timeout_still_fails_on_reload_error() {
        let network = ScriptedNetwork::new(NetworkInfo::offline());
        let f = fixture_with(
            RecoveryConfig::default().with_network_wait_timeout(Duration::from_secs(5)),
            all_formats(),
            Some(network as Arc<dyn NetworkMonitor>),
        );
        playing(&f.element, "a.ogg", 0.0);
        f.element.fail_url("a.ogg");

        let result = f
            .engine
            .recover(&single_source_track(), f.element.as_ref(), network_error())
            .await;

        assert!(matches!(result, Err(PlaybackError::RecoveryFailed { attempts: 3, .. })));
        let session = f.engine.session("t1").unwrap();
        let last = session.attempts[2].error.as_deref().unwrap();
        assert!(last.contains("cannot reach a.ogg"), "{}", last);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retained_failure_is_not_recounted() {
        let f = fixture();
        playing(&f.element, "a.ogg", 0.0);
        f.element.fail_url("a.ogg");
        let track = single_source_track();

        for _ in 0..3 {
            let result = f.engine.recover(&track, f.element.as_ref(), network_error()).await;
            assert!(matches!(result, Err(PlaybackError::RecoveryFailed { attempts: 3, .. })));
        }

        let stats = f.engine.stats();
        assert_eq!(stats.total_sessions, 1);
        assert_eq!(stats.average_attempts, 3.0);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(f.engine.session("t1").unwrap().attempt_count(), 3);

        let decode = AudioError::from_media_code(Some(MediaErrorCode::Decode), "bad frame");
        let result = f.engine.recover(&track, f.element.as_ref(), decode).await;
        assert!(matches!(result, Err(PlaybackError::NonRecoverable { .. })));
        assert_eq!(f.engine.stats().total_sessions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandon_stops_before_next_attempt() {
        let f = fixture();
        playing(&f.element, "a.ogg", 0.0);
        f.element.fail_url("a.ogg");

        let engine = Arc::clone(&f.engine);
        let element = Arc::clone(&f.element);
        let task = tokio::spawn(async move {
            engine
                .recover(&single_source_track(), element.as_ref(), network_error())
                .await
        });

        sleep(Duration::from_millis(500)).await;
        assert!(f.engine.has_active_session("t1"));
        assert!(f.engine.abandon("t1"));

        let result = task.await.unwrap();
        assert_eq!(result, Err(PlaybackError::RecoveryAbandoned("t1".into())));
        assert!(f.element.loads().is_empty());

        let session = f.engine.session("t1").unwrap();
        assert_eq!(session.outcome, RecoveryOutcome::Abandoned);
        assert!(!f.engine.abandon("t1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_renegotiation_reloads_playable_type() {
        let mut capabilities = MockCapabilities::new();
        capabilities
            .expect_can_play_type()
            .withf(|mime| mime == "audio/ogg")
            .times(1)
            .return_const(CanPlay::Maybe);
        let f = fixture_with(RecoveryConfig::default(), Arc::new(capabilities), None);
        playing(&f.element, "a.ogg", 3.0);

        let switched = f
            .engine
            .renegotiate(&single_source_track(), f.element.as_ref(), 3.0)
            .await
            .unwrap();

        assert!(switched.is_none());
        assert_eq!(f.element.loads(), vec!["a.ogg".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_renegotiation_switches_to_playable_source() {
        let mut capabilities = MockCapabilities::new();
        capabilities
            .expect_can_play_type()
            .returning(|mime| if mime == "audio/mpeg" { CanPlay::Probably } else { CanPlay::No });
        let f = fixture_with(RecoveryConfig::default(), Arc::new(capabilities), None);
        playing(&f.element, "a.ogg", 0.0);
        let track = single_source_track()
            .with_source(AudioSource::new("a.mp3", AudioFormat::Mp3, QualityTier::Low));

        let switched = f
            .engine
            .renegotiate(&track, f.element.as_ref(), 0.0)
            .await
            .unwrap();
        assert_eq!(switched.as_deref(), Some("a.mp3"));

        playing(&f.element, "a.ogg", 0.0);
        let nothing = single_source_track();
        let result = f.engine.renegotiate(&nothing, f.element.as_ref(), 0.0).await;
        assert_eq!(
            result,
            Err(PlaybackError::UnsupportedFormat("audio/ogg".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_cover_lifecycle() {
        let f = fixture();
        playing(&f.element, "a.ogg", 0.0);
        f.element
            .script_loads(vec![Err(BridgeError::Timeout(100))]);
        let track = single_source_track()
            .with_source(AudioSource::new("b.ogg", AudioFormat::Ogg, QualityTier::High));

        f.engine
            .recover(&track, f.element.as_ref(), network_error())
            .await
            .unwrap();

        let events = f.events.lock();
        assert!(matches!(
            events[0],
            RecoveryEvent::ErrorClassified { recoverable: true, .. }
        ));
        assert!(matches!(events[2], RecoveryEvent::AttemptFailed { attempt: 1, .. }));
        assert!(matches!(
            events.last(),
            Some(RecoveryEvent::Succeeded { attempts: 2, .. })
        ));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, RecoveryEvent::AttemptStarted { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn test_stats_empty() {
        let f = fixture();
        let stats = f.engine.stats();
        assert_eq!(stats.active_sessions, 0);
        assert_eq!(stats.success_rate, 0.0);
    }
}
