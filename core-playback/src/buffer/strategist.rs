//! # Buffer Strategist
//!
//! Tracks the host's network signal, keeps exactly one strategy active and
//! answers the buffering questions the cache engine and playback driver ask:
//! how healthy is the buffer, does the track need more data, should the next
//! track be preloaded, how long will a download take.

use super::config::BufferConfig;
use super::strategy::{select_strategy, BufferStrategy, StrategyKind};
use crate::track::{AudioSource, Track};
use bridge_traits::{MediaElement, NetworkInfo, NetworkMonitor};
use core_runtime::events::{BufferEvent, CoreEvent, EventBus};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Buffer state derived from one media element sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BufferHealth {
    pub track_id: String,
    /// Runway relative to the strategy target (0-100).
    pub health: f64,
    /// Seconds buffered ahead of the playback position.
    pub buffered_ahead: f64,
    /// Share of the total duration buffered (0.0-1.0).
    pub buffered_fraction: f64,
    pub starved: bool,
    pub strategy: StrategyKind,
}

/// Snapshot polled by the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BufferStats {
    pub current_strategy_name: String,
    pub network_effective_type: Option<String>,
    pub downlink_mbps: Option<f64>,
    pub average_buffer_health: f64,
    pub override_active: bool,
}

struct StrategistState {
    network: Option<NetworkInfo>,
    selected: StrategyKind,
    forced: Option<StrategyKind>,
    health: HashMap<String, BufferHealth>,
}

impl StrategistState {
    fn active(&self) -> StrategyKind {
        self.forced.unwrap_or(self.selected)
    }
}

pub struct BufferStrategist {
    config: BufferConfig,
    event_bus: EventBus,
    state: RwLock<StrategistState>,
}

impl BufferStrategist {
    /// Starts on the balanced strategy until the first network sample arrives.
    pub fn new(config: BufferConfig, event_bus: EventBus) -> Self {
        Self {
            config,
            event_bus,
            state: RwLock::new(StrategistState {
                network: None,
                selected: StrategyKind::Balanced,
                forced: None,
                health: HashMap::new(),
            }),
        }
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    pub fn current_strategy(&self) -> BufferStrategy {
        self.state.read().active().strategy()
    }

    pub fn network_info(&self) -> Option<NetworkInfo> {
        self.state.read().network.clone()
    }

    /// Record a network sample and re-evaluate the strategy.
    ///
    /// Returns the active strategy. A switch only affects future decisions.
    pub fn on_network_change(&self, info: NetworkInfo) -> StrategyKind {
        let selected = select_strategy(&info);
        self.event_bus
            .emit(CoreEvent::Buffer(BufferEvent::NetworkSampled {
                network_type: info.network_type.map(|t| t.as_str().to_string()),
                effective_type: info.effective_type.map(|t| t.as_str().to_string()),
            }));
        let (previous, active) = {
            let mut state = self.state.write();
            let previous = state.active();
            state.network = Some(info);
            state.selected = selected;
            (previous, state.active())
        };

        if previous != active {
            self.announce_switch(previous, active);
        } else {
            debug!(strategy = %active, "Network changed, strategy unchanged");
        }
        active
    }

    /// Pin a strategy regardless of network samples.
    pub fn force_strategy(&self, kind: StrategyKind) {
        let previous = {
            let mut state = self.state.write();
            let previous = state.active();
            state.forced = Some(kind);
            previous
        };

        if previous != kind {
            self.announce_switch(previous, kind);
        }
    }

    /// Drop a pinned strategy and return to network-driven selection.
    pub fn clear_override(&self) {
        let (previous, active) = {
            let mut state = self.state.write();
            let previous = state.active();
            state.forced = None;
            (previous, state.active())
        };

        if previous != active {
            self.announce_switch(previous, active);
        }
    }

    fn announce_switch(&self, from: StrategyKind, to: StrategyKind) {
        info!(from = %from, to = %to, "Buffer strategy changed");
        self.event_bus
            .emit(CoreEvent::Buffer(BufferEvent::StrategyChanged {
                from: from.name().to_string(),
                to: to.name().to_string(),
            }));
    }

    /// Sample the element's buffered ranges and record the track's health.
    pub fn monitor_buffer_health(&self, track_id: &str, element: &dyn MediaElement) -> BufferHealth {
        let strategy = self.current_strategy();
        let position = element.current_time();
        let ranges = element.buffered();

        let buffered_ahead = ranges
            .iter()
            .find(|range| range.contains(position))
            .map(|range| (range.end - position).max(0.0))
            .unwrap_or(0.0);

        let target = strategy.buffer_ahead.as_secs_f64();
        let health = if target > 0.0 {
            (buffered_ahead / target * 100.0).min(100.0)
        } else {
            100.0
        };

        let duration = element.duration().filter(|d| d.is_finite() && *d > 0.0);
        let buffered_fraction = match (duration, ranges.last()) {
            (Some(duration), Some(last)) => (last.end / duration).clamp(0.0, 1.0),
            _ => 0.0,
        };

        // Reaching the end of the track is not starvation.
        let remaining = duration.map(|d| d - position).unwrap_or(f64::INFINITY);
        let starved = buffered_ahead < self.config.starvation_threshold.as_secs_f64()
            && buffered_ahead < remaining;

        let sample = BufferHealth {
            track_id: track_id.to_string(),
            health,
            buffered_ahead,
            buffered_fraction,
            starved,
            strategy: strategy.kind,
        };

        self.state
            .write()
            .health
            .insert(track_id.to_string(), sample.clone());

        if starved {
            warn!(track_id, buffered_ahead, "Playback buffer starved");
        }

        self.event_bus
            .emit(CoreEvent::Buffer(BufferEvent::HealthUpdated {
                track_id: track_id.to_string(),
                health: health.round() as u8,
                buffered_percent: (buffered_fraction * 100.0).round() as u8,
                starved,
            }));

        sample
    }

    /// Last recorded sample for a track.
    pub fn buffer_health(&self, track_id: &str) -> Option<BufferHealth> {
        self.state.read().health.get(track_id).cloned()
    }

    /// Whether the last sample is below the active strategy's threshold.
    ///
    /// A track that was never sampled needs buffering.
    pub fn needs_buffering(&self, track_id: &str) -> bool {
        let state = self.state.read();
        let threshold = self
            .config
            .health_thresholds
            .for_aggressiveness(state.active().strategy().aggressiveness);

        match state.health.get(track_id) {
            Some(sample) => sample.health < threshold,
            None => true,
        }
    }

    pub fn should_preload_next(&self) -> bool {
        self.current_strategy().preload_next
    }

    /// Estimate how long downloading `bytes` will take on the current link.
    pub fn estimate_load_time(&self, bytes: u64) -> Duration {
        let state = self.state.read();
        let Some(network) = state.network.as_ref() else {
            return self.config.default_load_estimate;
        };

        match network.downlink_mbps.filter(|d| *d > 0.0) {
            Some(downlink) => {
                let bytes_per_sec = downlink * 1_000_000.0 / 8.0;
                let transfer = Duration::from_secs_f64(bytes as f64 / bytes_per_sec);
                let rtt = Duration::from_millis(u64::from(network.rtt_ms.unwrap_or(0)));
                transfer + rtt + self.config.safety_margin
            }
            None => self.config.default_load_estimate,
        }
    }

    /// Alternate sources for a track, skipping `exclude_url`.
    ///
    /// Fast strategies try the best quality first; slow ones the lightest.
    pub fn fallback_sources(&self, track: &Track, exclude_url: Option<&str>) -> Vec<AudioSource> {
        let mut sources: Vec<AudioSource> = track
            .sources
            .iter()
            .filter(|source| Some(source.url.as_str()) != exclude_url)
            .cloned()
            .collect();

        match self.current_strategy().kind {
            StrategyKind::Aggressive | StrategyKind::HighBandwidth => {
                sources.sort_by(|a, b| b.quality.cmp(&a.quality))
            }
            StrategyKind::Conservative | StrategyKind::Balanced => {
                sources.sort_by(|a, b| a.quality.cmp(&b.quality))
            }
        }
        sources
    }

    /// Forget a track's health sample.
    pub fn clear_track(&self, track_id: &str) {
        self.state.write().health.remove(track_id);
    }

    pub fn stats(&self) -> BufferStats {
        let state = self.state.read();
        let average_buffer_health = if state.health.is_empty() {
            0.0
        } else {
            state.health.values().map(|s| s.health).sum::<f64>() / state.health.len() as f64
        };

        BufferStats {
            current_strategy_name: state.active().name().to_string(),
            network_effective_type: state
                .network
                .as_ref()
                .and_then(|n| n.effective_type)
                .map(|t| t.as_str().to_string()),
            downlink_mbps: state.network.as_ref().and_then(|n| n.downlink_mbps),
            average_buffer_health,
            override_active: state.forced.is_some(),
        }
    }

    /// Follow the host's network signal until `cancel` fires or the change
    /// stream closes.
    pub async fn watch(self: Arc<Self>, monitor: Arc<dyn NetworkMonitor>, cancel: CancellationToken) {
        match monitor.get_network_info().await {
            Ok(info) => {
                self.on_network_change(info);
            }
            Err(e) => warn!(error = %e, "Initial network sample unavailable"),
        }

        let mut changes = match monitor.subscribe_changes().await {
            Ok(changes) => changes,
            Err(e) => {
                warn!(error = %e, "Network change notifications unavailable");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                next = changes.next() => match next {
                    Some(info) => {
                        self.on_network_change(info);
                    }
                    None => break,
                },
            }
        }
        debug!("Network watch stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{wait_for, ScriptedElement, ScriptedNetwork};
    use crate::track::{AudioFormat, QualityTier};
    use bridge_traits::{EffectiveType, NetworkType, TimeRange};
    use parking_lot::Mutex;

    fn strategist() -> BufferStrategist {
        BufferStrategist::new(BufferConfig::default(), EventBus::new(16))
    }

    #[test]
    fn test_health_is_relative_to_strategy_target() {
        let strategist = strategist();
        assert_eq!(strategist.current_strategy().kind, StrategyKind::Balanced);

        let element = ScriptedElement::new();
        element.set_buffer(100.0, 10.0, vec![TimeRange::new(0.0, 25.0)]);

        let sample = strategist.monitor_buffer_health("t1", &element);
        assert_eq!(sample.buffered_ahead, 15.0);
        assert_eq!(sample.health, 50.0);
        assert_eq!(sample.buffered_fraction, 0.25);
        assert!(!sample.starved);
    }

    #[test]
    fn test_health_is_clamped() {
        let strategist = strategist();
        let element = ScriptedElement::new();
        element.set_buffer(200.0, 10.0, vec![TimeRange::new(0.0, 40.0)]);
        assert_eq!(strategist.monitor_buffer_health("t1", &element).health, 100.0);

        element.set_buffer(200.0, 10.0, vec![TimeRange::new(0.0, 90.0)]);
        assert_eq!(strategist.monitor_buffer_health("t1", &element).health, 100.0);
    }

    #[test]
    fn test_position_outside_ranges_is_starved() {
        let strategist = strategist();
        let element = ScriptedElement::new();
        element.set_buffer(
            100.0,
            50.0,
            vec![TimeRange::new(0.0, 20.0), TimeRange::new(60.0, 80.0)],
        );

        let sample = strategist.monitor_buffer_health("t1", &element);
        assert_eq!(sample.health, 0.0);
        assert_eq!(sample.buffered_fraction, 0.8);
        assert!(sample.starved);
    }

    #[test]
    fn test_end_of_track_is_not_starved() {
        let strategist = strategist();
        let element = ScriptedElement::new();
        element.set_buffer(100.0, 99.5, vec![TimeRange::new(0.0, 100.0)]);
        assert!(!strategist.monitor_buffer_health("t1", &element).starved);
    }

    #[test]
    fn test_needs_buffering_thresholds() {
        let strategist = strategist();
        assert!(strategist.needs_buffering("unsampled"));

        let element = ScriptedElement::new();
        // 12s of a 30s target = 40%, exactly the medium threshold.
        element.set_buffer(100.0, 0.0, vec![TimeRange::new(0.0, 12.0)]);
        strategist.monitor_buffer_health("t1", &element);
        assert!(!strategist.needs_buffering("t1"));

        // Same sample under a high-aggressiveness strategy (threshold 60).
        strategist.force_strategy(StrategyKind::Aggressive);
        assert!(strategist.needs_buffering("t1"));
    }

    #[test]
    fn test_strategy_change_emits_once() {
        let bus = EventBus::new(16);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.on(move |event| {
            if let CoreEvent::Buffer(BufferEvent::StrategyChanged { to, .. }) = event {
                sink.lock().push(to.clone());
            }
        });
        let strategist = BufferStrategist::new(BufferConfig::default(), bus);

        let slow = NetworkInfo::connected().with_downlink_mbps(0.3);
        assert_eq!(strategist.on_network_change(slow.clone()), StrategyKind::Conservative);
        assert_eq!(strategist.on_network_change(slow), StrategyKind::Conservative);
        strategist.on_network_change(NetworkInfo::connected().with_downlink_mbps(8.0));

        assert_eq!(*seen.lock(), vec!["conservative", "aggressive"]);
    }

    #[test]
    fn test_override_survives_network_changes() {
        let strategist = strategist();
        strategist.force_strategy(StrategyKind::Conservative);
        strategist.on_network_change(NetworkInfo::connected().with_downlink_mbps(20.0));

        assert_eq!(strategist.current_strategy().kind, StrategyKind::Conservative);
        assert!(strategist.stats().override_active);

        strategist.clear_override();
        assert_eq!(strategist.current_strategy().kind, StrategyKind::Aggressive);
    }

    #[test]
    fn test_should_preload_next_follows_strategy() {
        let strategist = strategist();
        assert!(strategist.should_preload_next());

        strategist.on_network_change(
            NetworkInfo::connected().with_effective_type(EffectiveType::TwoG),
        );
        assert!(!strategist.should_preload_next());
    }

    #[test]
    fn test_estimate_load_time() {
        let strategist = strategist();
        assert_eq!(strategist.estimate_load_time(1_000_000), Duration::from_secs(5));

        // 1 MB at 8 Mbps = 1s, plus 100ms RTT and 500ms margin.
        strategist.on_network_change(
            NetworkInfo::connected()
                .with_downlink_mbps(8.0)
                .with_rtt_ms(100),
        );
        assert_eq!(
            strategist.estimate_load_time(1_000_000),
            Duration::from_millis(1600)
        );

        strategist.on_network_change(NetworkInfo::connected());
        assert_eq!(strategist.estimate_load_time(1_000_000), Duration::from_secs(5));
    }

    #[test]
    fn test_fallback_order_depends_on_strategy() {
        let track = Track::new("t1", "Opening")
            .with_source(AudioSource::new("a.mp3", AudioFormat::Mp3, QualityTier::Medium))
            .with_source(AudioSource::new("a.flac", AudioFormat::Flac, QualityTier::Lossless))
            .with_source(AudioSource::new("a-low.ogg", AudioFormat::Ogg, QualityTier::Low))
            .with_source(AudioSource::new("a.ogg", AudioFormat::Ogg, QualityTier::High));

        let strategist = strategist();
        let urls: Vec<String> = strategist
            .fallback_sources(&track, Some("a.ogg"))
            .into_iter()
            .map(|s| s.url)
            .collect();
        assert_eq!(urls, vec!["a-low.ogg", "a.mp3", "a.flac"]);

        strategist.force_strategy(StrategyKind::HighBandwidth);
        let urls: Vec<String> = strategist
            .fallback_sources(&track, None)
            .into_iter()
            .map(|s| s.url)
            .collect();
        assert_eq!(urls, vec!["a.flac", "a.ogg", "a.mp3", "a-low.ogg"]);
    }

    #[test]
    fn test_stats_average_health() {
        let strategist = strategist();
        strategist.on_network_change(
            NetworkInfo::connected()
                .with_network_type(NetworkType::Cellular)
                .with_effective_type(EffectiveType::ThreeG)
                .with_downlink_mbps(1.2),
        );

        let element = ScriptedElement::new();
        element.set_buffer(100.0, 0.0, vec![TimeRange::new(0.0, 30.0)]);
        strategist.monitor_buffer_health("t1", &element);
        element.set_buffer(100.0, 0.0, vec![TimeRange::new(0.0, 15.0)]);
        strategist.monitor_buffer_health("t2", &element);

        let stats = strategist.stats();
        assert_eq!(stats.current_strategy_name, "balanced");
        assert_eq!(stats.network_effective_type.as_deref(), Some("3g"));
        assert_eq!(stats.downlink_mbps, Some(1.2));
        assert_eq!(stats.average_buffer_health, 75.0);

        strategist.clear_track("t2");
        assert_eq!(strategist.stats().average_buffer_health, 100.0);
    }

    #[tokio::test]
    async fn test_watch_follows_change_stream() {
        let strategist = Arc::new(strategist());
        let network = ScriptedNetwork::new(NetworkInfo::connected().with_downlink_mbps(8.0));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(Arc::clone(&strategist).watch(network.clone(), cancel.clone()));
        wait_for(|| network.subscriptions() == 1).await;
        assert_eq!(strategist.current_strategy().kind, StrategyKind::Aggressive);

        network.push(NetworkInfo::connected().with_downlink_mbps(0.2));
        wait_for(|| strategist.current_strategy().kind == StrategyKind::Conservative).await;

        cancel.cancel();
        task.await.unwrap();
    }
}
