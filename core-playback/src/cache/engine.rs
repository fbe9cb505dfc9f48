//! # Asset Cache Engine
//!
//! Fetches audio payloads progressively, keeps completed payloads in a
//! memory-bounded cache and hands out playable handles.
//!
//! - Concurrent preloads of the same track share one download
//! - Largest-first eviction keeps the cache under its ceiling
//! - Per-track load state and download progress for the UI

use crate::buffer::BufferStrategist;
use crate::cache::config::CacheConfig;
use crate::cache::stats::{CacheStats, DownloadProgress};
use crate::error::{PlaybackError, Result};
use crate::track::{AudioSource, Track, TrackLoadState};
use bridge_traits::{HttpClient, MediaCapabilities, MediaSource};
use bytes::{Bytes, BytesMut};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use core_runtime::logging::redact_url;
use futures::future::{self, BoxFuture, Shared};
use futures::{FutureExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, info_span, instrument, warn, Instrument};

/// Outcome of a successful preload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreloadReport {
    pub track_id: String,
    pub source_url: String,
    pub bytes: u64,
    pub load_time: Duration,
    /// `true` when the payload was already cached and nothing was fetched.
    pub from_cache: bool,
}

type SharedPreload = Shared<BoxFuture<'static, Result<PreloadReport>>>;

struct CacheEntry {
    source: AudioSource,
    data: Bytes,
    load_time: Duration,
    /// Insertion order, used to break eviction ties.
    sequence: u64,
}

#[derive(Default)]
struct CacheStore {
    entries: HashMap<String, CacheEntry>,
    total_bytes: u64,
    next_sequence: u64,
    evictions: u64,
    evicted_bytes: u64,
}

impl CacheStore {
    fn insert(&mut self, track_id: String, source: AudioSource, data: Bytes, load_time: Duration) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.total_bytes += data.len() as u64;
        if let Some(previous) = self.entries.insert(
            track_id,
            CacheEntry {
                source,
                data,
                load_time,
                sequence,
            },
        ) {
            self.total_bytes -= previous.data.len() as u64;
        }
    }

    fn remove(&mut self, track_id: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(track_id)?;
        self.total_bytes -= entry.data.len() as u64;
        Some(entry)
    }

    /// Largest entry; the earliest inserted wins a size tie.
    fn largest(&self) -> Option<String> {
        self.entries
            .iter()
            .max_by(|(_, a), (_, b)| {
                a.data
                    .len()
                    .cmp(&b.data.len())
                    .then_with(|| b.sequence.cmp(&a.sequence))
            })
            .map(|(id, _)| id.clone())
    }
}

struct Inner {
    config: CacheConfig,
    http_client: Arc<dyn HttpClient>,
    capabilities: Arc<dyn MediaCapabilities>,
    strategist: Arc<BufferStrategist>,
    event_bus: EventBus,
    in_flight: Mutex<HashMap<String, SharedPreload>>,
    store: Mutex<CacheStore>,
    load_states: RwLock<HashMap<String, TrackLoadState>>,
    progress: RwLock<HashMap<String, DownloadProgress>>,
    error_count: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Memory-bounded cache of audio payloads.
///
/// Cloning is cheap; clones share the same cache.
#[derive(Clone)]
pub struct AssetCacheEngine {
    inner: Arc<Inner>,
}

impl AssetCacheEngine {
    pub fn new(
        config: CacheConfig,
        http_client: Arc<dyn HttpClient>,
        capabilities: Arc<dyn MediaCapabilities>,
        strategist: Arc<BufferStrategist>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                http_client,
                capabilities,
                strategist,
                event_bus,
                in_flight: Mutex::new(HashMap::new()),
                store: Mutex::new(CacheStore::default()),
                load_states: RwLock::new(HashMap::new()),
                progress: RwLock::new(HashMap::new()),
                error_count: AtomicU64::new(0),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Download and cache a track's payload.
    ///
    /// Concurrent calls for the same track id share one download and all
    /// observe the same outcome. A track that is already cached resolves
    /// immediately without touching the network.
    ///
    /// Registration happens when `preload` is called, not when the returned
    /// future is first polled.
    pub fn preload(&self, track: &Track) -> BoxFuture<'static, Result<PreloadReport>> {
        let mut in_flight = self.inner.in_flight.lock();

        if let Some(report) = self.cached_report(&track.id) {
            debug!(track_id = %track.id, "Track already cached");
            return future::ready(Ok(report)).boxed();
        }

        if let Some(existing) = in_flight.get(&track.id) {
            debug!(track_id = %track.id, "Joining in-flight preload");
            return existing.clone().boxed();
        }

        let key = track.id.clone();
        let inner = Arc::clone(&self.inner);
        let track = track.clone();
        let span = info_span!("preload", track_id = %key);
        let preload = async move {
            let result = inner.fetch_and_store(&track).await;
            inner.in_flight.lock().remove(&track.id);
            result
        }
        .instrument(span)
        .boxed()
        .shared();
        in_flight.insert(key, preload.clone());
        preload.boxed()
    }

    /// Pick the source to fetch.
    ///
    /// Among sources the host can play, the highest quality tier wins and
    /// declaration order breaks ties. With no playable source the first one
    /// is used; `None` only for an empty list.
    pub fn detect_optimal_format<'a>(&self, sources: &'a [AudioSource]) -> Option<&'a AudioSource> {
        self.inner.detect_optimal_format(sources)
    }

    /// Ensure the current track is cached, speculatively preload the next
    /// one when the active strategy allows, then enforce the size ceiling.
    ///
    /// The speculative preload runs in the background; its failure is only
    /// logged.
    #[instrument(skip(self, current, next), fields(track_id = %current.id))]
    pub async fn manage_buffer(&self, current: &Track, next: Option<&Track>) -> Result<PreloadReport> {
        let report = self.preload(current).await?;

        if let Some(next) = next {
            let allowed =
                self.inner.config.speculative_preload && self.inner.strategist.should_preload_next();
            if allowed && !self.is_cached(&next.id) {
                let engine = self.clone();
                let next = next.clone();
                debug!(next_track_id = %next.id, "Speculative preload scheduled");
                tokio::spawn(async move {
                    if let Err(e) = engine.preload(&next).await {
                        warn!(track_id = %next.id, error = %e, "Speculative preload failed");
                    }
                });
            }
        }

        self.evict();
        Ok(report)
    }

    /// Remove largest entries until the cache fits under its ceiling.
    ///
    /// Returns the evicted track ids in eviction order.
    pub fn evict(&self) -> Vec<String> {
        self.inner.evict()
    }

    /// Playable handle to a cached payload.
    pub fn get_cached_url(&self, track_id: &str) -> Option<MediaSource> {
        let store = self.inner.store.lock();
        match store.entries.get(track_id) {
            Some(entry) => {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                Some(MediaSource::Memory {
                    handle: format!("blob:adc/{}", track_id),
                    data: entry.data.clone(),
                    mime: Some(entry.source.mime_type().to_string()),
                })
            }
            None => {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn is_cached(&self, track_id: &str) -> bool {
        self.inner.store.lock().entries.contains_key(track_id)
    }

    pub fn load_state(&self, track_id: &str) -> Option<TrackLoadState> {
        self.inner.load_states.read().get(track_id).cloned()
    }

    pub fn download_progress(&self, track_id: &str) -> Option<DownloadProgress> {
        self.inner.progress.read().get(track_id).cloned()
    }

    pub fn active_downloads(&self) -> Vec<DownloadProgress> {
        self.inner.progress.read().values().cloned().collect()
    }

    /// Number of failed preloads since the engine was created.
    pub fn error_count(&self) -> u64 {
        self.inner.error_count.load(Ordering::Relaxed)
    }

    /// Drop one cached payload. Returns `false` if it was not cached.
    pub fn remove(&self, track_id: &str) -> bool {
        let removed = self.inner.store.lock().remove(track_id).is_some();
        if removed {
            self.inner.mark_uncached(track_id);
            debug!(track_id, "Cache entry removed");
        }
        removed
    }

    /// Drop every cached payload.
    pub fn clear(&self) {
        let ids: Vec<String> = {
            let mut store = self.inner.store.lock();
            let ids = store.entries.keys().cloned().collect();
            store.entries.clear();
            store.total_bytes = 0;
            ids
        };
        for id in &ids {
            self.inner.mark_uncached(id);
        }
        info!(entries = ids.len(), "Asset cache cleared");
    }

    pub fn cache_stats(&self) -> CacheStats {
        let active_downloads = self.inner.in_flight.lock().len();
        let store = self.inner.store.lock();
        CacheStats {
            entries: store.entries.len(),
            total_bytes: store.total_bytes,
            max_bytes: self.inner.config.max_cache_size_bytes,
            active_downloads,
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            evictions: store.evictions,
            evicted_bytes: store.evicted_bytes,
            error_count: self.inner.error_count.load(Ordering::Relaxed),
        }
    }

    fn cached_report(&self, track_id: &str) -> Option<PreloadReport> {
        let store = self.inner.store.lock();
        store.entries.get(track_id).map(|entry| PreloadReport {
            track_id: track_id.to_string(),
            source_url: entry.source.url.clone(),
            bytes: entry.data.len() as u64,
            load_time: entry.load_time,
            from_cache: true,
        })
    }
}

impl Inner {
    fn detect_optimal_format<'a>(&self, sources: &'a [AudioSource]) -> Option<&'a AudioSource> {
        let mut best: Option<&AudioSource> = None;
        for source in sources {
            if !self.capabilities.can_play_type(source.mime_type()).is_playable() {
                continue;
            }
            if best.map_or(true, |current| source.quality > current.quality) {
                best = Some(source);
            }
        }
        best.or_else(|| sources.first())
    }

    async fn fetch_and_store(&self, track: &Track) -> Result<PreloadReport> {
        let started = Instant::now();
        let outcome = match self.detect_optimal_format(&track.sources) {
            Some(source) => {
                let source = source.clone();
                self.begin_load(&track.id, &source);
                let download_timeout = self.config.download_timeout;
                match timeout(download_timeout, self.download(&track.id, &source)).await {
                    Ok(Ok(data)) => Ok((source, data)),
                    Ok(Err(e)) => Err(e),
                    Err(_) => Err(PlaybackError::Timeout(download_timeout.as_millis() as u64)),
                }
            }
            None => Err(PlaybackError::NoSources(track.id.clone())),
        };
        self.progress.write().remove(&track.id);

        match outcome {
            Ok((source, data)) => {
                let load_time = started.elapsed();
                let bytes = data.len() as u64;
                let source_url = source.url.clone();
                self.store
                    .lock()
                    .insert(track.id.clone(), source, data, load_time);
                self.load_states.write().insert(
                    track.id.clone(),
                    TrackLoadState {
                        preloaded: true,
                        buffer_progress: 100,
                        load_error: None,
                    },
                );

                info!(
                    track_id = %track.id,
                    bytes,
                    load_time_ms = load_time.as_millis() as u64,
                    "Track preloaded"
                );
                self.event_bus.emit(CoreEvent::Cache(CacheEvent::Preloaded {
                    track_id: track.id.clone(),
                    bytes,
                    load_time_ms: load_time.as_millis() as u64,
                }));

                self.evict();

                Ok(PreloadReport {
                    track_id: track.id.clone(),
                    source_url,
                    bytes,
                    load_time,
                    from_cache: false,
                })
            }
            Err(e) => {
                self.error_count.fetch_add(1, Ordering::Relaxed);
                self.load_states
                    .write()
                    .entry(track.id.clone())
                    .or_default()
                    .load_error = Some(e.to_string());

                warn!(track_id = %track.id, error = %e, "Preload failed");
                self.event_bus
                    .emit(CoreEvent::Cache(CacheEvent::PreloadFailed {
                        track_id: track.id.clone(),
                        message: e.to_string(),
                    }));
                Err(e)
            }
        }
    }

    fn begin_load(&self, track_id: &str, source: &AudioSource) {
        self.load_states.write().insert(
            track_id.to_string(),
            TrackLoadState {
                preloaded: false,
                buffer_progress: 0,
                load_error: None,
            },
        );

        debug!(track_id, url = %redact_url(&source.url), quality = %source.quality, "Preload started");
        self.event_bus
            .emit(CoreEvent::Cache(CacheEvent::PreloadStarted {
                track_id: track_id.to_string(),
                url: redact_url(&source.url),
            }));
    }

    async fn download(&self, track_id: &str, source: &AudioSource) -> Result<Bytes> {
        let mut download = self.http_client.download(&source.url).await?;
        let total = download.content_length.or(source.size_bytes);

        self.progress.write().insert(
            track_id.to_string(),
            DownloadProgress::new(track_id.to_string(), total),
        );

        // The declared length is untrusted; never reserve past the cache ceiling.
        let reserve = total
            .unwrap_or(0)
            .min(self.config.max_cache_size_bytes);
        let mut buffer = BytesMut::with_capacity(usize::try_from(reserve).unwrap_or(0));
        let mut last_reported = 0u8;

        while let Some(chunk) = download.stream.next().await {
            let chunk = chunk.map_err(|e| match e {
                bridge_traits::BridgeError::Timeout(ms) => PlaybackError::Timeout(ms),
                other => PlaybackError::DownloadFailed(other.to_string()),
            })?;
            buffer.extend_from_slice(&chunk);

            let percent = {
                let mut progress = self.progress.write();
                match progress.get_mut(track_id) {
                    Some(entry) => {
                        entry.update(buffer.len() as u64);
                        entry.progress_percent
                    }
                    None => 0,
                }
            };

            if let Some(state) = self.load_states.write().get_mut(track_id) {
                state.buffer_progress = percent;
            }

            // Report in 10% steps to keep the bus quiet.
            if percent / 10 > last_reported / 10 {
                last_reported = percent;
                self.event_bus
                    .emit(CoreEvent::Cache(CacheEvent::PreloadProgress {
                        track_id: track_id.to_string(),
                        percent,
                    }));
            }
        }

        if buffer.is_empty() {
            return Err(PlaybackError::SourceUnavailable(format!(
                "empty payload for track {}",
                track_id
            )));
        }

        Ok(buffer.freeze())
    }

    fn evict(&self) -> Vec<String> {
        let max = self.config.max_cache_size_bytes;
        let mut evicted = Vec::new();
        {
            let mut store = self.store.lock();
            while store.total_bytes > max {
                let Some(track_id) = store.largest() else {
                    break;
                };
                if let Some(entry) = store.remove(&track_id) {
                    let bytes = entry.data.len() as u64;
                    store.evictions += 1;
                    store.evicted_bytes += bytes;
                    evicted.push((track_id, bytes));
                }
            }
        }

        for (track_id, bytes) in &evicted {
            self.mark_uncached(track_id);
            debug!(track_id = %track_id, bytes, "Cache entry evicted");
            self.event_bus.emit(CoreEvent::Cache(CacheEvent::Evicted {
                track_id: track_id.clone(),
                bytes: *bytes,
            }));
        }

        evicted.into_iter().map(|(id, _)| id).collect()
    }

    fn mark_uncached(&self, track_id: &str) {
        if let Some(state) = self.load_states.write().get_mut(track_id) {
            state.preloaded = false;
            state.buffer_progress = 0;
        }
    }
}
