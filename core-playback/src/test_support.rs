//! Hand-written host fakes shared by the unit tests.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    BridgeError, CanPlay, Download, HttpClient, HttpRequest, HttpResponse, MediaCapabilities,
    MediaElement, MediaErrorCode, MediaSource, NetworkChangeStream, NetworkInfo, NetworkMonitor,
    ReadyState, TimeRange,
};
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Yield to the scheduler until `condition` holds.
pub async fn wait_for(condition: impl Fn() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

// ============================================================================
// HTTP
// ============================================================================

enum FakeAsset {
    Payload {
        chunks: Vec<Bytes>,
        delay: Duration,
        declared_length: Option<u64>,
    },
    Failure(BridgeError),
}

/// Serves canned payloads and counts downloads per URL.
#[derive(Default)]
pub struct FakeHttp {
    assets: Mutex<HashMap<String, FakeAsset>>,
    downloads: Mutex<HashMap<String, usize>>,
}

impl FakeHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, url: &str, size: usize) {
        self.serve_slowly(url, size, Duration::ZERO);
    }

    /// Serve `size` bytes in four chunks, sleeping `delay` before each.
    pub fn serve_slowly(&self, url: &str, size: usize, delay: Duration) {
        let chunk = size.div_ceil(4).max(1);
        let payload = vec![7u8; size];
        let chunks = payload
            .chunks(chunk)
            .map(Bytes::copy_from_slice)
            .collect();
        self.assets.lock().insert(
            url.to_string(),
            FakeAsset::Payload {
                chunks,
                delay,
                declared_length: None,
            },
        );
    }

    /// Serve `size` bytes while announcing `declared_length` as the length.
    pub fn serve_with_declared_length(&self, url: &str, size: usize, declared_length: u64) {
        self.assets.lock().insert(
            url.to_string(),
            FakeAsset::Payload {
                chunks: vec![Bytes::from(vec![7u8; size])],
                delay: Duration::ZERO,
                declared_length: Some(declared_length),
            },
        );
    }

    pub fn fail(&self, url: &str, error: BridgeError) {
        self.assets
            .lock()
            .insert(url.to_string(), FakeAsset::Failure(error));
    }

    pub fn download_count(&self, url: &str) -> usize {
        self.downloads.lock().get(url).copied().unwrap_or(0)
    }

    pub fn total_downloads(&self) -> usize {
        self.downloads.lock().values().sum()
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
        Err(BridgeError::NotAvailable("execute".into()))
    }

    async fn download(&self, url: &str) -> BridgeResult<Download> {
        *self.downloads.lock().entry(url.to_string()).or_default() += 1;
        // Let concurrent callers observe the request as in flight.
        tokio::task::yield_now().await;

        let (chunks, delay, declared_length) = match self.assets.lock().get(url) {
            Some(FakeAsset::Payload {
                chunks,
                delay,
                declared_length,
            }) => (chunks.clone(), *delay, *declared_length),
            Some(FakeAsset::Failure(error)) => return Err(error.clone()),
            None => {
                return Err(BridgeError::Status {
                    status: 404,
                    url: url.to_string(),
                })
            }
        };

        let total = declared_length.unwrap_or_else(|| chunks.iter().map(|c| c.len() as u64).sum());
        let stream = futures::stream::iter(chunks)
            .then(move |chunk| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(chunk)
            })
            .boxed();
        Ok(Download::new(Some(total), stream))
    }
}

// ============================================================================
// Codec probe
// ============================================================================

/// Plays only MIME types starting with one of the given prefixes.
pub struct OnlyFormats(pub Vec<&'static str>);

impl MediaCapabilities for OnlyFormats {
    fn can_play_type(&self, mime: &str) -> CanPlay {
        if self.0.iter().any(|prefix| mime.starts_with(prefix)) {
            CanPlay::Probably
        } else {
            CanPlay::No
        }
    }
}

pub fn all_formats() -> Arc<OnlyFormats> {
    Arc::new(OnlyFormats(vec!["audio/"]))
}

// ============================================================================
// Media element
// ============================================================================

#[derive(Default)]
struct ElementState {
    duration: Option<f64>,
    position: f64,
    buffered: Vec<TimeRange>,
    source: Option<MediaSource>,
    error: Option<MediaErrorCode>,
    scripted_loads: VecDeque<BridgeResult<()>>,
    failing_urls: HashSet<String>,
    load_delay: Duration,
    loads: Vec<String>,
    seeks: Vec<f64>,
    playing: bool,
    volume: f32,
}

/// Media element whose buffer and load outcomes are set by the test.
#[derive(Default)]
pub struct ScriptedElement {
    state: Mutex<ElementState>,
}

impl ScriptedElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_buffer(&self, duration: f64, position: f64, buffered: Vec<TimeRange>) {
        let mut state = self.state.lock();
        state.duration = Some(duration);
        state.position = position;
        state.buffered = buffered;
    }

    pub fn set_source(&self, source: MediaSource) {
        self.state.lock().source = Some(source);
    }

    /// Queue outcomes for the next `load` calls, consumed in order.
    pub fn script_loads(&self, outcomes: Vec<BridgeResult<()>>) {
        self.state.lock().scripted_loads.extend(outcomes);
    }

    /// Every load of `url` fails with a network error.
    pub fn fail_url(&self, url: &str) {
        self.state.lock().failing_urls.insert(url.to_string());
    }

    pub fn set_load_delay(&self, delay: Duration) {
        self.state.lock().load_delay = delay;
    }

    pub fn loads(&self) -> Vec<String> {
        self.state.lock().loads.clone()
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.state.lock().seeks.clone()
    }
}

#[async_trait]
impl MediaElement for ScriptedElement {
    fn buffered(&self) -> Vec<TimeRange> {
        self.state.lock().buffered.clone()
    }

    fn current_time(&self) -> f64 {
        self.state.lock().position
    }

    fn duration(&self) -> Option<f64> {
        self.state.lock().duration
    }

    fn ready_state(&self) -> ReadyState {
        if self.state.lock().source.is_some() {
            ReadyState::HaveEnoughData
        } else {
            ReadyState::HaveNothing
        }
    }

    fn error(&self) -> Option<MediaErrorCode> {
        self.state.lock().error
    }

    fn current_source(&self) -> Option<MediaSource> {
        self.state.lock().source.clone()
    }

    async fn load(&self, source: MediaSource) -> BridgeResult<()> {
        let delay = {
            let mut state = self.state.lock();
            state.loads.push(source.url().to_string());
            state.load_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        let outcome = match state.scripted_loads.pop_front() {
            Some(outcome) => outcome,
            None if state.failing_urls.contains(source.url()) => {
                Err(BridgeError::Network(format!("cannot reach {}", source.url())))
            }
            None => Ok(()),
        };

        if outcome.is_ok() {
            state.source = Some(source);
            state.position = 0.0;
            state.error = None;
        }
        outcome
    }

    async fn seek(&self, position: f64) -> BridgeResult<()> {
        let mut state = self.state.lock();
        state.seeks.push(position);
        state.position = position;
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        self.state.lock().playing = true;
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.state.lock().playing = false;
        Ok(())
    }

    fn set_volume(&self, volume: f32) -> BridgeResult<()> {
        self.state.lock().volume = volume;
        Ok(())
    }
}

// ============================================================================
// Network
// ============================================================================

/// Network monitor driven by `push`.
pub struct ScriptedNetwork {
    info: Mutex<NetworkInfo>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<NetworkInfo>>>,
    subscriptions: AtomicUsize,
}

impl ScriptedNetwork {
    pub fn new(info: NetworkInfo) -> Arc<Self> {
        Arc::new(Self {
            info: Mutex::new(info),
            subscribers: Mutex::new(Vec::new()),
            subscriptions: AtomicUsize::new(0),
        })
    }

    pub fn push(&self, info: NetworkInfo) {
        *self.info.lock() = info.clone();
        self.subscribers
            .lock()
            .retain(|tx| tx.send(info.clone()).is_ok());
    }

    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

struct ChannelChanges(mpsc::UnboundedReceiver<NetworkInfo>);

#[async_trait]
impl NetworkChangeStream for ChannelChanges {
    async fn next(&mut self) -> Option<NetworkInfo> {
        self.0.recv().await
    }
}

#[async_trait]
impl NetworkMonitor for ScriptedNetwork {
    async fn get_network_info(&self) -> BridgeResult<NetworkInfo> {
        Ok(self.info.lock().clone())
    }

    async fn subscribe_changes(&self) -> BridgeResult<Box<dyn NetworkChangeStream>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ChannelChanges(rx)))
    }
}
