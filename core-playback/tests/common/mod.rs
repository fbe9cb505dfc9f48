//! Host fakes for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    BridgeError, CanPlay, Download, HttpClient, HttpRequest, HttpResponse, MediaCapabilities,
    MediaElement, MediaErrorCode, MediaSource, ReadyState, TimeRange,
};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Serves fixed-size payloads in one chunk and records every request.
#[derive(Default)]
pub struct CannedHttp {
    sizes: Mutex<HashMap<String, usize>>,
    requests: Mutex<Vec<String>>,
}

impl CannedHttp {
    pub fn with(assets: &[(&str, usize)]) -> Arc<Self> {
        let http = Self::default();
        for (url, size) in assets {
            http.sizes.lock().insert(url.to_string(), *size);
        }
        Arc::new(http)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpClient for CannedHttp {
    async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
        Err(BridgeError::NotAvailable("execute".into()))
    }

    async fn download(&self, url: &str) -> BridgeResult<Download> {
        self.requests.lock().push(url.to_string());
        tokio::task::yield_now().await;

        let size = self.sizes.lock().get(url).copied();
        match size {
            Some(size) => {
                let chunk = Bytes::from(vec![1u8; size]);
                let stream = futures::stream::once(async move { Ok(chunk) });
                Ok(Download::new(Some(size as u64), Box::pin(stream)))
            }
            None => Err(BridgeError::Status {
                status: 404,
                url: url.to_string(),
            }),
        }
    }
}

/// Plays MIME types that start with one of the prefixes.
pub struct Codecs(pub Vec<&'static str>);

impl MediaCapabilities for Codecs {
    fn can_play_type(&self, mime: &str) -> CanPlay {
        if self.0.iter().any(|prefix| mime.starts_with(prefix)) {
            CanPlay::Probably
        } else {
            CanPlay::No
        }
    }
}

/// Media element that refuses a configurable set of URLs.
#[derive(Default)]
pub struct Element {
    source: Mutex<Option<MediaSource>>,
    position: Mutex<f64>,
    duration: Mutex<Option<f64>>,
    buffered: Mutex<Vec<TimeRange>>,
    broken: Mutex<HashSet<String>>,
    loads: Mutex<Vec<String>>,
}

impl Element {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn break_url(&self, url: &str) {
        self.broken.lock().insert(url.to_string());
    }

    pub fn set_buffer(&self, duration: f64, position: f64, buffered: Vec<TimeRange>) {
        *self.duration.lock() = Some(duration);
        *self.position.lock() = position;
        *self.buffered.lock() = buffered;
    }

    pub fn loads(&self) -> Vec<String> {
        self.loads.lock().clone()
    }
}

#[async_trait]
impl MediaElement for Element {
    fn buffered(&self) -> Vec<TimeRange> {
        self.buffered.lock().clone()
    }

    fn current_time(&self) -> f64 {
        *self.position.lock()
    }

    fn duration(&self) -> Option<f64> {
        *self.duration.lock()
    }

    fn ready_state(&self) -> ReadyState {
        ReadyState::HaveEnoughData
    }

    fn error(&self) -> Option<MediaErrorCode> {
        None
    }

    fn current_source(&self) -> Option<MediaSource> {
        self.source.lock().clone()
    }

    async fn load(&self, source: MediaSource) -> BridgeResult<()> {
        self.loads.lock().push(source.url().to_string());
        if self.broken.lock().contains(source.url()) {
            return Err(BridgeError::Network("unreachable".into()));
        }
        *self.source.lock() = Some(source);
        Ok(())
    }

    async fn seek(&self, position: f64) -> BridgeResult<()> {
        *self.position.lock() = position;
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        Ok(())
    }

    fn set_volume(&self, _volume: f32) -> BridgeResult<()> {
        Ok(())
    }
}
