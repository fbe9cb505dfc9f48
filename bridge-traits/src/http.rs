//! HTTP Client Abstraction
//!
//! Request/response calls for telemetry delivery and progressive byte
//! streams for audio asset downloads.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::error::{BridgeError, Result};

/// HTTP method types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Head,
}

/// HTTP request builder
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let json = serde_json::to_vec(body).map_err(|e| {
            BridgeError::OperationFailed(format!("JSON serialization failed: {}", e))
        })?;
        self.body = Some(Bytes::from(json));
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    pub fn body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// HTTP response
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    /// Check if response status is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if response status indicates a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

/// Stream of body chunks as they arrive from the network.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// A progressive download in flight.
///
/// `content_length` is taken from the response headers when the server
/// reports it; callers fall back to the declared asset size otherwise.
pub struct Download {
    pub content_length: Option<u64>,
    pub stream: ByteStream,
}

impl Download {
    pub fn new(content_length: Option<u64>, stream: ByteStream) -> Self {
        Self {
            content_length,
            stream,
        }
    }
}

impl fmt::Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Download")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Async HTTP client trait
///
/// Implementations are expected to:
/// - Reuse connections across calls
/// - Report non-2xx statuses from [`download`](HttpClient::download) as
///   [`BridgeError::Status`]
/// - Map connection resets and DNS failures to [`BridgeError::Network`]
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::{HttpClient, HttpRequest, HttpMethod};
///
/// async fn post_batch(client: &dyn HttpClient, batch: &Batch) -> Result<bool> {
///     let request = HttpRequest::new(HttpMethod::Post, "https://telemetry.example.com/v1")
///         .json(batch)?;
///     Ok(client.execute(request).await?.is_success())
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute an HTTP request and buffer the full response body.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Start a GET download and return the body as a chunk stream.
    async fn download(&self, url: &str) -> Result<Download>;
}
