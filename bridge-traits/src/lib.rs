//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the audio delivery core and the
//! host it runs in. The core never touches sockets, audio devices or timers
//! of the page directly; every capability it consumes is one of the traits
//! below.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Request/response calls and progressive downloads
//! - [`NetworkMonitor`](network::NetworkMonitor) - Connectivity and link quality signals
//! - [`BeaconTransport`](lifecycle::BeaconTransport) - Unload-safe fire-and-forget delivery
//!
//! ### Media
//! - [`MediaElement`](media::MediaElement) - Seekable, bufferable playback element
//! - [`MediaCapabilities`](media::MediaCapabilities) - Codec support probe
//!
//! ### Platform Integration
//! - [`LifecycleObserver`](lifecycle::LifecycleObserver) - Visibility and unload transitions
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert platform-specific failures into it and keep
//! connectivity problems (`Network`, `Timeout`, 5xx `Status`) distinguishable
//! from permanent ones, because the core's recovery policy depends on it.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so engines can share them across
//! async tasks behind `Arc`.

pub mod error;
pub mod http;
pub mod lifecycle;
pub mod media;
pub mod network;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{ByteStream, Download, HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use lifecycle::{BeaconTransport, LifecycleChangeStream, LifecycleObserver, LifecycleState};
pub use media::{
    CanPlay, MediaCapabilities, MediaElement, MediaErrorCode, MediaSource, ReadyState, TimeRange,
};
pub use network::{
    EffectiveType, NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType,
};
pub use time::{Clock, LogLevel, SystemClock};
