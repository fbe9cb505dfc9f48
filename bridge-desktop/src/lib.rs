//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`, with streaming downloads
//! - `BeaconTransport` posting on a detached Tokio task
//! - `NetworkMonitor` timing a TCP probe
//! - `LifecycleObserver` reporting `Unloading` on Ctrl-C
//!
//! Codec probing and the media element itself belong to the host's audio
//! stack and are not provided here.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DesktopNetworkMonitor, ReqwestHttpClient};
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .http_client(Arc::new(ReqwestHttpClient::new()))
//!     .network_monitor(Arc::new(DesktopNetworkMonitor::new()))
//!     .media_capabilities(codecs)
//!     .build()?;
//! ```

mod beacon;
mod http;
mod lifecycle;
mod network;

pub use beacon::ReqwestBeaconTransport;
pub use http::{ReqwestHttpClient, RetryPolicy};
pub use lifecycle::DesktopLifecycleObserver;
pub use network::{effective_type_for_rtt, DesktopNetworkMonitor};
