//! Playback session façade for the adaptive audio delivery core.
//!
//! This crate wires host-provided bridges (HTTP, codec probe, network,
//! lifecycle, beacon) into one [`PlaybackSession`] that owns the cache,
//! buffering, recovery and telemetry engines. Desktop apps typically enable
//! the `desktop-shims` feature, which supplies reqwest-backed adapters from
//! `bridge-desktop`.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::{PlaybackSession, SessionConfig};
//!
//! let core = CoreConfig::builder()
//!     .media_capabilities(codecs)
//!     .telemetry_endpoint("https://telemetry.example.com/v1/events")
//!     .enable_telemetry(true)
//!     .build()?;
//! let session = PlaybackSession::new(core, SessionConfig::default(), element)?;
//! session.start();
//! session.load_track(track, Some(next)).await?;
//! session.play().await?;
//! ```

pub mod config;
pub mod error;
pub mod session;

pub use config::SessionConfig;
pub use error::{CoreError, Result};
pub use session::{EngineStats, ErrorState, PlaybackSession};

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub use bridge_desktop::{
    DesktopLifecycleObserver, DesktopNetworkMonitor, ReqwestBeaconTransport, ReqwestHttpClient,
};
