//! Umbrella crate for the adaptive audio delivery core.
//!
//! Hosts depend on `adc-workspace` and pick features instead of wiring each
//! member crate:
//!
//! - `desktop-shims` (default): the playback session with reqwest-backed
//!   host adapters
//! - `telemetry`: the session plus direct access to the telemetry batcher

#[cfg(any(feature = "desktop-shims", feature = "telemetry"))]
pub use core_service as service;

#[cfg(feature = "telemetry")]
pub use core_telemetry as telemetry;
