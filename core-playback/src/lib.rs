//! # Playback Delivery Module
//!
//! Fetches, caches and protects playback of remote audio tracks.
//!
//! ## Overview
//!
//! This module handles:
//! - Progressive download and memory-bounded caching of track payloads
//!   ([`cache::AssetCacheEngine`])
//! - Network-aware buffering strategy and buffer health
//!   ([`buffer::BufferStrategist`])
//! - Classification of playback failures and bounded retry with fallback
//!   ([`recovery::ErrorRecoveryEngine`])
//!
//! All host access goes through `bridge-traits`; engines publish their
//! events on the shared [`core_runtime::events::EventBus`].

pub mod buffer;
pub mod cache;
pub mod error;
pub mod recovery;
pub mod track;

#[cfg(test)]
pub(crate) mod test_support;

pub use buffer::{BufferConfig, BufferHealth, BufferStats, BufferStrategist, StrategyKind};
pub use cache::{AssetCacheEngine, CacheConfig, CacheStats, DownloadProgress, PreloadReport};
pub use error::{PlaybackError, Result};
pub use recovery::{AudioError, ErrorKind, ErrorRecoveryEngine, RecoveryConfig, RecoveryStats};
pub use track::{AudioFormat, AudioSource, QualityTier, Track, TrackLoadState, TrackMetadata};
