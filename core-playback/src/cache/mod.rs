//! # Asset Cache
//!
//! Memory-bounded cache of audio payloads fetched ahead of playback.
//!
//! ## Overview
//!
//! - [`AssetCacheEngine::preload`] downloads a track once, no matter how many
//!   callers ask for it concurrently
//! - [`AssetCacheEngine::manage_buffer`] pairs the current track with a
//!   speculative preload of the next one when the buffer strategy allows it
//! - Entries are evicted largest-first once the configured ceiling is exceeded
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::cache::{AssetCacheEngine, CacheConfig};
//!
//! # async fn example(engine: &AssetCacheEngine, track: &core_playback::Track) -> core_playback::Result<()> {
//! let report = engine.preload(track).await?;
//! println!("cached {} bytes", report.bytes);
//!
//! if let Some(source) = engine.get_cached_url(&track.id) {
//!     println!("play from {}", source.url());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod stats;

pub use config::CacheConfig;
pub use engine::{AssetCacheEngine, PreloadReport};
pub use stats::{CacheStats, DownloadProgress};
