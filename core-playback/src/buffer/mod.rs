//! # Buffer Strategy Module
//!
//! Network-aware buffering decisions.
//!
//! ```text
//! NetworkMonitor ──> BufferStrategist ──> strategy (conservative .. high-bandwidth)
//!                          │
//!   MediaElement ──────────┴──> BufferHealth (health %, buffered fraction, starved)
//! ```

pub mod config;
pub mod strategist;
pub mod strategy;

pub use config::{BufferConfig, HealthThresholds};
pub use strategist::{BufferHealth, BufferStats, BufferStrategist};
pub use strategy::{select_strategy, Aggressiveness, BufferStrategy, StrategyKind};
