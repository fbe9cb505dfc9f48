//! # Telemetry Module
//!
//! Best-effort delivery of playback analytics.
//!
//! ## Overview
//!
//! - [`TelemetryBatcher`] collects performance, behavior and error events for
//!   one [`AnalyticsSession`] and POSTs them in batches
//! - Failed batches wait in a [`RetryQueue`] and are resent until a retry cap
//! - Lifecycle teardown hands the final batch to the host's beacon transport
//!
//! Nothing in this crate returns an error to its callers; delivery failures
//! are logged and queued.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_telemetry::{TelemetryBatcher, TelemetryConfig, TelemetryHost};
//!
//! let batcher = TelemetryBatcher::new(
//!     TelemetryConfig::new("https://collector.example/v1/events"),
//!     TelemetryHost::new(http_client, clock).with_beacon(beacon),
//! );
//! batcher.start();
//! batcher.track_error(ErrorEvent::new("network", "connection reset")).await;
//! batcher.shutdown().await;
//! ```

pub mod batcher;
pub mod config;
pub mod error;
pub mod events;
pub mod retry_queue;
pub mod session;

pub use batcher::{AnalyticsSummary, FlushOutcome, RetryReport, TelemetryBatcher, TelemetryHost};
pub use config::TelemetryConfig;
pub use error::{Result, TelemetryError};
pub use events::{BehaviorEvent, ErrorEvent, PerformanceMetric, TelemetryEvent, TelemetryPayload};
pub use retry_queue::{RetryEntry, RetryQueue};
pub use session::AnalyticsSession;
