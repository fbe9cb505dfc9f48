//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the audio delivery core:
//! - Logging and tracing infrastructure
//! - Bridge injection and feature configuration
//! - Event bus shared by the cache, buffer, recovery and telemetry engines
//!
//! ## Overview
//!
//! Engines never talk to each other through globals. Each one is handed an
//! [`EventBus`](events::EventBus) at construction and publishes what it did;
//! the session wiring decides who listens.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
