//! # Error Recovery
//!
//! Classifies playback failures and drives bounded, backing-off recovery
//! sessions per track.
//!
//! ## Strategy selection
//!
//! | Error kind          | Attempt 1 | Attempt 2            | Attempt 3+           |
//! |---------------------|-----------|----------------------|----------------------|
//! | network             | reload    | fallback             | network-wait         |
//! | aborted / unknown   | reload    | reload               | reload               |
//! | unsupported-source  | fallback  | format-renegotiation | format-renegotiation |
//! | decode              | fallback  | fallback             | fallback             |
//!
//! Decode and unsupported-source errors are classified non-recoverable and
//! fail before any attempt runs.

pub mod classify;
pub mod config;
pub mod engine;
pub mod session;

pub use classify::{AudioError, ErrorKind};
pub use config::RecoveryConfig;
pub use engine::{ErrorRecoveryEngine, RecoveryReport};
pub use session::{
    select_strategy, RecoveryAttempt, RecoveryOutcome, RecoverySession, RecoveryStats,
    RecoveryStrategy,
};
