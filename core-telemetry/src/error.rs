use bridge_traits::BridgeError;
use thiserror::Error;

/// Failures while delivering a telemetry batch.
///
/// These never reach the batcher's callers; a failed delivery becomes a
/// retry-queue entry.
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to serialize batch: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Collector rejected batch with status {status}")]
    Rejected { status: u16 },

    #[error("Beacon transport refused payload")]
    BeaconRefused,

    #[error("Invalid telemetry configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
