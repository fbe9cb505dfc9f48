use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Network request failed: {0}")]
    Network(String),

    #[error("HTTP status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Operation timed out after {0} ms")]
    Timeout(u64),
}

impl BridgeError {
    /// Returns `true` for failures caused by connectivity rather than by the
    /// remote resource itself.
    pub fn is_network(&self) -> bool {
        matches!(self, BridgeError::Network(_) | BridgeError::Timeout(_))
            || matches!(self, BridgeError::Status { status, .. } if *status >= 500)
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
