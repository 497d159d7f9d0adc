//! Error types for the Plateful SDK.

use std::time::Duration;
use thiserror::Error;

/// Failure reported by a transport or backend call.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The request was abandoned before it resolved.
    #[error("Request cancelled")]
    Cancelled,
    /// No response within the transport deadline.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// The server answered with an error status.
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },
    /// The response body did not have the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),
    /// The backend could not be reached.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    /// Cancellations are never surfaced to the UI.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BackendError::Cancelled)
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        BackendError::Decode(e.to_string())
    }
}

/// What the error callback of a toggle receives.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// The server kept reporting a state other than the one requested.
    #[error("Server disagreed with desired state {desired} after {attempts} attempts")]
    Mismatch { desired: bool, attempts: u32 },
}

/// Error type for SDK setup and API misuse.
#[derive(Debug, Error)]
pub enum SdkError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for SDK operations.
pub type Result<T> = std::result::Result<T, SdkError>;
