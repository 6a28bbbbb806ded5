//! Error types for the message relay.

use crate::transport::FailureReason;
use thiserror::Error;

/// Relay error type.
#[derive(Error, Debug)]
pub enum RelayError {
    /// The transport could not be opened during initialization
    #[error("Transport open failed: {0}")]
    TransportOpen(FailureReason),

    /// A single transmission attempt was rejected by the transport
    #[error("Transport error: {0}")]
    Transport(FailureReason),

    /// Inbound dictionary lacked one of the required fields
    #[error("Malformed inbound message: missing {missing} field")]
    MalformedInbound {
        /// Name of the first missing field.
        missing: &'static str,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (config file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The relay task has stopped and no longer accepts commands
    #[error("Relay is closed")]
    RelayClosed,
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
