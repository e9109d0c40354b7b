//! Error types for GateKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using GateError
pub type Result<T> = std::result::Result<T, GateError>;

/// Unified error type for GateKV operations
#[derive(Debug, Error)]
pub enum GateError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The stream ended part-way through a frame
    #[error("Truncated frame: stream ended inside {0}")]
    TruncatedFrame(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Server error: {0}")]
    Remote(String),

    // -------------------------------------------------------------------------
    // Authentication Errors
    // -------------------------------------------------------------------------
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    #[error("Wait cancelled")]
    WaitCancelled,

    #[error("Wait timed out")]
    WaitTimeout,

    // -------------------------------------------------------------------------
    // Snapshot Errors
    // -------------------------------------------------------------------------
    #[error("Snapshot corrupted: {0}")]
    SnapshotCorruption(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for GateError {
    fn from(err: bincode::Error) -> Self {
        GateError::Serialization(err.to_string())
    }
}

impl GateError {
    /// Whether this error means the peer went away rather than misbehaved
    pub fn is_disconnect(&self) -> bool {
        match self {
            GateError::TruncatedFrame(_) => true,
            GateError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::NotConnected
            ),
            _ => false,
        }
    }
}
