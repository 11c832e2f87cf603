//! Error types for GPSD sessions
//!
//! This module defines the error types that can occur when communicating
//! with GPSD or parsing its JSON protocol messages.

/// Main error type for GPSD session operations
///
/// Only connect failures and explicit request helpers return these to the
/// caller; errors raised while streaming are logged and recovered from by
/// the session itself.
#[derive(Debug, thiserror::Error)]
pub enum GpsdError {
    /// Connecting to GPSD failed or timed out
    #[error("failed to connect to {address}: {source}")]
    ConnectFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error occurred during network communication
    ///
    /// This typically happens when the connection to GPSD is lost
    /// or the socket has been closed.
    #[error("IoError: {0}")]
    IoError(#[source] std::io::Error),

    /// JSON serialization/deserialization error
    ///
    /// Occurs when GPSD sends malformed JSON or when a record doesn't
    /// match the expected report structure.
    #[error("SerdeError: {0}")]
    SerdeError(#[source] serde_json::Error),

    /// Protocol-level error
    ///
    /// Indicates an error in the GPSD protocol communication,
    /// such as a connection closing before an expected line arrives.
    #[error("ProtocolError: {0}")]
    ProtocolError(&'static str),

    /// The background read loop terminated abnormally
    ///
    /// Raised by `close` when a subscriber callback panicked.
    #[error("session task failed: {0}")]
    TaskError(#[source] Box<dyn std::error::Error + Send + Sync>),
}
