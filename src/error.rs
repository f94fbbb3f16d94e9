//! Error types for the AMI client

/// Convenience alias used throughout the crate.
pub type AmiResult<T> = Result<T, AmiError>;

/// Errors surfaced by the AMI client.
///
/// Connection errors (`Io`, `Timeout`, `ConnectionClosed`) are fatal to the
/// current connection; reconnection is the caller's responsibility (create a
/// new client). `AuthenticationFailed` is distinct from the generic protocol
/// errors so callers can tell bad credentials from a network fault.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AmiError {
    /// TCP I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An operation did not complete within its deadline
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout {
        /// The deadline that expired, in milliseconds
        timeout_ms: u64,
    },

    /// The connection closed while an operation was in flight
    #[error("connection closed")]
    ConnectionClosed,

    /// An action was issued while the client was not connected
    #[error("not connected")]
    NotConnected,

    /// The server rejected the `Login` action
    #[error("authentication failed: {reason}")]
    AuthenticationFailed {
        /// The server's `Message` header, when present
        reason: String,
    },

    /// The peer violated the wire protocol
    #[error("protocol error: {message}")]
    ProtocolError {
        /// What went wrong
        message: String,
    },

    /// A header name or value failed validation (e.g. embedded newline)
    #[error("invalid header: {header}")]
    InvalidHeader {
        /// The offending header
        header: String,
    },

    /// An event was constructed from a message without an `Event` header
    #[error("message is not an event")]
    NotAnEvent,
}

impl AmiError {
    /// Construct a protocol error with the given message.
    pub fn protocol_error(message: impl Into<String>) -> Self {
        AmiError::ProtocolError {
            message: message.into(),
        }
    }

    /// Construct an authentication failure with the given reason.
    pub fn auth_failed(reason: impl Into<String>) -> Self {
        AmiError::AuthenticationFailed {
            reason: reason.into(),
        }
    }
}
