//! Domain-specific error types for the kiosk protocol.
//!
//! All fallible operations return `Result<T, KioskError>`.
//! No panics on invalid input — every error is typed and recoverable
//! except for [`KioskError::Bind`], which is fatal at startup.

use thiserror::Error;

/// The canonical error type for the kiosk protocol.
#[derive(Debug, Error)]
pub enum KioskError {
    // ── Protocol Errors ──────────────────────────────────────────
    /// A line of command text could not be parsed.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// A buffered command line exceeded the codec limit.
    #[error("command too long: {len} bytes (max {max})")]
    CommandTooLong { len: usize, max: usize },

    /// An operation violated the state machine's rules.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    // ── Connection Errors ────────────────────────────────────────
    /// The listener could not be bound. Fatal at startup, never retried.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for KioskError {
    fn from(s: String) -> Self {
        KioskError::Other(s)
    }
}

impl From<&str> for KioskError {
    fn from(s: &str) -> Self {
        KioskError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for KioskError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        KioskError::ChannelClosed
    }
}
