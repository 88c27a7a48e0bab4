//! Error types for framewire.

use bytes::Bytes;
use thiserror::Error;

/// Main error type for all framewire operations.
#[derive(Debug, Error)]
pub enum FramewireError {
    /// I/O error during socket/loopback operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Structured-record serialization error (headers, config, protocol errors).
    #[error("record encode error: {0}")]
    RecordEncode(#[from] rmp_serde::encode::Error),

    /// Structured-record deserialization error.
    #[error("record decode error: {0}")]
    RecordDecode(#[from] rmp_serde::decode::Error),

    /// Protocol error (invalid frame shape, bad framelet, exhausted IDs, etc.).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The peer reported a protocol error; the connection is going down.
    #[error("peer protocol error (code {0})")]
    PeerProtocolError(i32),

    /// Application-level failure carried in a response frame.
    ///
    /// `detail` holds the response payload describing the failure; its
    /// encoding is up to the service that produced it.
    #[error("application error (code {code})")]
    Application { code: i32, detail: Bytes },

    /// The request was cancelled before a response arrived.
    #[error("request cancelled")]
    Cancelled,

    /// Connection closed unexpectedly.
    #[error("connection closed")]
    ConnectionClosed,

    /// Timed out waiting for space in the outbound frame queue.
    #[error("backpressure timeout")]
    BackpressureTimeout,
}

/// Result type alias using FramewireError.
pub type Result<T> = std::result::Result<T, FramewireError>;
