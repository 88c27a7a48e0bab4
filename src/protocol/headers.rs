//! Structured records carried inside framelets.
//!
//! [`Headers`] rides at framelet index 0 of every message frame;
//! [`ProtocolError`] and [`ConfigRecord`] each fill a whole single-framelet
//! frame. All three are encoded with [`RecordCodec`].

use serde::{Deserialize, Serialize};

use crate::codec::RecordCodec;
use crate::error::Result;

/// Semantic kind of a message frame's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PayloadKind {
    /// Expects a matching response.
    Request = 1,
    /// Completes an outstanding request.
    Response = 2,
    /// Fire-and-forget notification.
    Event = 3,
}

impl PayloadKind {
    /// Map a wire value to a known payload kind.
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Request),
            2 => Some(Self::Response),
            3 => Some(Self::Event),
            _ => None,
        }
    }

    /// The wire value for this kind.
    #[inline]
    pub fn wire(self) -> u8 {
        self as u8
    }
}

/// Error code carried in a [`ProtocolError`] record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ProtocolErrorCode {
    /// The frame could not be decoded or had an illegal shape.
    MalformedData = 1,
    /// The frame decoded but asked for something this peer does not do.
    NotSupported = 2,
    /// The peer's protocol-error frame was itself malformed.
    ErrorInError = 3,
}

impl ProtocolErrorCode {
    /// Map a wire value to a known error code.
    pub fn from_wire(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::MalformedData),
            2 => Some(Self::NotSupported),
            3 => Some(Self::ErrorInError),
            _ => None,
        }
    }

    /// The wire value for this code.
    #[inline]
    pub fn wire(self) -> i32 {
        self as i32
    }
}

/// Structured header record at framelet index 0 of a message frame.
///
/// `payload_type` stays raw on the wire so that an out-of-range value can be
/// observed after a successful decode; [`Headers::kind`] gives the typed view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers {
    /// Per-connection request identifier (parity-split by originator).
    pub request_id: u32,
    /// Wire value of the payload kind.
    pub payload_type: u8,
    /// Method name; required for Request/Event, echoed back on Response.
    pub method_name: String,
    /// Zero = success; nonzero = application-level failure.
    pub error_code: i32,
}

impl Headers {
    /// Create headers for the given payload kind.
    pub fn new(request_id: u32, kind: PayloadKind, method_name: &str, error_code: i32) -> Self {
        Self {
            request_id,
            payload_type: kind.wire(),
            method_name: method_name.to_string(),
            error_code,
        }
    }

    /// Typed view of `payload_type`; `None` for out-of-range wire values.
    #[inline]
    pub fn kind(&self) -> Option<PayloadKind> {
        PayloadKind::from_wire(self.payload_type)
    }

    /// Encode to record bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        RecordCodec::encode(self)
    }

    /// Decode from record bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        RecordCodec::decode(bytes)
    }
}

/// Protocol error record; the only framelet of an error frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolError {
    /// Wire value of the error code.
    pub error_code: i32,
}

impl ProtocolError {
    /// Create a record for a known code.
    pub fn new(code: ProtocolErrorCode) -> Self {
        Self {
            error_code: code.wire(),
        }
    }

    /// Typed view of `error_code`; `None` for unrecognized wire values.
    #[inline]
    pub fn code(&self) -> Option<ProtocolErrorCode> {
        ProtocolErrorCode::from_wire(self.error_code)
    }

    /// Encode to record bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        RecordCodec::encode(self)
    }

    /// Decode from record bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        RecordCodec::decode(bytes)
    }
}

/// Handshake/configuration record; the only framelet of a config frame.
///
/// Opaque in this revision. Deserializability is the only validation a
/// receiver performs; an undecodable config frame is malformed, not ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRecord {}

impl ConfigRecord {
    /// Encode to record bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        RecordCodec::encode(self)
    }

    /// Decode from record bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        RecordCodec::decode(bytes)
    }
}
