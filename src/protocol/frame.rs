//! Frame and framelet types, plus the outbound frame builders.
//!
//! A [`Frame`] is an ordered, nonempty sequence of [`Framelet`]s that
//! travels as a unit. Order is significant: the builders below are the only
//! legal way to lay out an outbound frame, so canonical framelet order is
//! enforced by construction. Contents use `bytes::Bytes` for zero-copy
//! sharing between the frame and whoever holds slices of it.

use bytes::Bytes;

use super::headers::{ConfigRecord, Headers, PayloadKind, ProtocolError, ProtocolErrorCode};
use super::wire_format::FrameletType;
use crate::error::Result;

/// One typed, length-tagged byte segment within a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framelet {
    type_code: u16,
    contents: Bytes,
}

impl Framelet {
    /// Create a framelet of a known type.
    pub fn new(kind: FrameletType, contents: Bytes) -> Self {
        Self {
            type_code: kind.code(),
            contents,
        }
    }

    /// Create a framelet from a raw wire code (possibly unknown).
    pub fn from_code(type_code: u16, contents: Bytes) -> Self {
        Self {
            type_code,
            contents,
        }
    }

    /// The raw two-byte type code.
    #[inline]
    pub fn type_code(&self) -> u16 {
        self.type_code
    }

    /// Typed view of the code; `None` for unknown codes.
    #[inline]
    pub fn kind(&self) -> Option<FrameletType> {
        FrameletType::from_code(self.type_code)
    }

    /// The framelet contents.
    #[inline]
    pub fn contents(&self) -> &Bytes {
        &self.contents
    }

    /// A cheap zero-copy clone of the contents.
    #[inline]
    pub fn contents_bytes(&self) -> Bytes {
        self.contents.clone()
    }
}

/// An ordered, nonempty sequence of framelets traveling as one wire unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    framelets: Vec<Framelet>,
}

impl Frame {
    /// Build a frame from raw framelets.
    ///
    /// Used by the inbound codec and by tests that need illegal shapes; the
    /// outbound path goes through the builders below.
    pub fn from_framelets(framelets: Vec<Framelet>) -> Self {
        Self { framelets }
    }

    /// Number of framelets.
    #[inline]
    pub fn count(&self) -> usize {
        self.framelets.len()
    }

    /// True when the frame carries no framelets at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.framelets.is_empty()
    }

    /// The framelet at `index`, if present.
    #[inline]
    pub fn framelet(&self, index: usize) -> Option<&Framelet> {
        self.framelets.get(index)
    }

    /// All framelets in wire order.
    #[inline]
    pub fn framelets(&self) -> &[Framelet] {
        &self.framelets
    }
}

/// Build a message frame: `Headers`, then optional `LayerData`, then
/// `PayloadData`. No other message shape is legal on the wire.
pub fn build_message_frame(
    headers: &Headers,
    layer_data: Option<Bytes>,
    payload: Bytes,
) -> Result<Frame> {
    let mut framelets = Vec::with_capacity(2 + usize::from(layer_data.is_some()));
    framelets.push(Framelet::new(
        FrameletType::Headers,
        Bytes::from(headers.encode()?),
    ));
    if let Some(layer) = layer_data {
        framelets.push(Framelet::new(FrameletType::LayerData, layer));
    }
    framelets.push(Framelet::new(FrameletType::PayloadData, payload));
    Ok(Frame::from_framelets(framelets))
}

/// Convenience builder used by the request/response/event send paths.
pub fn build_frame(
    request_id: u32,
    method_name: &str,
    kind: PayloadKind,
    payload: Bytes,
    layer_data: Option<Bytes>,
) -> Result<Frame> {
    let headers = Headers::new(request_id, kind, method_name, 0);
    build_message_frame(&headers, layer_data, payload)
}

/// Build a config frame: a single `Config` framelet.
pub fn build_config_frame() -> Result<Frame> {
    let record = ConfigRecord::default();
    Ok(Frame::from_framelets(vec![Framelet::new(
        FrameletType::Config,
        Bytes::from(record.encode()?),
    )]))
}

/// Build an error frame: a single `ProtocolError` framelet.
pub fn build_protocol_error_frame(code: ProtocolErrorCode) -> Result<Frame> {
    let record = ProtocolError::new(code);
    Ok(Frame::from_framelets(vec![Framelet::new(
        FrameletType::ProtocolError,
        Bytes::from(record.encode()?),
    )]))
}
