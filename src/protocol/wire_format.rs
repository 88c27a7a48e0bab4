//! Wire format encoding and decoding.
//!
//! A frame travels as a count-prefixed sequence of framelets:
//!
//! ```text
//! ┌───────────┬──────────────────────────────────────────┐
//! │ count     │ count × framelet                         │
//! │ 2 bytes   │                                          │
//! │ uint16 LE │                                          │
//! └───────────┴──────────────────────────────────────────┘
//!
//! framelet:
//! ┌───────────┬───────────┬───────────────┐
//! │ type      │ length    │ contents      │
//! │ 2 bytes   │ 4 bytes   │ length bytes  │
//! │ uint16 LE │ uint32 LE │               │
//! └───────────┴───────────┴───────────────┘
//! ```
//!
//! All multi-byte integers are Little Endian.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FramewireError, Result};
use crate::protocol::frame::{Frame, Framelet};

/// Size of the framelet-count prefix in bytes.
pub const COUNT_SIZE: usize = 2;

/// Size of one framelet header (type + length) in bytes.
pub const FRAMELET_HEADER_SIZE: usize = 6;

/// Default maximum framelet contents size (1 GiB).
pub const DEFAULT_MAX_FRAMELET_SIZE: u32 = 1_073_741_824;

/// Typed view of a framelet's two-byte type code.
///
/// The codes are fixed and disjoint; unknown codes survive frame decoding
/// and are rejected during classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum FrameletType {
    /// Structured header record (index 0 of a message frame).
    Headers = 0x4844,
    /// Opaque user payload blob.
    PayloadData = 0x4450,
    /// Optional per-message layer blob (index 1 when present).
    LayerData = 0x4C44,
    /// Handshake/configuration record (only framelet in a config frame).
    Config = 0x434E,
    /// Protocol error record (only framelet in an error frame).
    ProtocolError = 0x4550,
}

impl FrameletType {
    /// Map a wire code to a known framelet type.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0x4844 => Some(Self::Headers),
            0x4450 => Some(Self::PayloadData),
            0x4C44 => Some(Self::LayerData),
            0x434E => Some(Self::Config),
            0x4550 => Some(Self::ProtocolError),
            _ => None,
        }
    }

    /// The two-byte wire code for this type.
    #[inline]
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// Encode a frame into a contiguous byte buffer.
pub fn encode_frame(frame: &Frame) -> Bytes {
    let total: usize = COUNT_SIZE
        + frame
            .framelets()
            .iter()
            .map(|f| FRAMELET_HEADER_SIZE + f.contents().len())
            .sum::<usize>();

    let mut buf = BytesMut::with_capacity(total);
    buf.put_u16_le(frame.count() as u16);
    for framelet in frame.framelets() {
        buf.put_u16_le(framelet.type_code());
        buf.put_u32_le(framelet.contents().len() as u32);
        buf.put_slice(framelet.contents());
    }
    buf.freeze()
}

/// Decode a complete frame from a buffer.
///
/// Rejects a zero framelet count, a framelet whose declared length exceeds
/// the remaining buffer, and trailing bytes after the last framelet.
pub fn decode_frame(buf: &[u8]) -> Result<Frame> {
    let mut cursor = Bytes::copy_from_slice(buf);

    if cursor.remaining() < COUNT_SIZE {
        return Err(FramewireError::Protocol(
            "frame shorter than count prefix".to_string(),
        ));
    }
    let count = cursor.get_u16_le();
    if count == 0 {
        return Err(FramewireError::Protocol(
            "frame with zero framelets".to_string(),
        ));
    }

    let mut framelets = Vec::with_capacity(count as usize);
    for _ in 0..count {
        if cursor.remaining() < FRAMELET_HEADER_SIZE {
            return Err(FramewireError::Protocol(
                "truncated framelet header".to_string(),
            ));
        }
        let type_code = cursor.get_u16_le();
        let length = cursor.get_u32_le() as usize;
        if cursor.remaining() < length {
            return Err(FramewireError::Protocol(format!(
                "framelet length {} exceeds remaining buffer {}",
                length,
                cursor.remaining()
            )));
        }
        let contents = cursor.split_to(length);
        framelets.push(Framelet::from_code(type_code, contents));
    }

    if cursor.has_remaining() {
        return Err(FramewireError::Protocol(format!(
            "{} trailing bytes after last framelet",
            cursor.remaining()
        )));
    }

    Ok(Frame::from_framelets(framelets))
}
