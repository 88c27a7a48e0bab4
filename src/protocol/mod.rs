//! Protocol module - wire format, framing, records, and classification.
//!
//! This module implements the binary protocol:
//! - framelet container encoding/decoding (count-prefixed typed segments)
//! - frame buffer for accumulating partial reads
//! - structured records (headers, config, protocol errors)
//! - outbound frame builders
//! - the frame classifier

mod classify;
mod frame;
mod frame_buffer;
mod headers;
mod wire_format;

pub use classify::{
    classify, ClassifyResult, ClassifyState, FrameDisposition, ProtocolVariant, MAX_TRANSITIONS,
};
pub use frame::{
    build_config_frame, build_frame, build_message_frame, build_protocol_error_frame, Frame,
    Framelet,
};
pub use frame_buffer::FrameBuffer;
pub use headers::{ConfigRecord, Headers, PayloadKind, ProtocolError, ProtocolErrorCode};
pub use wire_format::{
    decode_frame, encode_frame, FrameletType, COUNT_SIZE, DEFAULT_MAX_FRAMELET_SIZE,
    FRAMELET_HEADER_SIZE,
};
