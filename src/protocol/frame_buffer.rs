//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management and a small state
//! machine for reassembling frames that arrive fragmented:
//! - `WaitingForCount`: need the 2-byte framelet count
//! - `WaitingForFrameletHeader`: need the next 6-byte framelet header
//! - `WaitingForContents`: framelet header parsed, need N more content bytes
//!
//! # Example
//!
//! ```ignore
//! let mut buffer = FrameBuffer::new();
//! let frames = buffer.push(&chunk_from_socket)?;
//! for frame in frames {
//!     // classify and dispatch
//! }
//! ```

use bytes::{Buf, BytesMut};

use super::frame::{Frame, Framelet};
use super::wire_format::{COUNT_SIZE, DEFAULT_MAX_FRAMELET_SIZE, FRAMELET_HEADER_SIZE};
use crate::error::{FramewireError, Result};

/// State machine for frame reassembly.
#[derive(Debug)]
enum State {
    /// Waiting for the 2-byte framelet count.
    WaitingForCount,
    /// Waiting for the next framelet's 6-byte header.
    WaitingForFrameletHeader {
        remaining: u16,
        collected: Vec<Framelet>,
    },
    /// Framelet header parsed, waiting for its contents.
    WaitingForContents {
        remaining: u16,
        collected: Vec<Framelet>,
        type_code: u16,
        length: u32,
    },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
///
/// All data is staged in a single `BytesMut`; framelet contents are split
/// off and frozen so the extracted frames share the buffer's storage.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current reassembly state.
    state: State,
    /// Maximum allowed framelet contents size.
    max_framelet_size: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings (64 KiB capacity,
    /// 1 GiB framelet cap).
    pub fn new() -> Self {
        Self::with_max_framelet(DEFAULT_MAX_FRAMELET_SIZE)
    }

    /// Create a new frame buffer with a custom framelet size cap.
    pub fn with_max_framelet(max_framelet_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::WaitingForCount,
            max_framelet_size,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Partial data is staged internally for the next push.
    ///
    /// # Errors
    ///
    /// Returns an error on a zero framelet count or a framelet whose
    /// declared length exceeds the configured cap; the connection should be
    /// torn down in that case, since the stream can no longer be trusted.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Try to advance the state machine and extract a single frame.
    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        loop {
            match std::mem::replace(&mut self.state, State::WaitingForCount) {
                State::WaitingForCount => {
                    if self.buffer.len() < COUNT_SIZE {
                        return Ok(None);
                    }
                    let count = self.buffer.get_u16_le();
                    if count == 0 {
                        return Err(FramewireError::Protocol(
                            "frame with zero framelets".to_string(),
                        ));
                    }
                    self.state = State::WaitingForFrameletHeader {
                        remaining: count,
                        collected: Vec::with_capacity(count as usize),
                    };
                }

                State::WaitingForFrameletHeader {
                    remaining,
                    collected,
                } => {
                    if self.buffer.len() < FRAMELET_HEADER_SIZE {
                        self.state = State::WaitingForFrameletHeader {
                            remaining,
                            collected,
                        };
                        return Ok(None);
                    }
                    let type_code = self.buffer.get_u16_le();
                    let length = self.buffer.get_u32_le();
                    if length > self.max_framelet_size {
                        return Err(FramewireError::Protocol(format!(
                            "framelet size {} exceeds maximum {}",
                            length, self.max_framelet_size
                        )));
                    }
                    self.state = State::WaitingForContents {
                        remaining,
                        collected,
                        type_code,
                        length,
                    };
                }

                State::WaitingForContents {
                    remaining,
                    mut collected,
                    type_code,
                    length,
                } => {
                    let needed = length as usize;
                    if self.buffer.len() < needed {
                        self.state = State::WaitingForContents {
                            remaining,
                            collected,
                            type_code,
                            length,
                        };
                        return Ok(None);
                    }
                    let contents = self.buffer.split_to(needed).freeze();
                    collected.push(Framelet::from_code(type_code, contents));

                    let remaining = remaining - 1;
                    if remaining == 0 {
                        return Ok(Some(Frame::from_framelets(collected)));
                    }
                    self.state = State::WaitingForFrameletHeader {
                        remaining,
                        collected,
                    };
                }
            }
        }
    }

    /// Number of buffered bytes not yet consumed by a complete frame.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the staging buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset reassembly state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForCount;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForCount => "WaitingForCount",
            State::WaitingForFrameletHeader { .. } => "WaitingForFrameletHeader",
            State::WaitingForContents { .. } => "WaitingForContents",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
