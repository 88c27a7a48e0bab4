//! Per-connection request-ID allocation.
//!
//! IDs advance by +2 per allocation, with the starting point split by
//! originator: client connections allocate odd IDs (1, 3, 5, …), server
//! connections even IDs (2, 4, 6, …). The parity split keeps both sides'
//! IDs disjoint over one connection, so they can allocate concurrently
//! without coordination.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::{FramewireError, Result};

/// Which side of the connection this peer is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionSide {
    /// Initiated the connection; allocates odd request IDs.
    Client,
    /// Accepted the connection; allocates even request IDs.
    Server,
}

/// Atomic request-ID allocator.
///
/// The counter is wider than the ID space so exhaustion is detected by
/// comparison, not wraparound.
#[derive(Debug)]
pub struct RequestIdAllocator {
    next: AtomicI64,
}

impl RequestIdAllocator {
    /// Create an allocator for the given side.
    pub fn new(side: ConnectionSide) -> Self {
        let start = match side {
            ConnectionSide::Client => -1,
            ConnectionSide::Server => 0,
        };
        Self {
            next: AtomicI64::new(start),
        }
    }

    /// Allocate the next request ID.
    ///
    /// # Errors
    ///
    /// Fails once the ID space is exhausted; the connection is unusable for
    /// new requests from that point on.
    pub fn allocate(&self) -> Result<u32> {
        let id = self.next.fetch_add(2, Ordering::Relaxed) + 2;
        if id > u32::MAX as i64 {
            return Err(FramewireError::Protocol(
                "Exhausted request IDs".to_string(),
            ));
        }
        Ok(id as u32)
    }

    #[cfg(test)]
    fn with_start(start: i64) -> Self {
        Self {
            next: AtomicI64::new(start),
        }
    }
}
