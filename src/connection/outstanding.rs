//! Outstanding-request table.
//!
//! Maps request IDs to the oneshot completion handles of waiting callers.
//! Entries live from send until response receipt, cancellation, or
//! connection teardown; whichever comes first takes the entry out of the
//! table, so a late response finds nothing and is dropped.

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::oneshot;

use crate::error::{FramewireError, Result};

/// A completed response: the application error code from the headers plus
/// the opaque response payload.
#[derive(Debug)]
pub struct ResponseOutcome {
    pub error_code: i32,
    pub payload: Bytes,
}

type Completion = oneshot::Sender<Result<ResponseOutcome>>;

/// Concurrent table of requests awaiting responses.
#[derive(Debug, Default)]
pub struct OutstandingRequests {
    entries: DashMap<u32, Completion>,
}

impl OutstandingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `request_id` and return its receiving half.
    pub fn register(&self, request_id: u32) -> oneshot::Receiver<Result<ResponseOutcome>> {
        let (tx, rx) = oneshot::channel();
        self.entries.insert(request_id, tx);
        rx
    }

    /// Complete the waiter for `request_id`.
    ///
    /// Returns `false` when no entry exists - a duplicate, late, or unknown
    /// response, which the dispatcher drops.
    pub fn complete(&self, request_id: u32, outcome: Result<ResponseOutcome>) -> bool {
        match self.entries.remove(&request_id) {
            Some((_, tx)) => {
                // A waiter that already gave up dropped its receiver; the
                // send failing then is equivalent to a late response.
                tx.send(outcome).is_ok()
            }
            None => false,
        }
    }

    /// Remove the waiter for `request_id` without completing it.
    ///
    /// Used by the cancellation path, which already owns the failure to
    /// hand to the caller.
    pub fn forget(&self, request_id: u32) -> bool {
        self.entries.remove(&request_id).is_some()
    }

    /// Fail every outstanding entry with a connection-closed error.
    pub fn drain_closed(&self) {
        let ids: Vec<u32> = self.entries.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, tx)) = self.entries.remove(&id) {
                let _ = tx.send(Err(FramewireError::ConnectionClosed));
            }
        }
    }

    /// Number of requests still waiting.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
