//! Dedicated writer task for the outbound send path.
//!
//! Outbound frames from any task funnel through an mpsc channel into one
//! writer task per connection, which owns the write half of the transport.
//! That gives the required one-in-flight-write-at-a-time discipline without
//! a mutex, and lets bursts of frames coalesce into single vectored writes.
//!
//! ```text
//! request_response ─┐
//! service responses ─┼─► bounded queue ─► writer task ─► stream
//! protocol errors  ─┘
//! ```
//!
//! Backpressure is the queue itself: the channel holds at most
//! `queue_depth` frames, a sender blocked on a full queue waits at most
//! `enqueue_timeout`, and a slow transport therefore pushes back on
//! producers instead of growing an unbounded buffer.

use std::io::IoSlice;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{FramewireError, Result};
use crate::protocol::{encode_frame, Frame};

/// Default number of frames the outbound queue will hold.
pub const DEFAULT_QUEUE_DEPTH: usize = 256;

/// Default time a sender may wait on a full queue.
pub const DEFAULT_ENQUEUE_TIMEOUT: Duration = Duration::from_secs(3);

/// Most frames drained from the queue into a single vectored write.
const MAX_WRITE_BURST: usize = 32;

/// An encoded frame queued for the writer task.
#[derive(Debug)]
pub struct OutboundFrame {
    bytes: Bytes,
}

impl OutboundFrame {
    /// Encode a frame for sending.
    pub fn encode(frame: &Frame) -> Self {
        Self {
            bytes: encode_frame(frame),
        }
    }

    /// Total wire size of this frame.
    #[inline]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Frames the queue holds before senders start waiting.
    pub queue_depth: usize,
    /// How long a sender may wait on a full queue before giving up.
    pub enqueue_timeout: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_QUEUE_DEPTH,
            enqueue_timeout: DEFAULT_ENQUEUE_TIMEOUT,
        }
    }
}

/// Handle for queueing frames to the writer task.
///
/// Cheaply cloneable; shared by the request path, the dispatcher, and the
/// protocol-error path.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
    enqueue_timeout: Duration,
}

impl WriterHandle {
    /// Queue a frame, waiting for space up to the configured timeout.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        match tokio::time::timeout(self.enqueue_timeout, self.tx.send(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(FramewireError::ConnectionClosed),
            Err(_) => Err(FramewireError::BackpressureTimeout),
        }
    }

    /// True while the queue is full and senders would have to wait.
    #[inline]
    pub fn is_backpressure_active(&self) -> bool {
        self.tx.capacity() == 0
    }

    /// Frames currently sitting in the queue (not counting one the writer
    /// task may already be flushing).
    #[inline]
    pub fn queued_frames(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

/// Spawn the writer task and return a handle for queueing frames.
pub fn spawn_writer_task<W>(
    writer: W,
    config: WriterConfig,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.queue_depth);
    let handle = WriterHandle {
        tx,
        enqueue_timeout: config.enqueue_timeout,
    };
    let task = tokio::spawn(writer_loop(rx, writer));
    (handle, task)
}

/// Spawn the writer task with default configuration.
pub fn spawn_writer_task_default<W>(writer: W) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    spawn_writer_task(writer, WriterConfig::default())
}

/// Main writer loop - drains bursts of frames and writes them out.
async fn writer_loop<W>(mut rx: mpsc::Receiver<OutboundFrame>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut batch = Vec::with_capacity(MAX_WRITE_BURST);
    loop {
        batch.clear();
        if rx.recv_many(&mut batch, MAX_WRITE_BURST).await == 0 {
            // Queue closed and drained, clean shutdown.
            return Ok(());
        }
        write_batch(&mut writer, &batch).await?;
    }
}

/// Write a batch of frames with vectored writes, resuming after partial
/// writes, then flush.
async fn write_batch<W>(writer: &mut W, batch: &[OutboundFrame]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    // Cursor into the batch: everything before `index` is on the wire,
    // plus `offset` bytes of `batch[index]`.
    let mut index = 0usize;
    let mut offset = 0usize;

    while index < batch.len() {
        let mut slices: Vec<IoSlice<'_>> = Vec::with_capacity(batch.len() - index);
        slices.push(IoSlice::new(&batch[index].bytes[offset..]));
        for frame in &batch[index + 1..] {
            slices.push(IoSlice::new(&frame.bytes));
        }

        let mut written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(FramewireError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }

        while index < batch.len() {
            let remaining = batch[index].bytes.len() - offset;
            if written < remaining {
                offset += written;
                break;
            }
            written -= remaining;
            offset = 0;
            index += 1;
        }
    }

    writer.flush().await?;
    Ok(())
}
