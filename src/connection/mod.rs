//! Connection lifecycle, correlation, and the receive loop.
//!
//! A [`Connection`] owns one peer link end to end: it splits the stream,
//! hands the write half to the writer task, spawns the receive loop that
//! feeds bytes through the frame buffer and classifier into the dispatcher,
//! and tracks outstanding requests so responses find their waiters.
//!
//! # Example
//!
//! ```ignore
//! let (client, server) = framewire::transport::loopback_pair().await?;
//! server.register_service(Arc::new(
//!     MethodTable::new("echo").handle("Echo", |s: String| async move { Ok(s) }),
//! ));
//!
//! let payload = RecordCodec::encode(&"hello")?;
//! let reply = client
//!     .request_response("Echo", Bytes::from(payload), CancellationToken::new())
//!     .await?;
//! ```

mod dispatcher;
mod outstanding;
mod request_id;

pub use outstanding::ResponseOutcome;
pub use request_id::{ConnectionSide, RequestIdAllocator};

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::error::{FramewireError, Result};
use crate::protocol::{
    build_config_frame, build_frame, classify, FrameBuffer, PayloadKind, ProtocolVariant,
};
use crate::service::{Service, ServiceRegistry};
use crate::writer::{spawn_writer_task, OutboundFrame, WriterConfig, WriterHandle};

use dispatcher::Dispatcher;
use outstanding::OutstandingRequests;

/// Tunables for one connection.
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfig {
    /// Writer task configuration.
    pub writer: WriterConfig,
    /// Maximum framelet contents size accepted from the peer; `None` keeps
    /// the frame-buffer default.
    pub max_framelet_size: Option<u32>,
}

struct Inner {
    side: ConnectionSide,
    variant: ProtocolVariant,
    allocator: RequestIdAllocator,
    outstanding: Arc<OutstandingRequests>,
    registry: Arc<ServiceRegistry>,
    writer: WriterHandle,
    cancel: CancellationToken,
    done: CancellationToken,
    peer_error: Arc<Mutex<Option<i32>>>,
}

/// One peer link: request multiplexing, service dispatch, lifecycle.
///
/// Cheaply cloneable; all clones share the same link.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Start a connection over a byte stream.
    ///
    /// Splits the stream, spawns the writer task and the receive loop, and
    /// (on the full variant) sends the configuration handshake frame.
    pub async fn start<S>(stream: S, side: ConnectionSide, variant: ProtocolVariant) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::start_with_config(stream, side, variant, ConnectionConfig::default()).await
    }

    /// Start a connection with explicit tunables.
    pub async fn start_with_config<S>(
        stream: S,
        side: ConnectionSide,
        variant: ProtocolVariant,
        config: ConnectionConfig,
    ) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, write_half) = tokio::io::split(stream);
        let (writer, _writer_task) = spawn_writer_task(write_half, config.writer.clone());

        let inner = Arc::new(Inner {
            side,
            variant,
            allocator: RequestIdAllocator::new(side),
            outstanding: Arc::new(OutstandingRequests::new()),
            registry: Arc::new(ServiceRegistry::new()),
            writer: writer.clone(),
            cancel: CancellationToken::new(),
            done: CancellationToken::new(),
            peer_error: Arc::new(Mutex::new(None)),
        });

        if variant == ProtocolVariant::Full {
            let config_frame = build_config_frame()?;
            writer.send(OutboundFrame::encode(&config_frame)).await?;
        }

        let dispatcher = Dispatcher::new(
            inner.registry.clone(),
            inner.outstanding.clone(),
            writer,
            inner.cancel.clone(),
            inner.peer_error.clone(),
        );

        let frame_buffer = match config.max_framelet_size {
            Some(max) => FrameBuffer::with_max_framelet(max),
            None => FrameBuffer::new(),
        };

        tokio::spawn(receive_loop(
            reader,
            variant,
            frame_buffer,
            dispatcher,
            inner.outstanding.clone(),
            inner.cancel.clone(),
            inner.done.clone(),
        ));

        Ok(Self { inner })
    }

    /// Which side of the link this connection is.
    pub fn side(&self) -> ConnectionSide {
        self.inner.side
    }

    /// Which protocol variant this connection speaks.
    pub fn variant(&self) -> ProtocolVariant {
        self.inner.variant
    }

    /// Send a request and wait for its response.
    ///
    /// `cancel` aborts the wait: the outstanding entry is taken out of the
    /// table with a cancellation failure and any late response is dropped.
    ///
    /// A response whose headers carry a nonzero `error_code` surfaces as
    /// [`FramewireError::Application`] with the response payload as detail.
    pub async fn request_response(
        &self,
        method: &str,
        payload: Bytes,
        cancel: CancellationToken,
    ) -> Result<Bytes> {
        self.request_response_with_layer(method, payload, None, cancel)
            .await
    }

    /// As [`request_response`](Self::request_response), with optional
    /// layer data (full variant only).
    pub async fn request_response_with_layer(
        &self,
        method: &str,
        payload: Bytes,
        layer_data: Option<Bytes>,
        cancel: CancellationToken,
    ) -> Result<Bytes> {
        if layer_data.is_some() && self.inner.variant == ProtocolVariant::Lean {
            return Err(FramewireError::Protocol(
                "layer data requires the full protocol variant".to_string(),
            ));
        }

        let request_id = self.inner.allocator.allocate()?;
        let rx = self.inner.outstanding.register(request_id);

        let frame = build_frame(request_id, method, PayloadKind::Request, payload, layer_data)?;
        if let Err(e) = self.inner.writer.send(OutboundFrame::encode(&frame)).await {
            self.inner.outstanding.forget(request_id);
            return Err(e);
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                self.inner.outstanding.forget(request_id);
                Err(FramewireError::Cancelled)
            }
            outcome = rx => {
                let outcome = outcome.map_err(|_| FramewireError::ConnectionClosed)??;
                if outcome.error_code != 0 {
                    Err(FramewireError::Application {
                        code: outcome.error_code,
                        detail: outcome.payload,
                    })
                } else {
                    Ok(outcome.payload)
                }
            }
        }
    }

    /// Emit a fire-and-forget event (full variant only).
    pub async fn emit(&self, method: &str, payload: Bytes) -> Result<()> {
        if self.inner.variant == ProtocolVariant::Lean {
            return Err(FramewireError::Protocol(
                "event delivery requires the full protocol variant".to_string(),
            ));
        }
        let request_id = self.inner.allocator.allocate()?;
        let frame = build_frame(request_id, method, PayloadKind::Event, payload, None)?;
        self.inner.writer.send(OutboundFrame::encode(&frame)).await
    }

    /// Make a service's methods and event sinks dispatchable on this
    /// connection.
    pub fn register_service(&self, service: Arc<dyn Service>) {
        self.inner.registry.register(service);
    }

    /// Remove every method owned by the named service.
    pub fn deregister_service(&self, service_name: &str) {
        self.inner.registry.deregister(service_name);
    }

    /// Signal the receive loop to stop and return immediately.
    ///
    /// Pending requests are drained with a connection-closed failure once
    /// the loop exits; await [`closed`](Self::closed) to observe that.
    pub fn stop(&self) {
        self.inner.cancel.cancel();
    }

    /// Wait until the receive loop has fully shut down.
    pub async fn closed(&self) {
        self.inner.done.cancelled().await;
    }

    /// The protocol error the peer reported, if it hung up on us.
    pub fn peer_error(&self) -> Option<FramewireError> {
        self.inner
            .peer_error
            .lock()
            .expect("peer error lock")
            .map(FramewireError::PeerProtocolError)
    }
}

/// Per-connection receive loop: bytes, frames, classification, dispatch.
async fn receive_loop<R>(
    mut reader: R,
    variant: ProtocolVariant,
    mut frame_buffer: FrameBuffer,
    dispatcher: Dispatcher,
    outstanding: Arc<OutstandingRequests>,
    cancel: CancellationToken,
    done: CancellationToken,
) where
    R: AsyncRead + Send + Unpin + 'static,
{
    let mut buf = vec![0u8; 64 * 1024];

    'outer: loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => break 'outer,
            read = reader.read(&mut buf) => read,
        };

        let n = match read {
            Ok(0) => break 'outer,
            Ok(n) => n,
            Err(e) => {
                tracing::error!("read error: {e}");
                break 'outer;
            }
        };

        let frames = match frame_buffer.push(&buf[..n]) {
            Ok(frames) => frames,
            Err(e) => {
                // The byte stream is desynchronized; nothing after this
                // point can be trusted.
                tracing::warn!("unrecoverable inbound framing error: {e}");
                break 'outer;
            }
        };

        for frame in frames {
            let result = classify(Some(&frame), variant);
            dispatcher.dispatch(result).await;
            if cancel.is_cancelled() {
                break 'outer;
            }
        }
    }

    cancel.cancel();
    outstanding.drain_closed();
    done.cancel();
    tracing::debug!("receive loop stopped");
}
