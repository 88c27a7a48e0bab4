//! # framewire
//!
//! An RPC communications runtime: request/response/event messaging between
//! peers over pluggable transports, carried by a self-describing framed
//! binary wire format.
//!
//! ## Architecture
//!
//! - **Wire format**: each frame is a count-prefixed sequence of typed byte
//!   segments (framelets); headers travel as structured records, payloads
//!   as opaque blobs.
//! - **Classifier**: a pure state machine turns every inbound frame into a
//!   disposition - deliver, complete, reject, or hang up - so the transport
//!   never acts on unvalidated bytes.
//! - **Connection**: per-peer request multiplexing with parity-split
//!   request IDs, an outstanding-request table, cancellation, and a
//!   channel-fed writer task.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use framewire::codec::RecordCodec;
//! use framewire::service::MethodTable;
//! use framewire::transport::loopback_pair;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), framewire::FramewireError> {
//!     let (client, server) = loopback_pair().await?;
//!
//!     server.register_service(Arc::new(
//!         MethodTable::new("greeter")
//!             .handle("Greet", |name: String| async move {
//!                 Ok(format!("hello, {name}"))
//!             }),
//!     ));
//!
//!     let payload = Bytes::from(RecordCodec::encode(&"world")?);
//!     let reply = client
//!         .request_response("Greet", payload, CancellationToken::new())
//!         .await?;
//!     let greeting: String = RecordCodec::decode(&reply)?;
//!     assert_eq!(greeting, "hello, world");
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod writer;

pub use connection::{Connection, ConnectionConfig, ConnectionSide};
pub use error::FramewireError;
pub use protocol::{classify, ClassifyResult, FrameDisposition, ProtocolVariant};
pub use service::{MethodError, MethodTable, Service};
