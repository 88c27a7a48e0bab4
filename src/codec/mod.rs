//! Codec module - structured-record serialization.
//!
//! Frames carry small structured records (headers, config, protocol errors)
//! next to opaque payload blobs. Records are encoded with [`RecordCodec`];
//! payloads pass through untouched as `Bytes`.

mod record;

pub use record::RecordCodec;
