//! Structured-record codec using `rmp-serde`.
//!
//! Records are encoded with `to_vec_named` so fields travel as a map keyed
//! by name rather than positionally. That is what makes the records
//! self-describing: a decoder built against schema version 1 keeps working
//! when a peer appends fields.
//!
//! # Example
//!
//! ```
//! use framewire::codec::RecordCodec;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Record {
//!     id: u32,
//!     name: String,
//! }
//!
//! let rec = Record { id: 42, name: "hello".to_string() };
//! let encoded = RecordCodec::encode(&rec).unwrap();
//! let decoded: Record = RecordCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, rec);
//! ```

use crate::error::Result;

/// MessagePack codec for structured records.
///
/// Uses `rmp_serde::to_vec_named` so structs are serialized as maps
/// (with field names) rather than arrays (positional).
pub struct RecordCodec;

impl RecordCodec {
    /// Encode a record to bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode bytes into a record.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
