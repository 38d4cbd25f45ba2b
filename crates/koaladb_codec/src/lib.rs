//! # KoalaDB Codec
//!
//! Canonical CBOR encoding/decoding for KoalaDB collection files.
//!
//! Every collection is persisted as one CBOR item. Encoding is
//! deterministic so that identical documents produce identical bytes:
//!
//! - Maps are sorted by key (length-first, then bytewise on encoded keys)
//!   and a repeated key is an error
//! - Integers use shortest encoding
//! - Floats are always 8-byte doubles, NaN is rejected
//! - Strings must be UTF-8
//! - No indefinite-length items, tags or undefined
//!
//! The encoder and decoder share the size and nesting limits in this
//! crate, so every value that encodes also decodes.
//!
//! ## Usage
//!
//! ```
//! use koaladb_codec::{to_canonical_cbor, from_cbor, Value};
//!
//! let doc = Value::text_map([
//!     ("name", Value::from("Alice")),
//!     ("_created_at", Value::Float(1_700_000_000.25)),
//! ]);
//! let bytes = to_canonical_cbor(&doc).unwrap();
//!
//! let decoded = from_cbor(&bytes).unwrap();
//! assert_eq!(doc, decoded);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod format;
mod value;

pub use decoder::from_cbor;
pub use encoder::{encode_into, to_canonical_cbor};
pub use error::{CodecError, CodecResult};
pub use format::{MAX_DEPTH, MAX_ITEMS, MAX_STRING_LEN};
pub use value::Value;
