//! Codec errors.

use thiserror::Error;

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Why a value could not be encoded, or bytes could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A float is NaN, which never compares equal to itself.
    #[error("NaN cannot be stored")]
    NaNForbidden,

    /// An indefinite-length string, array or map.
    #[error("indefinite-length items are not canonical")]
    IndefiniteLength,

    /// A text string is not valid UTF-8.
    #[error("text is not valid UTF-8")]
    InvalidUtf8,

    /// The input ends in the middle of an item.
    #[error("input ends inside an item")]
    UnexpectedEof,

    /// Bytes remain after the top-level item.
    #[error("{count} bytes follow the top-level item")]
    TrailingBytes {
        /// Number of unread bytes.
        count: usize,
    },

    /// Well-formed CBOR that is not in canonical form.
    #[error("non-canonical CBOR: {message}")]
    NonCanonical {
        /// What is not canonical.
        message: String,
    },

    /// An item that cannot be stored or read, such as a map repeating a key.
    #[error("invalid CBOR structure: {message}")]
    InvalidStructure {
        /// Description of the problem.
        message: String,
    },

    /// A CBOR item with no [`Value`](crate::Value) counterpart.
    #[error("unsupported CBOR item: {what}")]
    Unsupported {
        /// The offending item.
        what: String,
    },

    /// A length exceeds [`MAX_ITEMS`](crate::MAX_ITEMS) or
    /// [`MAX_STRING_LEN`](crate::MAX_STRING_LEN).
    #[error("declared size {claimed} exceeds limit {max_allowed}")]
    SizeLimitExceeded {
        /// Declared size.
        claimed: u64,
        /// Maximum accepted size.
        max_allowed: u64,
    },

    /// Arrays and maps nest deeper than [`MAX_DEPTH`](crate::MAX_DEPTH).
    #[error("items nest deeper than {max} levels")]
    DepthExceeded {
        /// The nesting limit.
        max: usize,
    },
}

impl CodecError {
    pub(crate) fn non_canonical(message: impl Into<String>) -> Self {
        Self::NonCanonical {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(what: impl Into<String>) -> Self {
        Self::Unsupported { what: what.into() }
    }
}

