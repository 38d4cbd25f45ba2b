//! Error types for KoalaDB core.

use koaladb_codec::CodecError;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in KoalaDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A collection file could not be decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The database root does not exist and creation was disabled.
    #[error("database not found at {path}")]
    DatabaseNotFound {
        /// Root path that was opened.
        path: String,
    },

    /// Collection not found.
    #[error("collection not found: {name}")]
    CollectionNotFound {
        /// Name of the collection.
        name: String,
    },

    /// Document not found.
    #[error("document {id} not found in collection {collection}")]
    DocumentNotFound {
        /// The collection searched.
        collection: String,
        /// The document ID that was not found.
        id: String,
    },

    /// A document exists but lacks the requested field.
    #[error("field {field} not found in document {id}")]
    FieldNotFound {
        /// The document ID.
        id: String,
        /// The missing field name.
        field: String,
    },

    /// A single-result query matched nothing.
    #[error("no document in collection {collection} matches the filter")]
    NoMatch {
        /// The collection searched.
        collection: String,
    },

    /// A collection name collides with a reserved path segment.
    #[error("collection name conflicts with a reserved name: {name}")]
    NameConflict {
        /// The rejected name.
        name: String,
    },

    /// A predicate, field mapping, name or path was malformed.
    #[error("validation error: {message}")]
    Validation {
        /// Description of what was rejected.
        message: String,
    },

    /// A collection file decoded but has the wrong shape or version.
    #[error("invalid collection file: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },
}

/// Coarse classification of [`CoreError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown database, collection, document or field.
    NotFound,
    /// Collection name collides with a reserved name.
    NameConflict,
    /// File-system failure.
    Io,
    /// Malformed input from the caller.
    Validation,
    /// Persisted data could not be read back.
    Corrupted,
}

impl CoreError {
    /// Creates a document not found error.
    pub fn document_not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::DocumentNotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::Codec(_) | Self::InvalidFormat { .. } => ErrorKind::Corrupted,
            Self::DatabaseNotFound { .. }
            | Self::CollectionNotFound { .. }
            | Self::DocumentNotFound { .. }
            | Self::FieldNotFound { .. }
            | Self::NoMatch { .. } => ErrorKind::NotFound,
            Self::NameConflict { .. } => ErrorKind::NameConflict,
            Self::Validation { .. } => ErrorKind::Validation,
        }
    }

    /// Returns true for every not-found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(
            CoreError::document_not_found("users", "abc").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CoreError::NameConflict {
                name: "store".into()
            }
            .kind(),
            ErrorKind::NameConflict
        );
        assert_eq!(CoreError::validation("bad").kind(), ErrorKind::Validation);
        assert_eq!(
            CoreError::from(io::Error::other("disk")).kind(),
            ErrorKind::Io
        );
        assert_eq!(
            CoreError::from(CodecError::UnexpectedEof).kind(),
            ErrorKind::Corrupted
        );
    }

    #[test]
    fn display_names_the_document() {
        let err = CoreError::document_not_found("users", "abc");
        assert_eq!(
            err.to_string(),
            "document abc not found in collection users"
        );
        assert!(err.is_not_found());
    }
}
