//! Collection store.
//!
//! A [`Collection`] owns one collection's documents. State is loaded from
//! the collection file on first use and written back in full after every
//! mutation. Mutations are applied to a copy first, so a failed save leaves
//! the in-memory state unchanged.

mod handle;
mod store;

pub use handle::DocumentHandle;
pub use store::Collection;

use crate::document::DocumentId;

/// A media file that could not be removed during a delete cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFailure {
    /// Media reference, e.g. `store/<uuid>.png`.
    pub reference: String,
    /// The I/O error message.
    pub message: String,
}

/// Outcome of a delete.
///
/// Document records are always removed; media failures are reported here
/// rather than aborting the delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    /// IDs of the removed documents.
    pub deleted: Vec<DocumentId>,
    /// Media references whose files were removed.
    pub removed: Vec<String>,
    /// Media references whose files could not be removed.
    pub failed: Vec<MediaFailure>,
}

impl DeleteReport {
    /// Number of removed documents.
    #[must_use]
    pub fn documents(&self) -> usize {
        self.deleted.len()
    }

    /// Returns true if every referenced media file is gone.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
