use super::{Collection, DeleteReport};
use crate::clock::SECS_PER_DAY;
use crate::document::{Document, DocumentId, CREATED_AT};
use crate::error::{CoreError, CoreResult};
use koaladb_codec::Value;
use std::path::{Path, PathBuf};

/// A reference to one document, for chaining calls on it.
///
/// ```no_run
/// # use koaladb_core::{Database, CoreResult};
/// # use koaladb_codec::Value;
/// # fn main() -> CoreResult<()> {
/// let db = Database::initialize("KoalaDB")?;
/// let students = db.create_collection("Student")?;
/// let alice = students.create()?;
/// alice
///     .add([("name", Value::from("Alice")), ("age", Value::from(25))])?
///     .add_media_file("alice.jpg", "photo")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DocumentHandle<'a> {
    collection: &'a Collection,
    id: DocumentId,
}

impl<'a> DocumentHandle<'a> {
    pub(crate) fn new(collection: &'a Collection, id: DocumentId) -> Self {
        Self { collection, id }
    }

    /// The document ID.
    #[must_use]
    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    /// Consumes the handle, returning the ID.
    #[must_use]
    pub fn into_id(self) -> DocumentId {
        self.id
    }

    /// The owning collection.
    #[must_use]
    pub fn collection(&self) -> &'a Collection {
        self.collection
    }

    /// See [`Collection::add`].
    pub fn add<I, K, V>(&self, fields: I) -> CoreResult<&Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.collection.add(&self.id, fields)?;
        Ok(self)
    }

    /// See [`Collection::add_media_file`].
    pub fn add_media_file(&self, source: impl AsRef<Path>, field: &str) -> CoreResult<String> {
        self.collection.add_media_file(&self.id, source, field)
    }

    /// See [`Collection::add_media_files`].
    pub fn add_media_files<P: AsRef<Path>>(
        &self,
        sources: impl IntoIterator<Item = P>,
        field: &str,
    ) -> CoreResult<Vec<String>> {
        self.collection.add_media_files(&self.id, sources, field)
    }

    /// See [`Collection::touch`].
    pub fn touch(&self) -> CoreResult<&Self> {
        self.collection.touch(&self.id)?;
        Ok(self)
    }

    /// A copy of the document.
    pub fn get(&self) -> CoreResult<Document> {
        self.collection.get(&self.id)
    }

    /// See [`Collection::media_path`].
    pub fn media_path(&self, field: &str) -> CoreResult<PathBuf> {
        self.collection.media_path(&self.id, field)
    }

    /// Seconds since creation.
    pub fn age(&self) -> CoreResult<f64> {
        let created = self.get()?.created_at().ok_or_else(|| CoreError::FieldNotFound {
            id: self.id.to_string(),
            field: CREATED_AT.to_string(),
        })?;
        Ok(self.collection.now() - created)
    }

    /// Days since creation.
    pub fn age_in_days(&self) -> CoreResult<f64> {
        Ok(self.age()? / SECS_PER_DAY)
    }

    /// Deletes the document and its media.
    pub fn delete(self) -> CoreResult<DeleteReport> {
        self.collection.delete(&self.id)
    }
}
