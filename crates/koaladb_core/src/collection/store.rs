use super::{DeleteReport, DocumentHandle, MediaFailure};
use crate::clock::{self, Clock, SECS_PER_DAY, SECS_PER_HOUR};
use crate::document::{self, Document, DocumentId, DocumentMap, CREATED_AT, UPDATED_AT};
use crate::error::{CoreError, CoreResult};
use crate::media::MediaStore;
use crate::persist;
use crate::query::{sort_documents, Filter, SortOrder};
use chrono::NaiveDate;
use koaladb_codec::Value;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Date key format used by [`Collection::group_by_date`].
const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// One named collection of schemaless documents.
///
/// Obtained from [`Database::create_collection`](crate::Database::create_collection)
/// or [`Database::collection`](crate::Database::collection). All methods take
/// `&self`; a mutex serializes callers within the process.
pub struct Collection {
    name: String,
    data_path: PathBuf,
    media: MediaStore,
    clock: Arc<dyn Clock>,
    sync_on_save: bool,
    /// `None` until first access.
    state: Mutex<Option<DocumentMap>>,
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("data_path", &self.data_path)
            .field("loaded", &self.state.try_lock().map(|state| state.is_some()))
            .finish_non_exhaustive()
    }
}

impl Collection {
    pub(crate) fn new(
        name: impl Into<String>,
        data_path: PathBuf,
        media: MediaStore,
        clock: Arc<dyn Clock>,
        sync_on_save: bool,
    ) -> Self {
        Self {
            name: name.into(),
            data_path,
            media,
            clock,
            sync_on_save,
            state: Mutex::new(None),
        }
    }

    /// The collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the collection file.
    #[must_use]
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// The shared media store.
    #[must_use]
    pub fn media(&self) -> &MediaStore {
        &self.media
    }

    /// Current time according to the collection's clock.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    // ------------------------------------------------------------------
    // State access
    // ------------------------------------------------------------------

    fn loaded<'a>(
        slot: &'a mut Option<DocumentMap>,
        path: &Path,
    ) -> CoreResult<&'a mut DocumentMap> {
        let docs = match slot.take() {
            Some(docs) => docs,
            None => persist::load(path)?,
        };
        Ok(slot.insert(docs))
    }

    fn read<R>(&self, f: impl FnOnce(&DocumentMap) -> R) -> CoreResult<R> {
        let mut slot = self.state.lock();
        let docs = Self::loaded(&mut slot, &self.data_path)?;
        Ok(f(docs))
    }

    /// Applies `op` to a copy of the state, saves it, then commits it.
    fn mutate<R>(
        &self,
        op: impl FnOnce(&mut DocumentMap, f64) -> CoreResult<R>,
    ) -> CoreResult<R> {
        let mut slot = self.state.lock();
        let current = Self::loaded(&mut slot, &self.data_path)?;
        let mut next = current.clone();
        let result = op(&mut next, self.clock.now())?;
        persist::save(&self.data_path, &next, self.sync_on_save)?;
        *current = next;
        Ok(result)
    }

    /// Discards in-memory state; the next call re-reads the file.
    pub fn reload(&self) {
        *self.state.lock() = None;
    }

    // ------------------------------------------------------------------
    // Create / read
    // ------------------------------------------------------------------

    /// Creates an empty document with a fresh ID and both timestamps set.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection file cannot be read or written.
    pub fn create(&self) -> CoreResult<DocumentHandle<'_>> {
        let id = self.mutate(|docs, now| {
            let mut id = DocumentId::generate();
            while docs.contains(&id) {
                id = DocumentId::generate();
            }
            docs.insert(id.clone(), Document::stamped(now));
            Ok(id)
        })?;
        debug!(collection = %self.name, id = %id, "created document");
        Ok(DocumentHandle::new(self, id))
    }

    /// Returns a handle to an existing document.
    ///
    /// # Errors
    ///
    /// Returns `DocumentNotFound` if `id` is absent.
    pub fn document(&self, id: &str) -> CoreResult<DocumentHandle<'_>> {
        if !self.read(|docs| docs.contains(id))? {
            return Err(CoreError::document_not_found(&self.name, id));
        }
        Ok(DocumentHandle::new(self, DocumentId::from(id)))
    }

    /// Returns a copy of one document.
    ///
    /// # Errors
    ///
    /// Returns `DocumentNotFound` if `id` is absent.
    pub fn get(&self, id: &str) -> CoreResult<Document> {
        self.read(|docs| docs.get(id).cloned())?
            .ok_or_else(|| CoreError::document_not_found(&self.name, id))
    }

    /// Document IDs in insertion order.
    pub fn ids(&self) -> CoreResult<Vec<DocumentId>> {
        self.read(|docs| docs.ids().cloned().collect())
    }

    /// Number of documents.
    pub fn len(&self) -> CoreResult<usize> {
        self.read(DocumentMap::len)
    }

    /// Returns true if the collection holds no documents.
    pub fn is_empty(&self) -> CoreResult<bool> {
        self.read(DocumentMap::is_empty)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Merges fields into a document and refreshes `_updated_at`.
    ///
    /// Existing fields are overwritten; reserved timestamp keys in `fields`
    /// are ignored. Nested maps are kept in canonical key order, and a key
    /// repeated within one map keeps its last value.
    ///
    /// Returns the number of distinct fields written.
    ///
    /// # Errors
    ///
    /// - `Validation` if a field name is empty
    /// - `DocumentNotFound` if `id` is absent
    pub fn add<I, K, V>(&self, id: &str, fields: I) -> CoreResult<usize>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let fields = document::collect_fields(fields)?;
        let written = self.mutate(|docs, now| {
            let doc = docs
                .get_mut(id)
                .ok_or_else(|| CoreError::document_not_found(&self.name, id))?;
            let written = doc.merge(fields);
            doc.touch(now);
            Ok(written)
        })?;
        debug!(collection = %self.name, id, fields = written, "updated document");
        Ok(written)
    }

    /// Same as [`add`](Self::add).
    ///
    /// # Errors
    ///
    /// See [`add`](Self::add).
    pub fn update<I, K, V>(&self, id: &str, fields: I) -> CoreResult<usize>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.add(id, fields)
    }

    /// Merges fields into every matching document, with one save.
    ///
    /// Returns the number of documents updated.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty field name, or a persistence error.
    pub fn update_many<I, K, V>(&self, filter: &Filter, fields: I) -> CoreResult<usize>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let fields = document::collect_fields(fields)?;
        let updated = self.mutate(|docs, now| {
            let ids: Vec<DocumentId> = docs
                .iter()
                .filter(|(_, doc)| filter.matches(doc))
                .map(|(id, _)| id.clone())
                .collect();
            for id in &ids {
                if let Some(doc) = docs.get_mut(id) {
                    doc.merge(fields.clone());
                    doc.touch(now);
                }
            }
            Ok(ids.len())
        })?;
        debug!(collection = %self.name, updated, "updated matching documents");
        Ok(updated)
    }

    /// Refreshes `_updated_at` without changing any field.
    ///
    /// # Errors
    ///
    /// Returns `DocumentNotFound` if `id` is absent.
    pub fn touch(&self, id: &str) -> CoreResult<()> {
        self.mutate(|docs, now| {
            docs.get_mut(id)
                .ok_or_else(|| CoreError::document_not_found(&self.name, id))?
                .touch(now);
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Media
    // ------------------------------------------------------------------

    /// Copies `source` into the media store and sets `field` to its reference.
    ///
    /// Returns the reference, e.g. `store/<uuid>.png`. Any file previously
    /// referenced by `field` is left in place.
    ///
    /// # Errors
    ///
    /// - `DocumentNotFound` if `id` is absent (checked before copying)
    /// - `Validation` if `field` is empty or reserved
    /// - `Io` if `source` cannot be read
    pub fn add_media_file(
        &self,
        id: &str,
        source: impl AsRef<Path>,
        field: &str,
    ) -> CoreResult<String> {
        let source = source.as_ref();
        let stored = self.attach_media(id, &[source], field, |refs| Value::from(refs.concat()))?;
        Ok(stored.concat())
    }

    /// Stores several files and sets `field` to the array of their references.
    ///
    /// # Errors
    ///
    /// See [`add_media_file`](Self::add_media_file).
    pub fn add_media_files<P: AsRef<Path>>(
        &self,
        id: &str,
        sources: impl IntoIterator<Item = P>,
        field: &str,
    ) -> CoreResult<Vec<String>> {
        let sources: Vec<P> = sources.into_iter().collect();
        let paths: Vec<&Path> = sources.iter().map(AsRef::as_ref).collect();
        self.attach_media(id, &paths, field, |refs| {
            Value::Array(refs.iter().cloned().map(Value::Text).collect())
        })
    }

    fn attach_media(
        &self,
        id: &str,
        sources: &[&Path],
        field: &str,
        to_value: impl FnOnce(&[String]) -> Value,
    ) -> CoreResult<Vec<String>> {
        if field.is_empty() || document::is_reserved(field) {
            return Err(CoreError::validation(format!(
                "invalid media field name: {field:?}"
            )));
        }
        if !self.read(|docs| docs.contains(id))? {
            return Err(CoreError::document_not_found(&self.name, id));
        }

        let mut stored = Vec::with_capacity(sources.len());
        let result = self.mutate(|docs, now| {
            for source in sources {
                stored.push(self.media.store(source, Some(field))?);
            }
            let doc = docs
                .get_mut(id)
                .ok_or_else(|| CoreError::document_not_found(&self.name, id))?;
            doc.set(field, to_value(&stored));
            doc.touch(now);
            Ok(())
        });

        match result {
            Ok(()) => {
                debug!(collection = %self.name, id, field, files = stored.len(), "attached media");
                Ok(stored)
            }
            Err(err) => {
                for reference in &stored {
                    if let Err(cleanup) = self.media.delete(reference) {
                        warn!(reference = %reference, error = %cleanup, "failed to remove unattached media file");
                    }
                }
                Err(err)
            }
        }
    }

    /// Absolute path of the file referenced by a media field.
    ///
    /// # Errors
    ///
    /// - `DocumentNotFound` if `id` is absent
    /// - `FieldNotFound` if the field is absent or not a string
    /// - `Validation` if the string is not a media reference
    pub fn media_path(&self, id: &str, field: &str) -> CoreResult<PathBuf> {
        let doc = self.get(id)?;
        let reference = doc
            .get(field)
            .and_then(Value::as_text)
            .ok_or_else(|| CoreError::FieldNotFound {
                id: id.to_string(),
                field: field.to_string(),
            })?;
        self.media.resolve(reference)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Deletes a document and every media file it references.
    ///
    /// # Errors
    ///
    /// Returns `DocumentNotFound` if `id` is absent. Media failures are
    /// reported in the returned [`DeleteReport`], not as errors.
    pub fn delete(&self, id: &str) -> CoreResult<DeleteReport> {
        let removed = self.mutate(|docs, _| {
            docs.remove(id)
                .map(|doc| vec![(DocumentId::from(id), doc)])
                .ok_or_else(|| CoreError::document_not_found(&self.name, id))
        })?;
        Ok(self.cascade(removed))
    }

    /// Deletes every matching document, with one save.
    ///
    /// # Errors
    ///
    /// Returns an error only if the collection file cannot be read or written.
    pub fn delete_many(&self, filter: &Filter) -> CoreResult<DeleteReport> {
        let removed = self.mutate(|docs, _| {
            let ids: Vec<DocumentId> = docs
                .iter()
                .filter(|(_, doc)| filter.matches(doc))
                .map(|(id, _)| id.clone())
                .collect();
            Ok(ids
                .into_iter()
                .filter_map(|id| docs.remove(&id).map(|doc| (id, doc)))
                .collect::<Vec<_>>())
        })?;
        Ok(self.cascade(removed))
    }

    /// Deletes documents created more than `days` days ago.
    ///
    /// # Errors
    ///
    /// See [`delete_many`](Self::delete_many).
    pub fn cleanup_older_than(&self, days: f64) -> CoreResult<DeleteReport> {
        let cutoff = self.clock.now() - days * SECS_PER_DAY;
        self.delete_many(&Filter::new().lt(CREATED_AT, cutoff))
    }

    fn cascade(&self, removed: Vec<(DocumentId, Document)>) -> DeleteReport {
        let prefix = self.media.prefix();
        let mut report = DeleteReport::default();
        for (id, doc) in removed {
            for reference in doc.media_references(&prefix) {
                if !self.media.is_reference(reference) {
                    continue;
                }
                match self.media.delete(reference) {
                    Ok(true) => report.removed.push(reference.to_string()),
                    Ok(false) => debug!(reference, "media file already absent"),
                    Err(err) => {
                        warn!(collection = %self.name, id = %id, reference, error = %err, "failed to delete media file");
                        report.failed.push(MediaFailure {
                            reference: reference.to_string(),
                            message: err.to_string(),
                        });
                    }
                }
            }
            report.deleted.push(id);
        }
        if !report.deleted.is_empty() {
            info!(
                collection = %self.name,
                documents = report.deleted.len(),
                media_removed = report.removed.len(),
                media_failed = report.failed.len(),
                "deleted documents"
            );
        }
        report
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Every document matching `filter`, in insertion order.
    pub fn find(&self, filter: &Filter) -> CoreResult<DocumentMap> {
        self.read(|docs| {
            docs.iter()
                .filter(|(_, doc)| filter.matches(doc))
                .map(|(id, doc)| (id.clone(), doc.clone()))
                .collect()
        })
    }

    /// Every document.
    pub fn find_all(&self) -> CoreResult<DocumentMap> {
        self.read(DocumentMap::clone)
    }

    /// The first matching document in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `NoMatch` if nothing matches.
    pub fn find_one(&self, filter: &Filter) -> CoreResult<(DocumentId, Document)> {
        self.read(|docs| {
            docs.iter()
                .find(|(_, doc)| filter.matches(doc))
                .map(|(id, doc)| (id.clone(), doc.clone()))
        })?
        .ok_or_else(|| CoreError::NoMatch {
            collection: self.name.clone(),
        })
    }

    /// Number of documents matching `filter`.
    pub fn count(&self, filter: &Filter) -> CoreResult<usize> {
        self.read(|docs| docs.iter().filter(|(_, doc)| filter.matches(doc)).count())
    }

    /// Documents created within the last `hours` hours, boundary included.
    pub fn find_recent(&self, hours: f64) -> CoreResult<DocumentMap> {
        self.find_recent_by(CREATED_AT, hours)
    }

    /// Documents whose `field` lies within the last `hours` hours.
    pub fn find_recent_by(&self, field: &str, hours: f64) -> CoreResult<DocumentMap> {
        let cutoff = self.clock.now() - hours * SECS_PER_HOUR;
        self.find(&Filter::new().gte(field, cutoff))
    }

    /// Documents created strictly more than `days` days ago.
    pub fn find_older_than(&self, days: f64) -> CoreResult<DocumentMap> {
        self.find_older_than_by(CREATED_AT, days)
    }

    /// Documents whose `field` is strictly more than `days` days old.
    pub fn find_older_than_by(&self, field: &str, days: f64) -> CoreResult<DocumentMap> {
        let cutoff = self.clock.now() - days * SECS_PER_DAY;
        self.find(&Filter::new().lt(field, cutoff))
    }

    /// Documents with `start <= field <= end`.
    pub fn find_between(&self, field: &str, start: f64, end: f64) -> CoreResult<DocumentMap> {
        self.find(&Filter::new().gte(field, start).lte(field, end))
    }

    /// Documents created between `start` and `end`, inclusive.
    pub fn find_created_between(&self, start: f64, end: f64) -> CoreResult<DocumentMap> {
        self.find_between(CREATED_AT, start, end)
    }

    /// Documents last updated between `start` and `end`, inclusive.
    pub fn find_updated_between(&self, start: f64, end: f64) -> CoreResult<DocumentMap> {
        self.find_between(UPDATED_AT, start, end)
    }

    /// Documents whose `field` falls on the UTC calendar day `date`.
    pub fn find_on_date(&self, date: NaiveDate, field: &str) -> CoreResult<DocumentMap> {
        let start = clock::start_of_date(date);
        self.find(&Filter::new().gte(field, start).lt(field, start + SECS_PER_DAY))
    }

    /// The document with the smallest numeric `field`; earliest inserted on ties.
    pub fn oldest(&self, field: &str) -> CoreResult<Option<(DocumentId, Document)>> {
        self.extreme(field, |candidate, best| candidate < best)
    }

    /// The document with the largest numeric `field`; earliest inserted on ties.
    pub fn newest(&self, field: &str) -> CoreResult<Option<(DocumentId, Document)>> {
        self.extreme(field, |candidate, best| candidate > best)
    }

    fn extreme(
        &self,
        field: &str,
        better: impl Fn(f64, f64) -> bool,
    ) -> CoreResult<Option<(DocumentId, Document)>> {
        self.read(|docs| {
            let mut best: Option<(f64, &DocumentId, &Document)> = None;
            for (id, doc) in docs.iter() {
                let Some(value) = doc.timestamp(field) else {
                    continue;
                };
                if best.map_or(true, |(current, _, _)| better(value, current)) {
                    best = Some((value, id, doc));
                }
            }
            best.map(|(_, id, doc)| (id.clone(), doc.clone()))
        })
    }

    /// Documents grouped by the UTC `YYYY-MM-DD` date of `field`.
    ///
    /// Documents without a numeric `field` are left out.
    pub fn group_by_date(&self, field: &str) -> CoreResult<BTreeMap<String, DocumentMap>> {
        self.read(|docs| {
            let mut groups: BTreeMap<String, DocumentMap> = BTreeMap::new();
            for (id, doc) in docs.iter() {
                let Some(key) = doc
                    .timestamp(field)
                    .and_then(|ts| clock::format_timestamp(ts, DATE_KEY_FORMAT))
                else {
                    continue;
                };
                groups.entry(key).or_default().insert(id.clone(), doc.clone());
            }
            groups
        })
    }

    /// Every document sorted by `field`. Documents lacking it come last.
    pub fn sorted(
        &self,
        field: &str,
        order: SortOrder,
    ) -> CoreResult<Vec<(DocumentId, Document)>> {
        let mut items: Vec<(DocumentId, Document)> = self.find_all()?.into_iter().collect();
        sort_documents(&mut items, field, order, |(_, doc)| doc);
        Ok(items)
    }
}
