//! Insertion-ordered document mapping.

use super::{Document, DocumentId};
use std::collections::HashMap;

/// Mapping of document ID to document that remembers insertion order.
///
/// Iteration, [`first`](Self::first) and query results follow the order in
/// which documents were created; the order survives a save/load cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentMap {
    order: Vec<DocumentId>,
    docs: HashMap<DocumentId, Document>,
}

impl DocumentMap {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if there are no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns true if `id` is present.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.docs.contains_key(id)
    }

    /// Returns a document by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Document> {
        self.docs.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Document> {
        self.docs.get_mut(id)
    }

    /// Inserts a document, appending new IDs at the end.
    ///
    /// Replacing an existing ID keeps its position. Returns the previous
    /// document, if any.
    pub fn insert(&mut self, id: DocumentId, doc: Document) -> Option<Document> {
        if !self.docs.contains_key(id.as_str()) {
            self.order.push(id.clone());
        }
        self.docs.insert(id, doc)
    }

    /// Removes a document by ID.
    pub fn remove(&mut self, id: &str) -> Option<Document> {
        let doc = self.docs.remove(id)?;
        self.order.retain(|existing| existing.as_str() != id);
        Some(doc)
    }

    /// The first document in insertion order.
    #[must_use]
    pub fn first(&self) -> Option<(&DocumentId, &Document)> {
        self.iter().next()
    }

    /// IDs in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &DocumentId> {
        self.order.iter()
    }

    /// Documents in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&DocumentId, &Document)> {
        self.order
            .iter()
            .filter_map(move |id| self.docs.get(id).map(|doc| (id, doc)))
    }
}

impl IntoIterator for DocumentMap {
    type Item = (DocumentId, Document);
    type IntoIter = std::vec::IntoIter<(DocumentId, Document)>;

    fn into_iter(mut self) -> Self::IntoIter {
        self.order
            .into_iter()
            .filter_map(|id| self.docs.remove(&id).map(|doc| (id, doc)))
            .collect::<Vec<_>>()
            .into_iter()
    }
}

impl FromIterator<(DocumentId, Document)> for DocumentMap {
    fn from_iter<T: IntoIterator<Item = (DocumentId, Document)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (id, doc) in iter {
            map.insert(id, doc);
        }
        map
    }
}
