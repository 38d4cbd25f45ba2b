//! Schemaless documents.
//!
//! A [`Document`] is a sorted map of field name to [`Value`]. Two fields are
//! reserved and written only by the collection store:
//!
//! - [`CREATED_AT`]: epoch seconds at creation, never changed afterwards
//! - [`UPDATED_AT`]: epoch seconds of the last mutation, never below
//!   `CREATED_AT` and never decreasing

mod id;
mod map;

pub use id::DocumentId;
pub use map::DocumentMap;

use crate::error::{CoreError, CoreResult};
use koaladb_codec::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Creation timestamp field.
pub const CREATED_AT: &str = "_created_at";

/// Last-update timestamp field.
pub const UPDATED_AT: &str = "_updated_at";

/// Fields managed by the collection store.
pub const RESERVED_FIELDS: [&str; 2] = [CREATED_AT, UPDATED_AT];

/// Returns true if `field` is written only by the store.
#[must_use]
pub fn is_reserved(field: &str) -> bool {
    RESERVED_FIELDS.contains(&field)
}

/// A single schemaless document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    fields: BTreeMap<String, Value>,
}

impl Document {
    /// Creates an empty document with no timestamps.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty document stamped at `now`.
    pub(crate) fn stamped(now: f64) -> Self {
        let mut doc = Self::new();
        doc.fields.insert(CREATED_AT.to_string(), Value::Float(now));
        doc.fields.insert(UPDATED_AT.to_string(), Value::Float(now));
        doc
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns true if the field is present.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Returns all fields.
    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Iterates over fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields, including timestamps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the document has no fields at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Numeric value of a field, if it holds a number.
    #[must_use]
    pub fn timestamp(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_number)
    }

    /// The creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> Option<f64> {
        self.timestamp(CREATED_AT)
    }

    /// The last-update timestamp.
    #[must_use]
    pub fn updated_at(&self) -> Option<f64> {
        self.timestamp(UPDATED_AT)
    }

    /// Sets a user field. Reserved names are rejected by the callers.
    ///
    /// Nested maps are stored in canonical order, as they are on disk.
    pub(crate) fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value.into_canonical());
    }

    /// Merges caller fields, skipping reserved ones.
    ///
    /// Returns the number of distinct fields written.
    pub(crate) fn merge(&mut self, fields: Vec<(String, Value)>) -> usize {
        let mut written = BTreeSet::new();
        for (name, value) in fields {
            if is_reserved(&name) {
                warn!(field = %name, "ignoring write to reserved field");
                continue;
            }
            self.fields.insert(name.clone(), value.into_canonical());
            written.insert(name);
        }
        written.len()
    }

    /// Refreshes `_updated_at`.
    ///
    /// The new value is never below the previous update time or the creation
    /// time, even if the clock stepped backwards.
    pub(crate) fn touch(&mut self, now: f64) {
        let floor = self
            .updated_at()
            .into_iter()
            .chain(self.created_at())
            .fold(f64::NEG_INFINITY, f64::max);
        self.fields
            .insert(UPDATED_AT.to_string(), Value::Float(now.max(floor)));
    }

    /// Media references held by this document.
    ///
    /// A reference is a string starting with `prefix`, either as a top-level
    /// field or directly inside a top-level array.
    #[must_use]
    pub fn media_references(&self, prefix: &str) -> Vec<&str> {
        let mut refs = Vec::new();
        for value in self.fields.values() {
            match value {
                Value::Text(s) if s.starts_with(prefix) => refs.push(s.as_str()),
                Value::Array(items) => refs.extend(
                    items
                        .iter()
                        .filter_map(Value::as_text)
                        .filter(|s| s.starts_with(prefix)),
                ),
                _ => {}
            }
        }
        refs
    }

    /// Converts this document to a map value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::text_map(self.fields.iter().map(|(k, v)| (k.clone(), v.clone())))
    }

    /// Builds a document from a map value.
    ///
    /// Field values are put in canonical form. A repeated field name keeps
    /// its last value.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `value` is not a map with text keys.
    pub fn from_value(value: Value) -> CoreResult<Self> {
        Ok(Self {
            fields: parse_fields(value)?.into_iter().collect(),
        })
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a String, &'a Value);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Splits a map value into `(field, value)` pairs, with each value in
/// canonical form.
///
/// # Errors
///
/// Returns a validation error if `value` is not a map, or if any key is not
/// a non-empty string.
pub fn parse_fields(value: Value) -> CoreResult<Vec<(String, Value)>> {
    let pairs = match value {
        Value::Map(pairs) => pairs,
        other => {
            return Err(CoreError::validation(format!(
                "field mapping must be a map, got {}",
                other.type_name()
            )))
        }
    };
    pairs
        .into_iter()
        .map(|(key, value)| match key {
            Value::Text(name) if !name.is_empty() => Ok((name, value.into_canonical())),
            Value::Text(_) => Err(CoreError::validation("field name must not be empty")),
            other => Err(CoreError::validation(format!(
                "field name must be text, got {}",
                other.type_name()
            ))),
        })
        .collect()
}

/// Converts caller-supplied pairs, rejecting empty field names.
pub(crate) fn collect_fields<I, K, V>(fields: I) -> CoreResult<Vec<(String, Value)>>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    fields
        .into_iter()
        .map(|(k, v)| {
            let name = k.into();
            if name.is_empty() {
                return Err(CoreError::validation("field name must not be empty"));
            }
            Ok((name, v.into()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamped_document_has_equal_timestamps() {
        let doc = Document::stamped(10.0);
        assert_eq!(doc.created_at(), Some(10.0));
        assert_eq!(doc.updated_at(), Some(10.0));
    }

    #[test]
    fn merge_skips_reserved_fields() {
        let mut doc = Document::stamped(10.0);
        let written = doc.merge(vec![
            ("name".into(), Value::from("Alice")),
            (CREATED_AT.into(), Value::Float(0.0)),
            (UPDATED_AT.into(), Value::Float(0.0)),
        ]);
        assert_eq!(written, 1);
        assert_eq!(doc.created_at(), Some(10.0));
        assert_eq!(doc.updated_at(), Some(10.0));
        assert_eq!(doc.get("name"), Some(&Value::from("Alice")));
    }

    #[test]
    fn touch_never_moves_backwards() {
        let mut doc = Document::stamped(10.0);
        doc.touch(20.0);
        assert_eq!(doc.updated_at(), Some(20.0));
        doc.touch(5.0);
        assert_eq!(doc.updated_at(), Some(20.0));
        assert_eq!(doc.created_at(), Some(10.0));
    }

    #[test]
    fn media_references_cover_fields_and_arrays() {
        let mut doc = Document::stamped(1.0);
        doc.set("avatar", Value::from("store/a.png"));
        doc.set("name", Value::from("storefront"));
        doc.set(
            "gallery",
            Value::Array(vec![
                Value::from("store/b.jpg"),
                Value::Integer(3),
                Value::from("elsewhere/c.jpg"),
            ]),
        );

        let mut refs = doc.media_references("store/");
        refs.sort_unstable();
        assert_eq!(refs, vec!["store/a.png", "store/b.jpg"]);
    }

    #[test]
    fn value_conversion_keeps_fields() {
        let mut doc = Document::stamped(3.5);
        doc.set("tags", Value::Array(vec![Value::from("a")]));
        let back = Document::from_value(doc.to_value()).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn nested_maps_are_stored_canonically() {
        let address = Value::Map(vec![
            (Value::from("city"), Value::from("Paris")),
            (Value::from("zip"), Value::Integer(75_001)),
        ]);
        let mut doc = Document::stamped(1.0);
        doc.set("address", address.clone());
        let stored = doc.get("address").unwrap();
        assert_ne!(stored, &address);
        assert_eq!(
            stored,
            &Value::text_map([("city", Value::from("Paris")), ("zip", Value::Integer(75_001))])
        );

        let written = doc.merge(vec![
            ("tags".into(), Value::Array(vec![Value::text_map([("b", 1), ("a", 2)])])),
            ("tags".into(), Value::Array(vec![Value::Map(vec![
                (Value::from("k"), Value::Integer(1)),
                (Value::from("k"), Value::Integer(2)),
            ])])),
        ]);
        assert_eq!(written, 1);
        assert_eq!(
            doc.get("tags"),
            Some(&Value::Array(vec![Value::text_map([("k", 2)])]))
        );
    }

    #[test]
    fn parse_fields_rejects_malformed_mappings() {
        assert!(parse_fields(Value::Integer(1)).is_err());
        assert!(parse_fields(Value::Map(vec![(Value::Integer(1), Value::Null)])).is_err());
        assert!(parse_fields(Value::text_map([("", 1)])).is_err());
        assert_eq!(
            parse_fields(Value::text_map([("age", 30)])).unwrap(),
            vec![("age".to_string(), Value::Integer(30))]
        );
    }

    #[test]
    fn collect_fields_rejects_empty_names() {
        assert!(collect_fields([("", 1)]).is_err());
        assert_eq!(collect_fields([("a", 1)]).unwrap().len(), 1);
    }
}
