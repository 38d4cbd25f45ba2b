//! Collection file encoding.
//!
//! A collection file holds one canonical CBOR map:
//!
//! ```text
//! {
//!   "documents": [[id, {field: value, ...}], ...],
//!   "version": 1
//! }
//! ```
//!
//! Documents are stored as an array of `[id, fields]` pairs rather than a
//! map because canonical maps sort their keys, and collection order must
//! survive a save/load cycle.

use crate::dir::write_atomic;
use crate::document::{Document, DocumentId, DocumentMap};
use crate::error::{CoreError, CoreResult};
use koaladb_codec::{encode_into, from_cbor, Value};
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

/// Current collection file version.
pub const FORMAT_VERSION: i64 = 1;

const VERSION_KEY: &str = "version";
const DOCUMENTS_KEY: &str = "documents";

/// Loads a collection file.
///
/// A missing or empty file decodes to an empty mapping.
pub fn load(path: &Path) -> CoreResult<DocumentMap> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(DocumentMap::new()),
        Err(err) => return Err(err.into()),
    };
    if data.is_empty() {
        return Ok(DocumentMap::new());
    }
    let docs = decode(&data)?;
    debug!(path = %path.display(), documents = docs.len(), "loaded collection file");
    Ok(docs)
}

/// Encodes `docs` and atomically replaces the file at `path`.
pub fn save(path: &Path, docs: &DocumentMap, sync: bool) -> CoreResult<()> {
    let data = encode(docs)?;
    write_atomic(path, &data, sync)?;
    debug!(path = %path.display(), documents = docs.len(), bytes = data.len(), "saved collection file");
    Ok(())
}

/// Encodes a document mapping to collection file bytes.
pub fn encode(docs: &DocumentMap) -> CoreResult<Vec<u8>> {
    let entries = docs
        .iter()
        .map(|(id, doc)| Value::Array(vec![Value::Text(id.to_string()), doc.to_value()]))
        .collect();
    let root = Value::text_map([
        (DOCUMENTS_KEY, Value::Array(entries)),
        (VERSION_KEY, Value::Integer(FORMAT_VERSION)),
    ]);

    let mut out = Vec::with_capacity(64 * docs.len().max(1));
    encode_into(&mut out, &root)?;
    Ok(out)
}

/// Decodes collection file bytes.
pub fn decode(data: &[u8]) -> CoreResult<DocumentMap> {
    let root = from_cbor(data)?;

    match root.get(VERSION_KEY).and_then(Value::as_integer) {
        Some(FORMAT_VERSION) => {}
        Some(other) => {
            return Err(CoreError::invalid_format(format!(
                "unsupported collection file version {other}"
            )))
        }
        None => return Err(CoreError::invalid_format("missing version")),
    }

    let entries = root
        .get(DOCUMENTS_KEY)
        .and_then(Value::as_array)
        .ok_or_else(|| CoreError::invalid_format("missing documents array"))?;

    let mut docs = DocumentMap::new();
    for (index, entry) in entries.iter().enumerate() {
        let (id, fields) = match entry.as_array() {
            Some([Value::Text(id), fields @ Value::Map(_)]) => (id, fields),
            _ => {
                return Err(CoreError::invalid_format(format!(
                    "document entry {index} is not an [id, fields] pair"
                )))
            }
        };
        let doc = Document::from_value(fields.clone()).map_err(|err| {
            CoreError::invalid_format(format!("document {id}: {err}"))
        })?;
        if docs.insert(DocumentId::from(id.as_str()), doc).is_some() {
            return Err(CoreError::invalid_format(format!("duplicate document id {id}")));
        }
    }
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use koaladb_codec::to_canonical_cbor;
    use tempfile::tempdir;

    fn sample() -> DocumentMap {
        let mut docs = DocumentMap::new();
        let mut alice = Document::stamped(1_700_000_000.5);
        alice.set("name", Value::from("Alice"));
        alice.set("age", Value::Integer(25));
        alice.set("photo", Value::from("store/1234.jpg"));
        let mut bob = Document::stamped(1_700_000_100.25);
        bob.set("name", Value::from("Bob"));
        bob.set("scores", Value::Array(vec![Value::Float(9.5), Value::Null]));
        bob.set("address", Value::text_map([("city", "Paris")]));
        // Inserted so that ID order differs from insertion order
        docs.insert("zzz".into(), alice);
        docs.insert("aaa".into(), bob);
        docs
    }

    #[test]
    fn save_then_load_reproduces_mapping() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("data.cbor");
        let docs = sample();

        save(&path, &docs, true).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded, docs);
        let order: Vec<_> = loaded.ids().map(|id| id.as_str()).collect();
        assert_eq!(order, vec!["zzz", "aaa"]);
    }

    #[test]
    fn hand_built_maps_reload_equal() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("data.cbor");
        let mut doc = Document::stamped(1_700_000_000.0);
        doc.set(
            "address",
            Value::Map(vec![
                (Value::from("city"), Value::from("Paris")),
                (Value::from("zip"), Value::from("75001")),
                (Value::from("city"), Value::from("Lyon")),
            ]),
        );
        let mut docs = DocumentMap::new();
        docs.insert("u1".into(), doc);

        save(&path, &docs, false).unwrap();
        assert_eq!(load(&path).unwrap(), docs);
    }

    #[test]
    fn failed_encode_leaves_file_intact() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("data.cbor");
        save(&path, &sample(), false).unwrap();
        let before = fs::read(&path).unwrap();

        let mut docs = sample();
        docs.insert("nan".into(), {
            let mut doc = Document::stamped(1.0);
            doc.set("score", Value::Float(f64::NAN));
            doc
        });
        assert!(matches!(save(&path, &docs, false), Err(CoreError::Codec(_))));
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn missing_or_empty_file_is_empty_mapping() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("data.cbor");
        assert!(load(&path).unwrap().is_empty());

        fs::write(&path, b"").unwrap();
        assert!(load(&path).unwrap().is_empty());
    }

    #[test]
    fn encoding_is_stable() {
        assert_eq!(encode(&sample()).unwrap(), encode(&sample()).unwrap());
    }

    #[test]
    fn rejects_garbage() {
        let err = decode(&[0xff, 0x00]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupted);
    }

    #[test]
    fn rejects_unknown_version() {
        let bytes = to_canonical_cbor(&Value::text_map([
            (DOCUMENTS_KEY, Value::Array(vec![])),
            (VERSION_KEY, Value::Integer(99)),
        ]))
        .unwrap();
        assert!(matches!(decode(&bytes), Err(CoreError::InvalidFormat { .. })));
    }

    #[test]
    fn rejects_malformed_entries() {
        let bytes = to_canonical_cbor(&Value::text_map([
            (
                DOCUMENTS_KEY,
                Value::Array(vec![Value::Array(vec![Value::Integer(1)])]),
            ),
            (VERSION_KEY, Value::Integer(FORMAT_VERSION)),
        ]))
        .unwrap();
        assert!(matches!(decode(&bytes), Err(CoreError::InvalidFormat { .. })));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let entry = Value::Array(vec![Value::from("dup"), Value::Map(vec![])]);
        let bytes = to_canonical_cbor(&Value::text_map([
            (DOCUMENTS_KEY, Value::Array(vec![entry.clone(), entry])),
            (VERSION_KEY, Value::Integer(FORMAT_VERSION)),
        ]))
        .unwrap();
        assert!(matches!(decode(&bytes), Err(CoreError::InvalidFormat { .. })));
    }
}
