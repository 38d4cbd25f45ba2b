//! Benchmark utilities.

use koaladb_codec::Value;
use koaladb_core::{Collection, Config, Database, DocumentId};
use rand::Rng;
use std::sync::Arc;
use tempfile::TempDir;

const CITIES: [&str; 4] = ["Paris", "Lyon", "Nice", "Lille"];

/// Generate the fields of a random student document.
pub fn random_fields(index: usize) -> Vec<(String, Value)> {
    let mut rng = rand::thread_rng();
    vec![
        ("name".to_string(), Value::Text(format!("student-{index}"))),
        ("age".to_string(), Value::Integer(rng.gen_range(18..65))),
        (
            "city".to_string(),
            Value::from(CITIES[rng.gen_range(0..CITIES.len())]),
        ),
        ("score".to_string(), Value::Float(rng.gen_range(0.0..20.0))),
    ]
}

/// A database in a temporary directory. fsync is disabled.
pub fn temp_database() -> (TempDir, Database) {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let config = Config::default().sync_on_save(false);
    let db = Database::open_with_config(temp.path(), config).expect("Failed to open database");
    (temp, db)
}

/// Create a collection holding `count` random student documents.
pub fn populated_collection(db: &Database, name: &str, count: usize) -> Arc<Collection> {
    let collection = db.create_collection(name).expect("Failed to create collection");
    let ids: Vec<DocumentId> = (0..count)
        .map(|_| collection.create().expect("Failed to create document").into_id())
        .collect();
    for (index, id) in ids.iter().enumerate() {
        collection
            .add(id, random_fields(index))
            .expect("Failed to add fields");
    }
    collection
}
