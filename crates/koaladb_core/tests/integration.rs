//! End-to-end tests over a real database directory.

use koaladb_codec::Value;
use koaladb_core::clock::{SECS_PER_DAY, SECS_PER_HOUR};
use koaladb_core::{
    Config, CoreError, Database, DocumentId, Filter, ManualClock, SortOrder, CREATED_AT,
};
use proptest::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// 2024-01-01T00:00:00Z
const T0: f64 = 1_704_067_200.0;

/// A database in a temporary directory with a pinned clock.
struct TestDatabase {
    db: Database,
    clock: Arc<ManualClock>,
    temp_dir: TempDir,
}

impl TestDatabase {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let clock = Arc::new(ManualClock::new(T0));
        let db = Self::open_at(&temp_dir, &clock);
        Self { db, clock, temp_dir }
    }

    fn open_at(temp_dir: &TempDir, clock: &Arc<ManualClock>) -> Database {
        let config = Config::default().sync_on_save(false).clock(clock.clone());
        Database::open_with_config(temp_dir.path().join("KoalaDB"), config)
            .expect("Failed to open database")
    }

    /// Opens a second, independent handle on the same directory.
    fn reopen(&self) -> Database {
        Self::open_at(&self.temp_dir, &self.clock)
    }

    fn source_file(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, content).expect("Failed to write source file");
        path
    }
}

impl Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Database {
        &self.db
    }
}

fn add_student(db: &Database, name: &str, age: i64) -> DocumentId {
    let students = db.create_collection("Student").unwrap();
    let handle = students.create().unwrap();
    handle
        .add([("name", Value::from(name)), ("age", Value::Integer(age))])
        .unwrap();
    handle.into_id()
}

#[test]
fn timestamps_on_create_and_update() {
    let db = TestDatabase::new();
    let students = db.create_collection("Student").unwrap();

    let id = students.create().unwrap().into_id();
    let doc = students.get(&id).unwrap();
    assert_eq!(doc.created_at(), doc.updated_at());

    db.clock.advance(5.0);
    students.update(&id, [("age", 26)]).unwrap();
    let updated = students.get(&id).unwrap();
    assert_eq!(updated.created_at(), doc.created_at());
    assert!(updated.updated_at().unwrap() >= doc.updated_at().unwrap());
    assert_eq!(updated.updated_at(), Some(T0 + 5.0));
}

#[test]
fn nested_maps_read_back_equal_after_reopen() {
    let db = TestDatabase::new();
    let students = db.create_collection("Student").unwrap();
    let id = students.create().unwrap().into_id();
    let address = Value::Map(vec![
        (Value::from("street"), Value::from("Rue de Rivoli")),
        (Value::from("zip"), Value::from("75001")),
        (Value::from("city"), Value::from("Paris")),
        (Value::from("zip"), Value::from("75004")),
    ]);
    students.add(&id, [("address", address)]).unwrap();
    let in_memory = students.get(&id).unwrap();

    let reopened = db.reopen();
    let on_disk = reopened.collection("Student").unwrap().get(&id).unwrap();
    assert_eq!(on_disk, in_memory);
    assert_eq!(
        on_disk.get("address").and_then(|a| a.get("zip")),
        Some(&Value::from("75004"))
    );
}

#[test]
fn distinct_ids() {
    let db = TestDatabase::new();
    let notes = db.create_collection("notes").unwrap();

    let ids: HashSet<DocumentId> = (0..200)
        .map(|_| notes.create().unwrap().into_id())
        .collect();
    assert_eq!(ids.len(), 200);
    assert_eq!(notes.len().unwrap(), 200);
}

#[test]
fn documents_survive_reopen() {
    let db = TestDatabase::new();
    let alice = add_student(&db, "Alice", 25);
    let bob = add_student(&db, "Bob", 30);
    let students = db.collection("Student").unwrap();
    students
        .add(
            &bob,
            [
                ("scores", Value::Array(vec![Value::Float(9.5), Value::Integer(7)])),
                ("address", Value::text_map([("city", "Paris")])),
                ("active", Value::Bool(true)),
                ("nickname", Value::Null),
            ],
        )
        .unwrap();
    let before = students.find_all().unwrap();

    let reopened = db.reopen();
    let after = reopened.collection("Student").unwrap().find_all().unwrap();
    assert_eq!(after, before);
    assert_eq!(after.ids().cloned().collect::<Vec<_>>(), vec![alice, bob]);
}

#[test]
fn delete_cascades_media() {
    let db = TestDatabase::new();
    let students = db.create_collection("Student").unwrap();
    let alice = students.create().unwrap();
    let photo = alice
        .add_media_file(db.source_file("alice.jpg", b"Alice profile image"), "photo")
        .unwrap();
    let resume = alice
        .add_media_file(db.source_file("alice.pdf", b"Alice resume"), "resume")
        .unwrap();
    let root = db.path().to_path_buf();
    assert_eq!(fs::read(root.join(&photo)).unwrap(), b"Alice profile image");
    assert!(root.join(&resume).is_file());

    let id = alice.into_id();
    let report = students.delete(&id).unwrap();
    assert_eq!(report.removed.len(), 2);
    assert!(!root.join(&photo).exists());
    assert!(!root.join(&resume).exists());

    assert!(matches!(
        students.delete(&id),
        Err(CoreError::DocumentNotFound { .. })
    ));
}

#[test]
fn overwritten_media_field_keeps_old_file() {
    let db = TestDatabase::new();
    let students = db.create_collection("Student").unwrap();
    let alice = students.create().unwrap();
    let first = alice
        .add_media_file(db.source_file("v1.png", b"1"), "photo")
        .unwrap();
    let second = alice
        .add_media_file(db.source_file("v2.png", b"2"), "photo")
        .unwrap();

    assert_eq!(
        alice.get().unwrap().get("photo"),
        Some(&Value::Text(second.clone()))
    );
    assert!(db.path().join(&first).exists());

    alice.delete().unwrap();
    assert!(db.path().join(&first).exists());
    assert!(!db.path().join(&second).exists());
}

#[test]
fn queries_on_alice_and_bob() {
    let db = TestDatabase::new();
    let alice = add_student(&db, "Alice", 25);
    let bob = add_student(&db, "Bob", 30);
    let students = db.collection("Student").unwrap();

    let found = students.find(&Filter::new().eq("name", "Alice")).unwrap();
    assert_eq!(found.len(), 1);
    assert!(found.contains(&alice));

    let (first, doc) = students.find_one(&Filter::new().gt("age", 26)).unwrap();
    assert_eq!(first, bob);
    assert_eq!(doc.get("name"), Some(&Value::from("Bob")));

    assert_eq!(students.count(&Filter::new()).unwrap(), 2);
    students.delete(&alice).unwrap();
    assert_eq!(students.count(&Filter::new()).unwrap(), 1);
    assert_eq!(students.count(&Filter::new().eq("name", "Alice")).unwrap(), 0);
}

#[test]
fn filter_from_value() {
    let db = TestDatabase::new();
    add_student(&db, "Alice", 25);
    add_student(&db, "Bob", 30);
    add_student(&db, "Carol", 41);
    let students = db.collection("Student").unwrap();

    let query = Value::text_map([
        ("age", Value::text_map([("$gte", Value::Integer(26))])),
        (
            "name",
            Value::text_map([("$nin", Value::Array(vec![Value::from("Carol")]))]),
        ),
    ]);
    let found = students.find(&Filter::from_value(&query).unwrap()).unwrap();
    let names: Vec<_> = found
        .iter()
        .filter_map(|(_, doc)| doc.get("name").and_then(Value::as_text))
        .collect();
    assert_eq!(names, vec!["Bob"]);
}

#[test]
fn recency_windows() {
    let db = TestDatabase::new();
    let logs = db.create_collection("logs").unwrap();

    let old = logs.create().unwrap().into_id();
    db.clock.advance(40.0 * SECS_PER_DAY);
    let fresh = logs.create().unwrap().into_id();

    let recent = logs.find_recent(1.0).unwrap();
    assert!(recent.contains(&fresh));
    assert!(!recent.contains(&old));

    let older = logs.find_older_than(1.0).unwrap();
    assert!(!older.contains(&fresh));
    assert!(logs.find_older_than(30.0).unwrap().contains(&old));

    db.clock.advance(SECS_PER_HOUR / 2.0);
    assert!(logs.find_recent(1.0).unwrap().contains(&fresh));

    let report = logs.cleanup_older_than(30.0).unwrap();
    assert_eq!(report.deleted, vec![old]);
    assert_eq!(logs.ids().unwrap(), vec![fresh]);
}

#[test]
fn create_collection_twice_keeps_documents() {
    let db = TestDatabase::new();
    let id = add_student(&db, "Alice", 25);

    let reopened = db.reopen();
    let students = reopened.create_collection("Student").unwrap();
    assert_eq!(students.ids().unwrap(), vec![id]);
    assert_eq!(reopened.list_collections().unwrap(), vec!["Student"]);
}

#[test]
fn media_reference_layout() {
    let db = TestDatabase::new();
    let students = db.create_collection("Student").unwrap();
    let handle = students.create().unwrap();
    let gallery = handle
        .add_media_files(
            [db.source_file("a.gif", b"a"), db.source_file("b.gif", b"b")],
            "gallery",
        )
        .unwrap();

    for reference in &gallery {
        assert!(db.media().is_reference(reference));
        assert_eq!(
            db.media().url(reference, "/media"),
            format!("/media/{reference}")
        );
    }
    assert_eq!(
        handle.get().unwrap().get("gallery"),
        Some(&Value::from(gallery.clone()))
    );
}

#[test]
fn sorted_by_created_at_matches_insertion_order() {
    let db = TestDatabase::new();
    let mut ids = Vec::new();
    for name in ["A", "B", "C"] {
        ids.push(add_student(&db, name, 20));
        db.clock.advance(1.0);
    }
    let students = db.collection("Student").unwrap();

    let ascending: Vec<_> = students
        .sorted(CREATED_AT, SortOrder::Ascending)
        .unwrap()
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    assert_eq!(ascending, ids);

    let descending: Vec<_> = students
        .sorted(CREATED_AT, SortOrder::Descending)
        .unwrap()
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    ids.reverse();
    assert_eq!(descending, ids);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn count_equals_live_documents(ops in proptest::collection::vec(any::<bool>(), 1..40)) {
        let db = TestDatabase::new();
        let coll = db.create_collection("ops").unwrap();
        let mut live: Vec<DocumentId> = Vec::new();

        for create in ops {
            if create || live.is_empty() {
                live.push(coll.create().unwrap().into_id());
            } else {
                let id = live.remove(0);
                coll.delete(&id).unwrap();
            }
        }

        prop_assert_eq!(coll.count(&Filter::new()).unwrap(), live.len());
        prop_assert_eq!(coll.ids().unwrap(), live);
    }
}
