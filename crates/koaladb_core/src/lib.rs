//! # KoalaDB Core
//!
//! File-based document store.
//!
//! This crate provides:
//! - Database roots holding named collections and a shared media directory
//! - Schemaless documents with managed `_created_at` / `_updated_at` fields
//! - Atomic whole-file persistence of each collection in canonical CBOR
//! - Filter queries, recency windows, date grouping and sorting
//! - Media attachments whose files are deleted with their document
//!
//! ```no_run
//! use koaladb_core::{Database, Filter};
//! use koaladb_codec::Value;
//!
//! # fn main() -> koaladb_core::CoreResult<()> {
//! let db = Database::initialize("KoalaDB")?;
//! let students = db.create_collection("Student")?;
//!
//! students
//!     .create()?
//!     .add([("name", Value::from("Alice")), ("age", Value::from(25))])?;
//!
//! let adults = students.find(&Filter::new().gte("age", 18))?;
//! assert_eq!(adults.len(), 1);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod collection;
mod config;
mod database;
pub mod dir;
pub mod document;
mod error;
pub mod media;
pub mod persist;
pub mod query;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collection::{Collection, DeleteReport, DocumentHandle, MediaFailure};
pub use config::{Config, DEFAULT_DATA_FILE, DEFAULT_MEDIA_DIR};
pub use database::Database;
pub use document::{Document, DocumentId, DocumentMap, CREATED_AT, UPDATED_AT};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use media::MediaStore;
pub use query::{Condition, Filter, SortOrder};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
