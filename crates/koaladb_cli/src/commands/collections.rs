//! Database and collection commands.

use super::{open, print_json, CommandResult};
use koaladb_core::Database;
use serde::Serialize;
use std::path::Path;

/// One line of `collections` output.
#[derive(Debug, Serialize)]
pub struct CollectionInfo {
    /// Collection name.
    pub name: String,
    /// Number of documents.
    pub documents: usize,
}

/// Runs the init command.
pub fn init(path: &Path) -> CommandResult {
    let db = Database::initialize(path)?;
    println!("Initialized KoalaDB at {}", db.path().display());
    Ok(())
}

/// Runs the create-collection command.
pub fn create(path: &Path, name: &str) -> CommandResult {
    let db = open(path)?;
    let collection = db.create_collection(name)?;
    println!(
        "Collection {} ready ({} documents)",
        collection.name(),
        collection.len()?
    );
    Ok(())
}

/// Lists every collection with its document count.
pub fn list(db: &Database) -> CommandResult<Vec<CollectionInfo>> {
    db.list_collections()?
        .into_iter()
        .map(|name| -> CommandResult<CollectionInfo> {
            let documents = db.collection(&name)?.len()?;
            Ok(CollectionInfo { name, documents })
        })
        .collect()
}

/// Runs the collections command.
pub fn run_list(path: &Path, format: &str) -> CommandResult {
    let infos = list(&open(path)?)?;
    match format {
        "json" => print_json(&infos)?,
        _ => {
            if infos.is_empty() {
                println!("No collections");
            }
            for info in &infos {
                println!("{:<24} {:>8} documents", info.name, info.documents);
            }
        }
    }
    Ok(())
}
