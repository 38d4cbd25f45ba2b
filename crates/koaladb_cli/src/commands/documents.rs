//! Document viewer and editor commands.

use super::value::{document_to_json, parse_assignment};
use super::{open, print_json, CommandResult};
use koaladb_core::{Collection, Document, DocumentId, Filter};
use serde::Serialize;
use std::path::Path;

/// A document as printed by the CLI.
#[derive(Debug, Serialize)]
pub struct DocumentOutput {
    /// Document ID.
    pub id: String,
    /// Fields, including timestamps.
    pub fields: serde_json::Value,
}

impl DocumentOutput {
    fn new(id: &DocumentId, doc: &Document) -> Self {
        Self {
            id: id.to_string(),
            fields: document_to_json(doc),
        }
    }

    fn print_text(&self) {
        println!("{}", self.id);
        if let serde_json::Value::Object(fields) = &self.fields {
            for (name, value) in fields {
                println!("  {name}: {value}");
            }
        }
    }
}

/// Builds an equality filter from `field=value` arguments.
pub fn parse_filter(conditions: &[String]) -> CommandResult<Filter> {
    conditions
        .iter()
        .try_fold(Filter::new(), |filter, raw| -> CommandResult<Filter> {
            let (field, value) = parse_assignment(raw)?;
            Ok(filter.eq(field, value))
        })
}

/// Matching documents in insertion order.
pub fn list(
    collection: &Collection,
    conditions: &[String],
) -> CommandResult<Vec<DocumentOutput>> {
    let filter = parse_filter(conditions)?;
    Ok(collection
        .find(&filter)?
        .iter()
        .map(|(id, doc)| DocumentOutput::new(id, doc))
        .collect())
}

/// Applies `field=value` assignments to one document.
pub fn update(
    collection: &Collection,
    id: &str,
    assignments: &[String],
) -> CommandResult<usize> {
    let fields = assignments
        .iter()
        .map(|raw| parse_assignment(raw))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(collection.update(id, fields)?)
}

/// Runs the list command.
pub fn run_list(
    path: &Path,
    collection: &str,
    conditions: &[String],
    format: &str,
) -> CommandResult {
    let db = open(path)?;
    let docs = list(&*db.collection(collection)?, conditions)?;
    match format {
        "json" => print_json(&docs)?,
        _ => {
            for doc in &docs {
                doc.print_text();
            }
            println!("{} document(s)", docs.len());
        }
    }
    Ok(())
}

/// Runs the get command.
pub fn run_get(path: &Path, collection: &str, id: &str, format: &str) -> CommandResult {
    let db = open(path)?;
    let doc = db.collection(collection)?.get(id)?;
    let output = DocumentOutput::new(&DocumentId::from(id), &doc);
    match format {
        "json" => print_json(&output)?,
        _ => output.print_text(),
    }
    Ok(())
}

/// Runs the update command.
pub fn run_update(
    path: &Path,
    collection: &str,
    id: &str,
    assignments: &[String],
) -> CommandResult {
    let db = open(path)?;
    let count = update(&*db.collection(collection)?, id, assignments)?;
    println!("Updated {count} field(s) of {id}");
    Ok(())
}

/// Runs the count command.
pub fn run_count(
    path: &Path,
    collection: &str,
    conditions: &[String],
    format: &str,
) -> CommandResult {
    let db = open(path)?;
    let count = db.collection(collection)?.count(&parse_filter(conditions)?)?;
    match format {
        "json" => print_json(&serde_json::json!({ "count": count }))?,
        _ => println!("{count}"),
    }
    Ok(())
}
