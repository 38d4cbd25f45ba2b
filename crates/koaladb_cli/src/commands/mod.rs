//! CLI command implementations.

pub mod collections;
pub mod documents;
pub mod value;

use koaladb_core::{Config, Database};
use std::path::Path;
use tracing::debug;

/// Result type shared by all commands.
pub type CommandResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Opens an existing database; commands other than `init` never create one.
pub fn open(path: &Path) -> CommandResult<Database> {
    debug!(path = %path.display(), "opening database");
    let config = Config::default().create_if_missing(false);
    Ok(Database::open_with_config(path, config)?)
}

/// Prints `output` as pretty JSON.
pub fn print_json<T: serde::Serialize>(output: &T) -> CommandResult {
    println!("{}", serde_json::to_string_pretty(output)?);
    Ok(())
}
