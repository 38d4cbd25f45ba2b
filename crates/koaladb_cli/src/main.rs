//! KoalaDB CLI
//!
//! Command-line viewer and editor for KoalaDB databases.
//!
//! # Commands
//!
//! - `init` - Create the database root and media directory
//! - `create-collection` - Register a collection
//! - `collections` - List collections with document counts
//! - `list` - Show documents, optionally filtered by `field=value`
//! - `get` - Show one document
//! - `update` - Set fields of one document
//! - `count` - Count documents

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// KoalaDB command-line tools.
#[derive(Parser)]
#[command(name = "koaladb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database directory
    #[arg(global = true, short, long, default_value = "KoalaDB")]
    path: PathBuf,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(global = true, short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database directory layout
    Init,

    /// Register a collection (keeps existing documents)
    CreateCollection {
        /// Collection name
        name: String,
    },

    /// List collections
    Collections,

    /// Show documents of a collection
    List {
        /// Collection name
        collection: String,

        /// Only documents where field equals value (repeatable)
        #[arg(short = 'w', long = "where", value_name = "FIELD=VALUE")]
        conditions: Vec<String>,
    },

    /// Show one document
    Get {
        /// Collection name
        collection: String,

        /// Document ID
        id: String,
    },

    /// Set fields of a document; values are parsed as JSON when valid
    Update {
        /// Collection name
        collection: String,

        /// Document ID
        id: String,

        /// Assignments
        #[arg(required = true, value_name = "FIELD=VALUE")]
        assignments: Vec<String>,
    },

    /// Count documents of a collection
    Count {
        /// Collection name
        collection: String,

        /// Only documents where field equals value (repeatable)
        #[arg(short = 'w', long = "where", value_name = "FIELD=VALUE")]
        conditions: Vec<String>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let path = cli.path.as_path();
    let format = cli.format.as_str();
    match &cli.command {
        Commands::Init => commands::collections::init(path)?,
        Commands::CreateCollection { name } => commands::collections::create(path, name)?,
        Commands::Collections => commands::collections::run_list(path, format)?,
        Commands::List {
            collection,
            conditions,
        } => commands::documents::run_list(path, collection, conditions, format)?,
        Commands::Get { collection, id } => {
            commands::documents::run_get(path, collection, id, format)?;
        }
        Commands::Update {
            collection,
            id,
            assignments,
        } => commands::documents::run_update(path, collection, id, assignments)?,
        Commands::Count {
            collection,
            conditions,
        } => commands::documents::run_count(path, collection, conditions, format)?,
        Commands::Version => {
            println!("KoalaDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("KoalaDB Core v{}", koaladb_core::VERSION);
        }
    }

    Ok(())
}
