//! Database configuration.

use crate::clock::{Clock, SystemClock};
use std::sync::Arc;

/// Default name of the shared media directory under the database root.
pub const DEFAULT_MEDIA_DIR: &str = "store";

/// Default name of each collection's data file.
pub const DEFAULT_DATA_FILE: &str = "data.cbor";

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the database root if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to fsync collection files and their directory on every save.
    pub sync_on_save: bool,

    /// Name of the media directory (also the prefix of media references).
    pub media_dir: String,

    /// File name of each collection's data file.
    pub data_file: String,

    /// Time source for document timestamps.
    pub clock: Arc<dyn Clock>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_save: true,
            media_dir: DEFAULT_MEDIA_DIR.to_string(),
            data_file: DEFAULT_DATA_FILE.to_string(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to fsync on every save.
    #[must_use]
    pub fn sync_on_save(mut self, value: bool) -> Self {
        self.sync_on_save = value;
        self
    }

    /// Sets the media directory name.
    #[must_use]
    pub fn media_dir(mut self, name: impl Into<String>) -> Self {
        self.media_dir = name.into();
        self
    }

    /// Sets the collection data file name.
    #[must_use]
    pub fn data_file(mut self, name: impl Into<String>) -> Self {
        self.data_file = name.into();
        self
    }

    /// Sets the time source.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
