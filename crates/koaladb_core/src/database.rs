//! Database root.

use crate::collection::Collection;
use crate::config::Config;
use crate::dir::DatabaseDir;
use crate::document::DocumentMap;
use crate::error::{CoreError, CoreResult};
use crate::media::MediaStore;
use crate::persist;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// The main database handle.
///
/// `Database` owns a root directory holding one sub-directory per collection
/// and a shared media directory:
///
/// ```rust,ignore
/// use koaladb_core::Database;
///
/// // Creates ./KoalaDB and ./KoalaDB/store if needed
/// let db = Database::initialize("KoalaDB")?;
///
/// let students = db.create_collection("Student")?;
/// let alice = students.create()?;
/// alice.add([("name", "Alice")])?;
///
/// // Later, from anywhere holding the handle
/// let students = db.collection("Student")?;
/// ```
///
/// Collection handles are cached: every call for the same name returns the
/// same [`Arc<Collection>`], so callers in one process share one state.
pub struct Database {
    /// Configuration.
    config: Config,
    /// On-disk layout.
    dir: DatabaseDir,
    /// Shared media store.
    media: MediaStore,
    /// Collection handles opened so far.
    collections: RwLock<HashMap<String, Arc<Collection>>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.dir.path())
            .field("open_collections", &self.collections.read().len())
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Opens a database at `path` with default configuration, creating the
    /// root and media directories if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns `Io` if `path` exists as a non-directory or cannot be created.
    pub fn initialize(path: impl AsRef<Path>) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens a database with custom configuration.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use koaladb_core::{Config, Database};
    ///
    /// let config = Config::default()
    ///     .create_if_missing(false)
    ///     .sync_on_save(false);
    ///
    /// let db = Database::open_with_config("KoalaDB", config)?;
    /// ```
    ///
    /// # Errors
    ///
    /// - `DatabaseNotFound` if the root is missing and creation is disabled
    /// - `Validation` if the configured media or data file name is invalid
    /// - `Io` on file-system failure
    pub fn open_with_config(path: impl AsRef<Path>, config: Config) -> CoreResult<Self> {
        let path = path.as_ref();
        let dir = DatabaseDir::open(
            path,
            config.create_if_missing,
            &config.media_dir,
            &config.data_file,
        )?;
        let media = MediaStore::new(dir.path(), dir.media_dir_name());
        info!(path = %path.display(), "opened database");

        Ok(Self {
            config,
            dir,
            media,
            collections: RwLock::new(HashMap::new()),
        })
    }

    /// Root directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The shared media store.
    #[must_use]
    pub fn media(&self) -> &MediaStore {
        &self.media
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registers a collection, creating its directory and an empty data file.
    ///
    /// Calling this for an existing collection is harmless: its documents
    /// are kept and the cached handle is returned.
    ///
    /// # Errors
    ///
    /// - `NameConflict` if `name` is the media directory's name
    /// - `Validation` if `name` is not a plain directory name
    /// - `Io` if the directory or file cannot be created
    pub fn create_collection(&self, name: &str) -> CoreResult<Arc<Collection>> {
        self.dir.validate_collection_name(name)?;

        let mut collections = self.collections.write();
        if let Some(existing) = collections.get(name) {
            return Ok(Arc::clone(existing));
        }

        let data_path = self.dir.data_path(name);
        if data_path.is_file() {
            debug!(collection = name, "collection already exists");
        } else {
            std::fs::create_dir_all(self.dir.collection_dir(name))?;
            persist::save(&data_path, &DocumentMap::new(), self.config.sync_on_save)?;
            info!(collection = name, "created collection");
        }

        let collection = Arc::new(self.open_handle(name));
        collections.insert(name.to_string(), Arc::clone(&collection));
        Ok(collection)
    }

    /// Returns an existing collection. Its documents load on first use.
    ///
    /// # Errors
    ///
    /// - `CollectionNotFound` if it was never created
    /// - `NameConflict` / `Validation` for an invalid name
    pub fn collection(&self, name: &str) -> CoreResult<Arc<Collection>> {
        self.dir.validate_collection_name(name)?;

        if let Some(existing) = self.collections.read().get(name) {
            return Ok(Arc::clone(existing));
        }

        if !self.dir.data_path(name).is_file() {
            return Err(CoreError::CollectionNotFound {
                name: name.to_string(),
            });
        }

        let mut collections = self.collections.write();
        let collection = collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(self.open_handle(name)));
        Ok(Arc::clone(collection))
    }

    /// Returns true if the collection has been created.
    #[must_use]
    pub fn has_collection(&self, name: &str) -> bool {
        self.dir.validate_collection_name(name).is_ok()
            && (self.collections.read().contains_key(name) || self.dir.data_path(name).is_file())
    }

    /// Names of all collections on disk, sorted.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the root cannot be listed.
    pub fn list_collections(&self) -> CoreResult<Vec<String>> {
        self.dir.collection_names()
    }

    fn open_handle(&self, name: &str) -> Collection {
        Collection::new(
            name,
            self.dir.data_path(name),
            self.media.clone(),
            Arc::clone(&self.config.clock),
            self.config.sync_on_save,
        )
    }
}
