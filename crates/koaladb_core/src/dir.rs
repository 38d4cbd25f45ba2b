//! Database directory management.
//!
//! This module handles the file system layout for KoalaDB:
//!
//! ```text
//! <db_path>/
//! ├─ store/              # Shared media files, <uuid>.<ext>
//! ├─ <collection>/
//! │  └─ data.cbor        # All documents of the collection
//! └─ <collection>/
//!    └─ data.cbor
//! ```
//!
//! Collection files are only ever replaced through [`write_atomic`], so a
//! reader sees either the previous or the new content, never a truncated file.

use crate::error::{CoreError, CoreResult};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Suffix of the temporary file written before an atomic rename.
const TEMP_SUFFIX: &str = ".tmp";

/// The on-disk layout of one database.
#[derive(Debug, Clone)]
pub struct DatabaseDir {
    /// Root directory path.
    path: PathBuf,
    /// Name of the media directory under the root.
    media_dir: String,
    /// File name of each collection's data file.
    data_file: String,
}

impl DatabaseDir {
    /// Opens or creates a database directory and its media directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - The path exists but is not a directory (`Io`)
    /// - Directories cannot be created (`Io`)
    pub fn open(
        path: &Path,
        create_if_missing: bool,
        media_dir: &str,
        data_file: &str,
    ) -> CoreResult<Self> {
        validate_segment(media_dir, "media directory")?;
        validate_segment(data_file, "data file")?;

        if !path.exists() && !create_if_missing {
            return Err(CoreError::DatabaseNotFound {
                path: path.display().to_string(),
            });
        }

        if path.exists() && !path.is_dir() {
            return Err(CoreError::Io(io::Error::other(format!(
                "database path is not a directory: {}",
                path.display()
            ))));
        }

        fs::create_dir_all(path)?;
        fs::create_dir_all(path.join(media_dir))?;

        Ok(Self {
            path: path.to_path_buf(),
            media_dir: media_dir.to_string(),
            data_file: data_file.to_string(),
        })
    }

    /// Returns the path to the database directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name of the media directory.
    #[must_use]
    pub fn media_dir_name(&self) -> &str {
        &self.media_dir
    }

    /// Returns the path to the media directory.
    #[must_use]
    pub fn media_path(&self) -> PathBuf {
        self.path.join(&self.media_dir)
    }

    /// Returns the directory of a collection.
    #[must_use]
    pub fn collection_dir(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Returns the data file of a collection.
    #[must_use]
    pub fn data_path(&self, name: &str) -> PathBuf {
        self.collection_dir(name).join(&self.data_file)
    }

    /// Checks a collection name against the layout.
    ///
    /// # Errors
    ///
    /// - `NameConflict` if the name is the media directory's
    /// - `Validation` if the name is not a single plain path segment
    pub fn validate_collection_name(&self, name: &str) -> CoreResult<()> {
        if name == self.media_dir {
            return Err(CoreError::NameConflict {
                name: name.to_string(),
            });
        }
        validate_segment(name, "collection name")
    }

    /// Names of every directory under the root holding a data file, sorted.
    pub fn collection_names(&self) -> CoreResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if self.validate_collection_name(&name).is_ok() && self.data_path(&name).is_file() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Rejects names that are empty, hidden, or not a single path segment.
fn validate_segment(name: &str, what: &str) -> CoreResult<()> {
    if name.is_empty() {
        return Err(CoreError::validation(format!("{what} must not be empty")));
    }
    if name.starts_with('.') {
        return Err(CoreError::validation(format!(
            "{what} must not start with '.': {name}"
        )));
    }
    if name.chars().any(|c| c == '/' || c == '\\' || c.is_control()) {
        return Err(CoreError::validation(format!(
            "{what} must be a single path segment: {name:?}"
        )));
    }
    Ok(())
}

/// Replaces `path` with `data` atomically.
///
/// Uses write-then-rename pattern for crash safety:
/// 1. Write to `<path>.tmp`
/// 2. Sync the temporary file to disk (if `sync`)
/// 3. Rename the temporary file over `path`
/// 4. Fsync the parent directory so the rename is durable (if `sync`)
pub fn write_atomic(path: &Path, data: &[u8], sync: bool) -> CoreResult<()> {
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(TEMP_SUFFIX);
    let temp_path = PathBuf::from(temp_name);

    let result = (|| -> io::Result<()> {
        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        if sync {
            file.sync_all()?;
        }
        drop(file);
        fs::rename(&temp_path, path)
    })();

    if let Err(err) = result {
        // The target is untouched; don't leave the partial temp file behind.
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    if sync {
        if let Some(parent) = path.parent() {
            sync_directory(parent)?;
        }
    }
    Ok(())
}

/// Syncs a directory so that renames and deletions inside it are durable.
///
/// On Windows, directory fsync is not supported in the same way as Unix;
/// NTFS journaling covers metadata durability, so this is a no-op there.
#[cfg(unix)]
pub fn sync_directory(path: &Path) -> CoreResult<()> {
    File::open(path)?.sync_all()?;
    Ok(())
}

/// Syncs a directory so that renames and deletions inside it are durable.
#[cfg(not(unix))]
pub fn sync_directory(_path: &Path) -> CoreResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    fn open(path: &Path) -> CoreResult<DatabaseDir> {
        DatabaseDir::open(path, true, "store", "data.cbor")
    }

    #[test]
    fn open_creates_root_and_media_dir() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("new_db");

        let dir = open(&db_path).unwrap();
        assert!(db_path.is_dir());
        assert!(dir.media_path().is_dir());
    }

    #[test]
    fn open_is_idempotent() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("db");
        open(&db_path).unwrap();
        fs::write(db_path.join("store").join("keep.bin"), b"x").unwrap();

        open(&db_path).unwrap();
        assert!(db_path.join("store").join("keep.bin").exists());
    }

    #[test]
    fn open_fails_if_not_exists_and_no_create() {
        let temp = tempdir().unwrap();
        let result = DatabaseDir::open(&temp.path().join("missing"), false, "store", "data.cbor");
        assert!(matches!(result, Err(CoreError::DatabaseNotFound { .. })));
    }

    #[test]
    fn open_rejects_a_file() {
        let temp = tempdir().unwrap();
        let file_path = temp.path().join("plain");
        fs::write(&file_path, b"not a dir").unwrap();

        let err = open(&file_path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn paths_are_correct() {
        let temp = tempdir().unwrap();
        let dir = open(temp.path()).unwrap();

        assert_eq!(dir.media_path(), temp.path().join("store"));
        assert_eq!(
            dir.data_path("users"),
            temp.path().join("users").join("data.cbor")
        );
    }

    #[test]
    fn collection_name_rules() {
        let temp = tempdir().unwrap();
        let dir = open(temp.path()).unwrap();

        assert!(dir.validate_collection_name("Student").is_ok());
        assert!(matches!(
            dir.validate_collection_name("store"),
            Err(CoreError::NameConflict { .. })
        ));
        for bad in ["", ".", "..", ".hidden", "a/b", "a\\b", "tab\there"] {
            assert_eq!(
                dir.validate_collection_name(bad).unwrap_err().kind(),
                ErrorKind::Validation,
                "{bad:?}"
            );
        }
    }

    #[test]
    fn collection_names_lists_only_dirs_with_data() {
        let temp = tempdir().unwrap();
        let dir = open(temp.path()).unwrap();

        for name in ["b", "a"] {
            fs::create_dir_all(dir.collection_dir(name)).unwrap();
            fs::write(dir.data_path(name), b"").unwrap();
        }
        fs::create_dir_all(dir.collection_dir("empty")).unwrap();
        fs::write(temp.path().join("loose.txt"), b"").unwrap();

        assert_eq!(dir.collection_names().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn write_atomic_replaces_content() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("data.cbor");

        write_atomic(&path, b"first", true).unwrap();
        write_atomic(&path, b"second", false).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert!(!temp.path().join("data.cbor.tmp").exists());
    }

    #[test]
    fn write_atomic_failure_keeps_previous_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("data.cbor");
        write_atomic(&path, b"kept", true).unwrap();

        // A directory squatting on the temp name makes the write fail.
        fs::create_dir(temp.path().join("data.cbor.tmp")).unwrap();
        assert!(write_atomic(&path, b"lost", true).is_err());
        assert_eq!(fs::read(&path).unwrap(), b"kept");
    }
}
