//! Shared media store.
//!
//! Media files live in one flat directory under the database root and are
//! named `<uuid><.ext>`. Documents refer to them by a path relative to the
//! root, e.g. `store/5f0c...e1.png`.

use crate::error::{CoreError, CoreResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Copies files into, resolves, and deletes from the media directory.
#[derive(Debug, Clone)]
pub struct MediaStore {
    /// Database root; references are relative to it.
    root: PathBuf,
    /// Name of the media directory under the root.
    dir_name: String,
}

impl MediaStore {
    /// Creates a media store rooted at `root/dir_name`.
    ///
    /// The directory itself is created by the database on open.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, dir_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            dir_name: dir_name.into(),
        }
    }

    /// Absolute path of the media directory.
    #[must_use]
    pub fn dir(&self) -> PathBuf {
        self.root.join(&self.dir_name)
    }

    /// Prefix shared by every media reference, e.g. `store/`.
    #[must_use]
    pub fn prefix(&self) -> String {
        format!("{}/", self.dir_name)
    }

    /// Returns true if `value` looks like a reference into this store.
    #[must_use]
    pub fn is_reference(&self, value: &str) -> bool {
        self.file_name(value).is_some()
    }

    /// Copies `source` into the store under a fresh unique name.
    ///
    /// The source's extension is preserved. `field_hint` names the document
    /// field the file is for and is only used for logging.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the source cannot be read or the copy fails.
    pub fn store(&self, source: &Path, field_hint: Option<&str>) -> CoreResult<String> {
        if !source.is_file() {
            return Err(CoreError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("media source is not a readable file: {}", source.display()),
            )));
        }

        let mut name = Uuid::new_v4().to_string();
        if let Some(ext) = source.extension().and_then(|e| e.to_str()) {
            name.push('.');
            name.push_str(ext);
        }

        let target = self.dir().join(&name);
        let bytes = fs::copy(source, &target)?;
        let relative = format!("{}{name}", self.prefix());
        debug!(
            source = %source.display(),
            reference = %relative,
            field = field_hint.unwrap_or("-"),
            bytes,
            "stored media file"
        );
        Ok(relative)
    }

    /// Deletes a stored file by reference.
    ///
    /// Returns `Ok(false)` if the file was already gone.
    ///
    /// # Errors
    ///
    /// - `Validation` if `relative` is not a reference into this store
    /// - `Io` if the file exists but cannot be removed
    pub fn delete(&self, relative: &str) -> CoreResult<bool> {
        let path = self.resolve(relative)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(reference = relative, "deleted media file");
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Absolute path of a stored file.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `relative` is not a plain `store/<name>`
    /// reference (no nested directories, no `..`).
    pub fn resolve(&self, relative: &str) -> CoreResult<PathBuf> {
        let name = self.file_name(relative).ok_or_else(|| {
            CoreError::validation(format!("not a media reference: {relative:?}"))
        })?;
        Ok(self.dir().join(name))
    }

    /// URL under which a client serves `relative`, e.g. `/media/store/x.png`.
    #[must_use]
    pub fn url(&self, relative: &str, base_url: &str) -> String {
        format!("{}/{relative}", base_url.trim_end_matches('/'))
    }

    fn file_name<'a>(&self, relative: &'a str) -> Option<&'a str> {
        let name = relative
            .strip_prefix(self.dir_name.as_str())?
            .strip_prefix('/')?;
        let plain = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && !name.chars().any(char::is_control);
        plain.then_some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::{tempdir, TempDir};

    fn setup() -> (TempDir, MediaStore) {
        let temp = tempdir().unwrap();
        let store = MediaStore::new(temp.path(), "store");
        fs::create_dir_all(store.dir()).unwrap();
        (temp, store)
    }

    fn source(temp: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = temp.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn store_copies_with_unique_name_and_extension() {
        let (temp, store) = setup();
        let src = source(&temp, "alice.jpg", b"Alice profile image");

        let first = store.store(&src, Some("photo")).unwrap();
        let second = store.store(&src, None).unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with("store/"));
        assert!(first.ends_with(".jpg"));
        assert_eq!(
            fs::read(temp.path().join(&first)).unwrap(),
            b"Alice profile image"
        );
        // Source is copied, not moved
        assert!(src.exists());
    }

    #[test]
    fn store_without_extension() {
        let (temp, store) = setup();
        let src = source(&temp, "README", b"x");

        let reference = store.store(&src, None).unwrap();
        let name = reference.strip_prefix("store/").unwrap();
        assert!(!name.contains('.'));
        assert!(Uuid::parse_str(name).is_ok());
    }

    #[test]
    fn store_missing_source_is_io_error() {
        let (temp, store) = setup();
        let err = store.store(&temp.path().join("nope.png"), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn delete_is_idempotent() {
        let (temp, store) = setup();
        let reference = store.store(&source(&temp, "a.png", b"a"), None).unwrap();

        assert!(store.delete(&reference).unwrap());
        assert!(!store.delete(&reference).unwrap());
        assert!(!temp.path().join(&reference).exists());
    }

    #[test]
    fn references_cannot_escape_the_store() {
        let (_temp, store) = setup();
        for bad in ["store/", "store/..", "store/a/b.png", "other/a.png", "storex/a.png", "a.png"] {
            assert!(!store.is_reference(bad), "{bad}");
            assert_eq!(store.delete(bad).unwrap_err().kind(), ErrorKind::Validation);
        }
        assert!(store.is_reference("store/a.png"));
    }

    #[test]
    fn resolve_and_url() {
        let (temp, store) = setup();
        assert_eq!(
            store.resolve("store/x.gif").unwrap(),
            temp.path().join("store").join("x.gif")
        );
        assert_eq!(store.url("store/x.gif", "/media/"), "/media/store/x.gif");
        assert_eq!(store.url("store/x.gif", "/media"), "/media/store/x.gif");
    }
}
