//! File-based storage backend for persistent storage.
//!
//! ```text
//! <store_path>/
//! ├─ LOCK            # Advisory lock for single-writer
//! ├─ store.cbor      # Current snapshot
//! └─ store.cbor.tmp  # Written, synced, then renamed over store.cbor
//! ```

use crate::backend::StorageBackend;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const SNAPSHOT_FILE: &str = "store.cbor";
const SNAPSHOT_TEMP: &str = "store.cbor.tmp";

/// A directory-based storage backend.
///
/// Holds an exclusive advisory lock on the directory for its lifetime, so
/// only one process writes a store at a time.
///
/// # Durability
///
/// Snapshots are written to a temporary file, optionally `fsync`ed
/// (`sync_on_commit`), and renamed into place. A crash mid-write leaves the
/// previous snapshot intact.
///
/// # Example
///
/// ```no_run
/// use tasksync_store::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("tasks.store")).unwrap();
/// backend.store(b"snapshot").unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    sync_on_commit: bool,
    _lock_file: File,
}

impl FileBackend {
    /// Opens or creates a store directory with default settings.
    ///
    /// # Errors
    ///
    /// Returns `Locked` if another process holds the directory, or an I/O
    /// error if it cannot be created.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with_config(path, &StoreConfig::default())
    }

    /// Opens a store directory with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (`Locked`)
    /// - I/O errors occur
    pub fn open_with_config(path: &Path, config: &StoreConfig) -> StoreResult<Self> {
        if !path.exists() {
            if config.create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(StoreError::InvalidOperation(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(StoreError::InvalidOperation(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            tracing::warn!(path = %path.display(), "store directory is locked");
            return Err(StoreError::Locked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            sync_on_commit: config.sync_on_commit,
            _lock_file: lock_file,
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the current snapshot file.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.path.join(SNAPSHOT_FILE)
    }
}

impl StorageBackend for FileBackend {
    fn load(&self) -> StoreResult<Option<Vec<u8>>> {
        match fs::read(self.snapshot_path()) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&mut self, snapshot: &[u8]) -> StoreResult<()> {
        let temp_path = self.path.join(SNAPSHOT_TEMP);
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(snapshot)?;
            file.flush()?;
            if self.sync_on_commit {
                file.sync_all()?;
            }
        }
        fs::rename(&temp_path, self.snapshot_path())?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("store");

        let backend = FileBackend::open(&path).unwrap();
        assert!(path.is_dir());
        assert!(backend.load().unwrap().is_none());
    }

    #[test]
    fn store_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        {
            let mut backend = FileBackend::open(&path).unwrap();
            backend.store(b"first").unwrap();
            backend.store(b"second").unwrap();
        }

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.load().unwrap(), Some(b"second".to_vec()));
        assert!(!path.join(SNAPSHOT_TEMP).exists());
    }

    #[test]
    fn second_open_is_locked() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        let _first = FileBackend::open(&path).unwrap();
        let second = FileBackend::open(&path);
        assert!(matches!(second, Err(StoreError::Locked)));
    }

    #[test]
    fn missing_directory_without_create() {
        let dir = tempdir().unwrap();
        let config = StoreConfig::new().create_if_missing(false);
        let result = FileBackend::open_with_config(&dir.path().join("absent"), &config);
        assert!(matches!(result, Err(StoreError::InvalidOperation(_))));
    }
}
