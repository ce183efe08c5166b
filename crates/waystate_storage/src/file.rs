//! File-based document store for persistent state.

use crate::error::{StorageError, StorageResult};
use crate::path::normalize;
use crate::store::DocumentStore;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// A document store rooted at a directory on a conventional filesystem.
///
/// Documents survive process restarts. Every document path is resolved
/// relative to the root; paths that would escape it are rejected.
///
/// # Durability
///
/// With `sync` enabled (the default):
/// - `write()` calls `File::sync_all()` before returning
/// - `rename()` and `remove()` fsync the parent directory so the directory
///   entry change is durable
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use waystate_storage::{DocumentStore, FileStore};
///
/// let store = FileStore::open(Path::new("state")).unwrap();
/// store.write(Path::new("session.json"), b"{}").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    sync: bool,
}

impl FileStore {
    /// Opens a store rooted at `root`, creating the directory if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or `root` is not
    /// a directory.
    pub fn open(root: &Path) -> StorageResult<Self> {
        fs::create_dir_all(root)?;
        if !root.is_dir() {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("store root is not a directory: {}", root.display()),
            )));
        }
        Ok(Self {
            root: root.to_path_buf(),
            sync: true,
        })
    }

    /// Sets whether writes and directory changes are fsynced.
    #[must_use]
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Returns the root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a store-relative path to a filesystem path.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidPath`] for paths outside the root.
    pub fn resolve(&self, path: &Path) -> StorageResult<PathBuf> {
        Ok(self.root.join(normalize(path)?))
    }

    #[cfg(unix)]
    fn sync_parent(&self, full: &Path) -> StorageResult<()> {
        if !self.sync {
            return Ok(());
        }
        if let Some(parent) = full.parent() {
            File::open(parent)?.sync_all()?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_parent(&self, _full: &Path) -> StorageResult<()> {
        // NTFS journals directory metadata; there is no directory handle to fsync
        Ok(())
    }

    fn walk(&self, dir: &Path, out: &mut Vec<PathBuf>) -> StorageResult<()> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let full = entry.path();
            if file_type.is_dir() {
                self.walk(&full, out)?;
            } else if file_type.is_file() {
                if let Ok(relative) = full.strip_prefix(&self.root) {
                    out.push(relative.to_path_buf());
                }
            }
            // Symlinks and special files are not documents
        }
        Ok(())
    }
}

impl DocumentStore for FileStore {
    fn read(&self, path: &Path) -> StorageResult<Vec<u8>> {
        let full = self.resolve(path)?;
        match fs::read(&full) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StorageError::NotFound {
                path: path.to_path_buf(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = File::create(&full)?;
        file.write_all(data)?;
        if self.sync {
            file.sync_all()?;
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).map(|full| full.is_file()).unwrap_or(false)
    }

    fn list(&self, root: &Path) -> StorageResult<Vec<PathBuf>> {
        let start = self.resolve(root)?;
        let mut out = Vec::new();
        self.walk(&start, &mut out)?;
        out.sort();
        Ok(out)
    }

    fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
        let src = self.resolve(from)?;
        let dst = self.resolve(to)?;
        match fs::rename(&src, &dst) {
            Ok(()) => self.sync_parent(&dst),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StorageError::NotFound {
                path: from.to_path_buf(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, path: &Path) -> StorageResult<()> {
        let full = self.resolve(path)?;
        match fs::remove_file(&full) {
            Ok(()) => self.sync_parent(&full),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        fs::create_dir_all(self.resolve(path)?)?;
        Ok(())
    }
}
