//! Document store trait definition.

use crate::error::StorageResult;
use std::path::{Path, PathBuf};

/// A low-level document store for waystate.
///
/// Stores are **opaque byte stores** addressed by paths relative to the
/// store root. They do not understand backups, temp files, checksums or the
/// format of the documents they hold; `waystate_core` owns all of that.
///
/// # Invariants
///
/// - `read` returns exactly the bytes last published at that path
/// - `rename` replaces the destination in one step: a reader observes either
///   the old destination or the new one, never a mixture
/// - `list` returns documents in ascending path order
/// - Stores must be `Send + Sync`
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent storage
pub trait DocumentStore: Send + Sync {
    /// Reads the full content of a document.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::NotFound`] if the document does not
    /// exist, or an I/O error.
    fn read(&self, path: &Path) -> StorageResult<Vec<u8>>;

    /// Replaces the full content of a document, creating parent directories.
    ///
    /// This is a raw write with no atomicity guarantee; callers that need
    /// atomic publication write to a sibling path and `rename` it into place.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn write(&self, path: &Path, data: &[u8]) -> StorageResult<()>;

    /// Returns true if a document exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Lists every document under `root`, recursively, in ascending order.
    ///
    /// Returned paths are relative to the store root. A missing `root`
    /// lists as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory tree cannot be read.
    fn list(&self, root: &Path) -> StorageResult<Vec<PathBuf>>;

    /// Atomically moves `from` over `to`, replacing any existing document.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::NotFound`] if `from` does not exist,
    /// or an I/O error.
    fn rename(&self, from: &Path, to: &Path) -> StorageResult<()>;

    /// Removes a document. Removing an absent document succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn remove(&self, path: &Path) -> StorageResult<()>;

    /// Ensures a directory and all of its parents exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    fn create_dir_all(&self, path: &Path) -> StorageResult<()>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for std::sync::Arc<S> {
    fn read(&self, path: &Path) -> StorageResult<Vec<u8>> {
        (**self).read(path)
    }

    fn write(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        (**self).write(path, data)
    }

    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn list(&self, root: &Path) -> StorageResult<Vec<PathBuf>> {
        (**self).list(root)
    }

    fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
        (**self).rename(from, to)
    }

    fn remove(&self, path: &Path) -> StorageResult<()> {
        (**self).remove(path)
    }

    fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        (**self).create_dir_all(path)
    }
}
