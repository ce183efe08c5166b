//! In-memory document store for testing.

use crate::error::{StorageError, StorageResult};
use crate::path::normalize;
use crate::store::DocumentStore;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// An in-memory document store.
///
/// This store keeps every document in a sorted map and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral state that doesn't need persistence
///
/// Directories are implicit: `create_dir_all` is a no-op and a document's
/// parents exist as soon as the document does.
///
/// # Example
///
/// ```rust
/// use std::path::Path;
/// use waystate_storage::{DocumentStore, InMemoryStore};
///
/// let store = InMemoryStore::new();
/// store.write(Path::new("a/doc"), b"test data").unwrap();
/// assert!(store.exists(Path::new("a/doc")));
/// assert_eq!(store.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    documents: RwLock<BTreeMap<PathBuf, Vec<u8>>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with documents.
    ///
    /// Useful for testing recovery scenarios. Entries with invalid paths are
    /// skipped.
    #[must_use]
    pub fn with_documents<I, P>(documents: I) -> Self
    where
        I: IntoIterator<Item = (P, Vec<u8>)>,
        P: AsRef<Path>,
    {
        let map = documents
            .into_iter()
            .filter_map(|(path, data)| normalize(path.as_ref()).ok().map(|p| (p, data)))
            .collect();
        Self {
            documents: RwLock::new(map),
        }
    }

    /// Returns a copy of every document in the store.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        self.documents.read().clone()
    }

    /// Returns the number of documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Returns true if the store holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

impl DocumentStore for InMemoryStore {
    fn read(&self, path: &Path) -> StorageResult<Vec<u8>> {
        let key = normalize(path)?;
        self.documents
            .read()
            .get(&key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                path: path.to_path_buf(),
            })
    }

    fn write(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        let key = normalize(path)?;
        self.documents.write().insert(key, data.to_vec());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        normalize(path)
            .map(|key| self.documents.read().contains_key(&key))
            .unwrap_or(false)
    }

    fn list(&self, root: &Path) -> StorageResult<Vec<PathBuf>> {
        let root = normalize(root)?;
        // BTreeMap iteration is already in ascending path order
        Ok(self
            .documents
            .read()
            .keys()
            .filter(|key| key.starts_with(&root) && *key != &root)
            .cloned()
            .collect())
    }

    fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
        let src = normalize(from)?;
        let dst = normalize(to)?;
        let mut documents = self.documents.write();
        let data = documents.remove(&src).ok_or_else(|| StorageError::NotFound {
            path: from.to_path_buf(),
        })?;
        documents.insert(dst, data);
        Ok(())
    }

    fn remove(&self, path: &Path) -> StorageResult<()> {
        let key = normalize(path)?;
        self.documents.write().remove(&key);
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        normalize(path)?;
        Ok(())
    }
}
