//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up test stores
//! and common test scenarios.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use waystate_core::artifact::is_internal;
use waystate_core::{Config, IntegrityConfig, IntegrityVerifier, TransactionManager};
use waystate_storage::{DocumentStore, FileStore, InMemoryStore};

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The store instance.
    pub store: Arc<dyn DocumentStore>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates a new in-memory test store.
    pub fn memory() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            _temp_dir: None,
        }
    }

    /// Creates a new file-based test store in a temporary directory.
    /// Fsync is off to keep tests fast.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileStore::open(temp_dir.path())
            .expect("Failed to open file store")
            .with_sync(false);
        Self {
            store: Arc::new(store),
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the root directory if file-based, None if in-memory.
    pub fn path(&self) -> Option<&Path> {
        self._temp_dir.as_ref().map(TempDir::path)
    }

    /// Writes every document directly, bypassing the atomic writer.
    pub fn seed(&self, documents: &[(&str, &[u8])]) {
        for (path, data) in documents {
            self.store
                .write(Path::new(path), data)
                .expect("Failed to seed document");
        }
    }

    /// Returns every document, artifacts included, with its content.
    pub fn contents(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        contents(self.store.as_ref())
    }

    /// Returns every document except artifacts and commit markers.
    pub fn documents(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        self.contents()
            .into_iter()
            .filter(|(path, _)| !is_internal(path))
            .collect()
    }

    /// Returns the artifacts and commit markers on disk.
    pub fn artifacts(&self) -> Vec<PathBuf> {
        artifacts(self.store.as_ref())
    }

    /// Creates a transaction manager over the store without recovery.
    pub fn manager(&self) -> TransactionManager {
        TransactionManager::new(Arc::clone(&self.store))
    }

    /// Opens a transaction manager over the store, running recovery.
    pub fn open_manager(&self) -> TransactionManager {
        TransactionManager::open(Arc::clone(&self.store), Config::default())
            .expect("Failed to open transaction manager")
    }

    /// Creates an integrity verifier with the default config.
    pub fn verifier(&self) -> IntegrityVerifier {
        IntegrityVerifier::new(Arc::clone(&self.store), IntegrityConfig::default())
            .expect("Failed to create verifier")
    }
}

impl std::ops::Deref for TestStore {
    type Target = dyn DocumentStore;

    fn deref(&self) -> &Self::Target {
        self.store.as_ref()
    }
}

/// Returns every document in `store` with its content.
pub fn contents(store: &dyn DocumentStore) -> BTreeMap<PathBuf, Vec<u8>> {
    store
        .list(Path::new(""))
        .expect("Failed to list store")
        .into_iter()
        .map(|path| {
            let data = store.read(&path).expect("Failed to read listed document");
            (path, data)
        })
        .collect()
}

/// Returns the artifacts and commit markers in `store`.
pub fn artifacts(store: &dyn DocumentStore) -> Vec<PathBuf> {
    store
        .list(Path::new(""))
        .expect("Failed to list store")
        .into_iter()
        .filter(|path| is_internal(path))
        .collect()
}

/// Runs a test with a temporary in-memory store.
///
/// # Example
///
/// ```rust
/// use std::path::Path;
/// use waystate_testkit::with_temp_store;
///
/// with_temp_store(|store| {
///     store.seed(&[("state.json", b"{}")]);
///     assert!(store.exists(Path::new("state.json")));
/// });
/// ```
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&TestStore) -> R,
{
    let store = TestStore::memory();
    f(&store)
}

/// Runs a test with a temporary file-based store.
pub fn with_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&TestStore, &Path) -> R,
{
    let store = TestStore::file();
    let path = store
        .path()
        .expect("File store should have a path")
        .to_path_buf();
    f(&store, &path)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use waystate_core::{CompletenessConfig, ConsistencyRule};

    /// Directory of the sample workflow run.
    pub const RUN_DIR: &str = "run";

    /// Seeds a complete workflow run under [`RUN_DIR`]:
    /// two required state files, one active-state file, two optional files
    /// and a checkpoint log that contains the current checkpoint.
    pub fn workflow_run(store: &TestStore) {
        store.seed(&[
            (
                "run/state.json",
                br#"{"run_id":"r-42","phase":"build","checkpoint":"cp-2","owner":"ci"}"#,
            ),
            ("run/plan.json", br#"{"steps":["fetch","build","test"]}"#),
            ("run/active/session.json", br#"{"pid":4242}"#),
            ("run/notes.md", b"# Notes\n"),
            ("run/summary.txt", b"build in progress\n"),
            ("run/checkpoints.log", b"cp-1\ncp-2\n"),
        ]);
    }

    /// Completeness profile matching [`workflow_run`].
    pub fn workflow_profile() -> CompletenessConfig {
        CompletenessConfig::new()
            .required_files(["state.json", "plan.json"])
            .optional_files(["notes.md", "summary.txt"])
            .required_fields(["state.json:run_id", "state.json:phase"])
            .important_fields(["state.json:owner", "plan.json:steps"])
            .consistency(ConsistencyRule {
                current_checkpoint_field: "state.json:checkpoint".to_string(),
                checkpoint_log: "checkpoints.log".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_has_no_path() {
        let store = TestStore::memory();
        assert!(store.path().is_none());
    }

    #[test]
    fn file_store_has_path() {
        with_file_store(|store, path| {
            store.seed(&[("a.json", b"{}")]);
            assert!(path.join("a.json").is_file());
        });
    }

    #[test]
    fn documents_exclude_artifacts() {
        with_temp_store(|store| {
            let mut manager = store.manager();
            manager.begin("pending").unwrap();
            manager.write(Path::new("a.json"), b"{}").unwrap();

            assert_eq!(store.documents().len(), 1);
            assert_eq!(store.artifacts().len(), 1);
            assert_eq!(store.contents().len(), 2);
        });
    }

    #[test]
    fn workflow_run_is_complete() {
        with_temp_store(|store| {
            scenarios::workflow_run(store);
            let scorer = waystate_core::CompletenessScorer::new(
                Arc::clone(&store.store),
                scenarios::workflow_profile(),
            );
            let report = scorer.report(Path::new(scenarios::RUN_DIR));
            assert_eq!(report.score, 100);
            assert!(report.consistency_ok);
        });
    }
}
