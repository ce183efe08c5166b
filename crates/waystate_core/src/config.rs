//! Engine configuration.

use crate::integrity::IntegrityConfig;
use std::path::Path;
use waystate_storage::{FileStore, StorageResult};

/// Configuration for opening a [`crate::TransactionManager`] and the
/// verifier that shares its store.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether file stores opened from this config fsync writes and renames.
    pub sync: bool,

    /// Whether opening a manager resolves artifacts left by an interrupted
    /// transaction before any new write is accepted.
    pub recover_on_open: bool,

    /// Checksum and manifest settings.
    pub integrity: IntegrityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sync: true,
            recover_on_open: true,
            integrity: IntegrityConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether writes are fsynced.
    #[must_use]
    pub const fn sync(mut self, value: bool) -> Self {
        self.sync = value;
        self
    }

    /// Sets whether recovery runs on open.
    #[must_use]
    pub const fn recover_on_open(mut self, value: bool) -> Self {
        self.recover_on_open = value;
        self
    }

    /// Replaces the integrity settings.
    #[must_use]
    pub fn integrity(mut self, integrity: IntegrityConfig) -> Self {
        self.integrity = integrity;
        self
    }

    /// Opens a file store rooted at `root` with this config's sync setting.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory cannot be created.
    pub fn file_store(&self, root: &Path) -> StorageResult<FileStore> {
        Ok(FileStore::open(root)?.with_sync(self.sync))
    }
}
