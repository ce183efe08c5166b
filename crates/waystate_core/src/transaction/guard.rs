//! Scoped transactions.

use crate::error::CoreResult;
use crate::transaction::manager::{CommitSummary, RollbackSummary, TransactionManager};
use crate::transaction::state::Transaction;
use crate::types::TransactionId;
use std::io::Read;
use std::path::Path;
use std::process::Command;
use tracing::warn;

/// An active transaction that rolls back unless committed.
///
/// Created by [`TransactionManager::begin_scoped`]. Dropping the guard
/// while its transaction is still active, including while unwinding from a
/// panic, rolls the transaction back.
///
/// ```rust
/// use std::path::Path;
/// use std::sync::Arc;
/// use waystate_core::TransactionManager;
/// use waystate_storage::{DocumentStore, InMemoryStore};
///
/// let store = Arc::new(InMemoryStore::new());
/// let mut manager = TransactionManager::new(store.clone());
/// {
///     let mut tx = manager.begin_scoped("draft").unwrap();
///     tx.write(Path::new("draft.json"), b"{}").unwrap();
///     // dropped without commit
/// }
/// assert!(!store.exists(Path::new("draft.json")));
/// ```
pub struct TransactionGuard<'a> {
    manager: &'a mut TransactionManager,
    txid: TransactionId,
}

impl<'a> TransactionGuard<'a> {
    pub(crate) fn new(manager: &'a mut TransactionManager, txid: TransactionId) -> Self {
        Self { manager, txid }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.txid
    }

    /// Returns the transaction, while it is active.
    #[must_use]
    pub fn transaction(&self) -> Option<&Transaction> {
        self.manager.active_transaction()
    }

    /// See [`TransactionManager::write`].
    ///
    /// # Errors
    ///
    /// Returns the write error; the transaction stays active.
    pub fn write(&mut self, path: &Path, content: &[u8]) -> CoreResult<()> {
        self.manager.write(path, content)
    }

    /// See [`TransactionManager::append`].
    ///
    /// # Errors
    ///
    /// Returns the write error; the transaction stays active.
    pub fn append(&mut self, path: &Path, content: &[u8]) -> CoreResult<()> {
        self.manager.append(path, content)
    }

    /// See [`TransactionManager::append_line`].
    ///
    /// # Errors
    ///
    /// Returns the write error; the transaction stays active.
    pub fn append_line(&mut self, path: &Path, line: &str) -> CoreResult<()> {
        self.manager.append_line(path, line)
    }

    /// See [`TransactionManager::write_from`].
    ///
    /// # Errors
    ///
    /// Returns the source or write error; the transaction stays active.
    pub fn write_from<R: Read>(&mut self, path: &Path, source: R) -> CoreResult<()> {
        self.manager.write_from(path, source)
    }

    /// See [`TransactionManager::write_from_command`].
    ///
    /// # Errors
    ///
    /// Returns the source or write error; the transaction stays active.
    pub fn write_from_command(&mut self, path: &Path, command: &mut Command) -> CoreResult<()> {
        self.manager.write_from_command(path, command)
    }

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// See [`TransactionManager::commit`]. If the commit marker could not
    /// be written the guard rolls back as it is dropped.
    pub fn commit(self) -> CoreResult<CommitSummary> {
        self.manager.commit()
    }

    /// Rolls the transaction back.
    ///
    /// # Errors
    ///
    /// See [`TransactionManager::rollback`].
    pub fn rollback(self, reason: &str) -> CoreResult<RollbackSummary> {
        self.manager.rollback(reason)
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if self.manager.active_id() != Some(self.txid) {
            return;
        }
        if let Err(e) = self.manager.rollback("guard dropped") {
            warn!(txid = %self.txid, error = %e, "rollback on drop was incomplete");
        }
    }
}

impl std::fmt::Debug for TransactionGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionGuard")
            .field("txid", &self.txid)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::Arc;
    use waystate_storage::{DocumentStore, InMemoryStore};

    fn create_manager() -> (Arc<InMemoryStore>, TransactionManager) {
        let store = Arc::new(InMemoryStore::new());
        let manager = TransactionManager::new(store.clone());
        (store, manager)
    }

    #[test]
    fn drop_rolls_back() {
        let (store, mut manager) = create_manager();
        store.write(Path::new("doc"), b"before").unwrap();
        {
            let mut tx = manager.begin_scoped("scoped").unwrap();
            tx.write(Path::new("doc"), b"after").unwrap();
            assert_eq!(tx.transaction().unwrap().backups().len(), 1);
        }
        assert!(!manager.is_active());
        assert_eq!(store.read(Path::new("doc")).unwrap(), b"before");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn commit_keeps_writes() {
        let (store, mut manager) = create_manager();
        let tx = {
            let mut tx = manager.begin_scoped("scoped").unwrap();
            tx.append_line(Path::new("log"), "one").unwrap();
            tx.commit().unwrap()
        };
        assert_eq!(tx.label, "scoped");
        assert_eq!(store.read(Path::new("log")).unwrap(), b"one\n");
        assert!(!manager.is_active());
    }

    #[test]
    fn explicit_rollback_does_not_roll_back_twice() {
        let (store, mut manager) = create_manager();
        let mut tx = manager.begin_scoped("scoped").unwrap();
        tx.write(Path::new("doc"), b"x").unwrap();
        let summary = tx.rollback("changed my mind").unwrap();
        assert_eq!(summary.reason, "changed my mind");
        assert!(store.is_empty());
        assert!(manager.begin("next").is_ok());
    }

    #[test]
    fn panic_inside_scope_rolls_back() {
        let (store, mut manager) = create_manager();
        store.write(Path::new("doc"), b"safe").unwrap();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut tx = manager.begin_scoped("doomed").unwrap();
            tx.write(Path::new("doc"), b"unsafe").unwrap();
            panic!("boom");
        }));

        assert!(result.is_err());
        assert!(!manager.is_active());
        assert_eq!(store.read(Path::new("doc")).unwrap(), b"safe");
        assert_eq!(store.len(), 1);
    }
}
