//! Transaction state.

use crate::error::{CoreError, CoreResult};
use crate::types::{TransactionId, WriteTag};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and accepts writes.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been rolled back.
    RolledBack,
}

/// The pre-write state of one document, held on disk until the owning
/// write or transaction resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    /// The document the backup belongs to.
    pub original: PathBuf,
    /// Where the snapshot lives: a `.bak` copy if the document existed,
    /// otherwise an empty `.new` marker.
    pub location: PathBuf,
    /// Whether the document existed before the write.
    pub existed: bool,
    /// Owning transaction; `None` for a standalone write.
    pub owner: Option<TransactionId>,
}

/// An active transaction.
///
/// The transaction records every backup and temp file its writes create,
/// so that commit or rollback visits each of them exactly once.
#[derive(Debug)]
pub struct Transaction {
    /// Transaction ID.
    id: TransactionId,
    /// Caller-supplied label, for logs and errors.
    label: String,
    /// Current state.
    state: TransactionState,
    /// Backups in registration order; at most one per document.
    backups: Vec<Backup>,
    /// Temp files created by writes in this transaction.
    temp_paths: Vec<PathBuf>,
    /// When `begin` was called.
    started: Instant,
}

impl Transaction {
    /// Creates a new active transaction.
    pub(crate) fn new(id: TransactionId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            state: TransactionState::Active,
            backups: Vec::new(),
            temp_paths: Vec::new(),
            started: Instant::now(),
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the tag embedded in this transaction's artifact names.
    #[must_use]
    pub fn tag(&self) -> WriteTag {
        WriteTag::Transaction(self.id)
    }

    /// Returns the label passed to `begin`.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Returns the registered backups.
    #[must_use]
    pub fn backups(&self) -> &[Backup] {
        &self.backups
    }

    /// Returns the registered temp files.
    #[must_use]
    pub fn temp_paths(&self) -> &[PathBuf] {
        &self.temp_paths
    }

    /// Returns true if `document` was already backed up by this transaction.
    #[must_use]
    pub fn has_backup(&self, document: &Path) -> bool {
        self.backups.iter().any(|b| b.original == document)
    }

    /// Returns the documents touched so far, in write order.
    pub fn documents(&self) -> impl Iterator<Item = &Path> {
        self.backups.iter().map(|b| b.original.as_path())
    }

    /// Returns the time elapsed since `begin`.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started.elapsed()
    }

    /// Registers a backup taken by a write in this transaction.
    ///
    /// A document keeps its first backup: later writes to it within the
    /// same transaction must not replace the pre-transaction snapshot.
    pub(crate) fn register_backup(&mut self, backup: Backup) -> CoreResult<()> {
        self.ensure_active()?;
        if !self.has_backup(&backup.original) {
            self.backups.push(backup);
        }
        Ok(())
    }

    /// Forgets the backup of `document` after a failed write restored it.
    pub(crate) fn unregister_backup(&mut self, document: &Path) {
        self.backups.retain(|b| b.original != document);
    }

    /// Registers a temp file created by a write in this transaction.
    pub(crate) fn register_temp(&mut self, path: PathBuf) -> CoreResult<()> {
        self.ensure_active()?;
        if !self.temp_paths.contains(&path) {
            self.temp_paths.push(path);
        }
        Ok(())
    }

    /// Hands out the registered artifacts, leaving the lists empty.
    pub(crate) fn drain_artifacts(&mut self) -> (Vec<Backup>, Vec<PathBuf>) {
        (
            std::mem::take(&mut self.backups),
            std::mem::take(&mut self.temp_paths),
        )
    }

    /// Marks the transaction as committed.
    pub(crate) fn mark_committed(&mut self) {
        self.state = TransactionState::Committed;
    }

    /// Marks the transaction as rolled back.
    pub(crate) fn mark_rolled_back(&mut self) {
        self.state = TransactionState::RolledBack;
    }

    /// Ensures the transaction is active.
    fn ensure_active(&self) -> CoreResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            TransactionState::Committed | TransactionState::RolledBack => {
                Err(CoreError::NoActiveTransaction)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_txn() -> Transaction {
        Transaction::new(TransactionId::generate(), "test")
    }

    fn backup(doc: &str) -> Backup {
        Backup {
            original: PathBuf::from(doc),
            location: PathBuf::from(format!(".{doc}.x.bak")),
            existed: true,
            owner: None,
        }
    }

    #[test]
    fn new_transaction_is_active() {
        let txn = create_txn();
        assert!(txn.is_active());
        assert_eq!(txn.state(), TransactionState::Active);
        assert_eq!(txn.label(), "test");
        assert!(txn.backups().is_empty());
        assert!(txn.temp_paths().is_empty());
    }

    #[test]
    fn first_backup_wins() {
        let mut txn = create_txn();
        txn.register_backup(backup("a")).unwrap();

        let mut second = backup("a");
        second.location = PathBuf::from("other");
        txn.register_backup(second).unwrap();

        assert_eq!(txn.backups().len(), 1);
        assert_eq!(txn.backups()[0].location, PathBuf::from(".a.x.bak"));
        assert!(txn.has_backup(Path::new("a")));
    }

    #[test]
    fn temp_paths_are_deduplicated() {
        let mut txn = create_txn();
        txn.register_temp(PathBuf::from(".a.tmp")).unwrap();
        txn.register_temp(PathBuf::from(".a.tmp")).unwrap();
        assert_eq!(txn.temp_paths().len(), 1);
    }

    #[test]
    fn documents_in_write_order() {
        let mut txn = create_txn();
        txn.register_backup(backup("b")).unwrap();
        txn.register_backup(backup("a")).unwrap();
        let docs: Vec<_> = txn.documents().collect();
        assert_eq!(docs, vec![Path::new("b"), Path::new("a")]);
    }

    #[test]
    fn drain_empties_lists() {
        let mut txn = create_txn();
        txn.register_backup(backup("a")).unwrap();
        txn.register_temp(PathBuf::from(".a.tmp")).unwrap();

        let (backups, temps) = txn.drain_artifacts();
        assert_eq!(backups.len(), 1);
        assert_eq!(temps.len(), 1);
        assert!(txn.backups().is_empty());
        assert!(txn.temp_paths().is_empty());
    }

    #[test]
    fn cannot_register_after_commit() {
        let mut txn = create_txn();
        txn.mark_committed();

        let result = txn.register_backup(backup("a"));
        assert!(matches!(result, Err(CoreError::NoActiveTransaction)));
    }

    #[test]
    fn cannot_register_after_rollback() {
        let mut txn = create_txn();
        txn.mark_rolled_back();

        let result = txn.register_temp(PathBuf::from(".a.tmp"));
        assert!(result.is_err());
        assert_eq!(txn.state(), TransactionState::RolledBack);
    }
}
