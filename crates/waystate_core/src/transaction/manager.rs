//! Transaction manager.

use crate::artifact::commit_marker_path;
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::integrity::IntegrityVerifier;
use crate::recovery::{self, RecoveryReport};
use crate::transaction::guard::TransactionGuard;
use crate::transaction::state::Transaction;
use crate::types::TransactionId;
use crate::writer::{discard_backup, read_source, restore_backup, run_command, AtomicWriter};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use waystate_storage::DocumentStore;

/// Groups atomic writes into all-or-nothing units.
///
/// The manager is a small state machine:
///
/// ```text
/// Idle --begin--> Active --commit----> Idle
///                        --rollback--> Idle
/// ```
///
/// ## Single-Writer Assumption
///
/// At most one transaction is active per manager, and `&mut self` keeps
/// that true within a process. Nothing stops two processes from running
/// managers over the same root; callers must not do that.
///
/// Writes made while Idle are standalone atomic writes.
pub struct TransactionManager {
    /// Publishes every write.
    writer: AtomicWriter,
    /// Settings the manager was opened with.
    config: Config,
    /// The active transaction, if any.
    active: Option<Transaction>,
}

/// What a successful commit made permanent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    /// The committed transaction.
    pub txid: TransactionId,
    /// Label passed to `begin`.
    pub label: String,
    /// Documents written, in first-write order.
    pub documents: Vec<PathBuf>,
    /// Time from `begin` to commit.
    pub elapsed: Duration,
}

/// What a successful rollback put back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackSummary {
    /// The rolled back transaction.
    pub txid: TransactionId,
    /// Label passed to `begin`.
    pub label: String,
    /// Reason passed to `rollback`.
    pub reason: String,
    /// Documents restored to (or removed back to) their prior state.
    pub restored: Vec<PathBuf>,
}

impl TransactionManager {
    /// Creates a manager over `store` with the default config, without
    /// running recovery.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_config(store, Config::default())
    }

    /// Creates a manager over `store` without running recovery.
    pub fn with_config(store: Arc<dyn DocumentStore>, config: Config) -> Self {
        Self {
            writer: AtomicWriter::new(store),
            config,
            active: None,
        }
    }

    /// Opens a manager over `store`, resolving artifacts left by an
    /// interrupted process first if `config.recover_on_open` is set.
    ///
    /// # Errors
    ///
    /// Returns `RecoveryIncomplete` if some artifacts could not be resolved.
    pub fn open(store: Arc<dyn DocumentStore>, config: Config) -> CoreResult<Self> {
        let mut manager = Self::with_config(store, config);
        if manager.config.recover_on_open {
            manager.recover()?;
        }
        Ok(manager)
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        self.writer.store()
    }

    /// Returns the writer used for every publish.
    #[must_use]
    pub fn writer(&self) -> &AtomicWriter {
        &self.writer
    }

    /// Returns the config the manager was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates an integrity verifier over the same store, using the
    /// config's integrity settings.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPattern` if a required pattern does not compile.
    pub fn verifier(&self) -> CoreResult<IntegrityVerifier> {
        IntegrityVerifier::new(Arc::clone(self.store()), self.config.integrity.clone())
    }

    /// Returns true while a transaction is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Returns the ID of the active transaction.
    #[must_use]
    pub fn active_id(&self) -> Option<TransactionId> {
        self.active.as_ref().map(Transaction::id)
    }

    /// Returns the active transaction.
    #[must_use]
    pub fn active_transaction(&self) -> Option<&Transaction> {
        self.active.as_ref()
    }

    /// Begins a new transaction.
    ///
    /// # Errors
    ///
    /// Returns `TransactionAlreadyActive` if a transaction is active.
    pub fn begin(&mut self, label: &str) -> CoreResult<TransactionId> {
        if let Some(active) = &self.active {
            return Err(CoreError::TransactionAlreadyActive {
                active: active.id(),
                label: active.label().to_string(),
            });
        }
        let txid = TransactionId::generate();
        self.active = Some(Transaction::new(txid, label));
        info!(%txid, label, "began transaction");
        Ok(txid)
    }

    /// Begins a transaction that rolls back when the returned guard is
    /// dropped without being committed.
    ///
    /// # Errors
    ///
    /// Returns `TransactionAlreadyActive` if a transaction is active.
    pub fn begin_scoped(&mut self, label: &str) -> CoreResult<TransactionGuard<'_>> {
        let txid = self.begin(label)?;
        Ok(TransactionGuard::new(self, txid))
    }

    /// Runs `f` inside a transaction.
    ///
    /// The transaction commits if `f` returns `Ok` and rolls back if it
    /// returns `Err` or panics. A rollback failure after `f` failed is
    /// logged; the caller sees the error from `f`.
    ///
    /// # Errors
    ///
    /// Returns the error from `f`, or a begin or commit error.
    pub fn run<T, E, F>(&mut self, label: &str, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut TransactionGuard<'_>) -> Result<T, E>,
        E: From<CoreError>,
    {
        let mut guard = self.begin_scoped(label)?;
        match f(&mut guard) {
            Ok(value) => {
                guard.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = guard.rollback("operation failed") {
                    warn!(label, error = %rollback, "rollback after failed operation was incomplete");
                }
                Err(e)
            }
        }
    }

    /// Atomically replaces `path`, inside the active transaction if any.
    ///
    /// # Errors
    ///
    /// See [`AtomicWriter::write`].
    pub fn write(&mut self, path: &Path, content: &[u8]) -> CoreResult<()> {
        self.writer.publish(path, content, self.active.as_mut())
    }

    /// Appends `content` to `path`, inside the active transaction if any.
    ///
    /// # Errors
    ///
    /// See [`AtomicWriter::append`].
    pub fn append(&mut self, path: &Path, content: &[u8]) -> CoreResult<()> {
        let data = self.writer.appended(path, content)?;
        self.writer.publish(path, &data, self.active.as_mut())
    }

    /// Appends `line` to `path`, inside the active transaction if any.
    ///
    /// # Errors
    ///
    /// See [`AtomicWriter::append_line`].
    pub fn append_line(&mut self, path: &Path, line: &str) -> CoreResult<()> {
        let data = self.writer.appended_line(path, line)?;
        self.writer.publish(path, &data, self.active.as_mut())
    }

    /// Replaces `path` with everything read from `source`.
    ///
    /// # Errors
    ///
    /// See [`AtomicWriter::write_from`].
    pub fn write_from<R: Read>(&mut self, path: &Path, source: R) -> CoreResult<()> {
        let data = read_source(path, source)?;
        self.writer.publish(path, &data, self.active.as_mut())
    }

    /// Replaces `path` with the standard output of `command`.
    ///
    /// # Errors
    ///
    /// See [`AtomicWriter::write_from_command`].
    pub fn write_from_command(&mut self, path: &Path, command: &mut Command) -> CoreResult<()> {
        let data = run_command(path, command)?;
        self.writer.publish(path, &data, self.active.as_mut())
    }

    /// Commits the active transaction.
    ///
    /// Every write is already published, so commit only deletes the
    /// transaction's backups and temp files. A commit marker brackets the
    /// deletions so a crash in the middle rolls forward on recovery.
    ///
    /// # Errors
    ///
    /// - `NoActiveTransaction` if Idle.
    /// - A storage error if the commit marker cannot be written; the
    ///   transaction stays active.
    /// - `CommitIncomplete` if some artifacts could not be deleted; the
    ///   writes are permanent and the manager is Idle.
    pub fn commit(&mut self) -> CoreResult<CommitSummary> {
        let txn = self.active.as_ref().ok_or(CoreError::NoActiveTransaction)?;
        let store = Arc::clone(self.writer.store());
        let marker = commit_marker_path(&txn.tag());
        let has_artifacts = !txn.backups().is_empty() || !txn.temp_paths().is_empty();
        if has_artifacts {
            store.write(&marker, b"")?;
        }

        let Some(mut txn) = self.active.take() else {
            return Err(CoreError::NoActiveTransaction);
        };
        let txid = txn.id();
        let documents: Vec<PathBuf> = txn.documents().map(Path::to_path_buf).collect();
        let (backups, temps) = txn.drain_artifacts();
        let mut leftover = Vec::new();

        for backup in &backups {
            if let Err(e) = discard_backup(store.as_ref(), backup) {
                warn!(%txid, path = %backup.location.display(), error = %e, "failed to delete backup");
                leftover.push(backup.location.clone());
            }
        }
        for temp in &temps {
            if let Err(e) = store.remove(temp) {
                warn!(%txid, path = %temp.display(), error = %e, "failed to delete temp file");
                leftover.push(temp.clone());
            }
        }
        if has_artifacts && leftover.is_empty() {
            if let Err(e) = store.remove(&marker) {
                warn!(%txid, path = %marker.display(), error = %e, "failed to delete commit marker");
                leftover.push(marker);
            }
        }

        txn.mark_committed();
        if !leftover.is_empty() {
            return Err(CoreError::CommitIncomplete { txid, leftover });
        }

        info!(%txid, label = txn.label(), documents = documents.len(), "committed transaction");
        Ok(CommitSummary {
            txid,
            label: txn.label().to_string(),
            documents,
            elapsed: txn.elapsed(),
        })
    }

    /// Rolls back the active transaction.
    ///
    /// Every touched document is put back: restored from its backup, or
    /// removed if it did not exist before the transaction. Restores are
    /// attempted for every document even after one fails.
    ///
    /// # Errors
    ///
    /// - `NoActiveTransaction` if Idle.
    /// - `RestoreFailed` listing the documents that were not put back; the
    ///   manager is Idle and the backups stay on disk for recovery.
    pub fn rollback(&mut self, reason: &str) -> CoreResult<RollbackSummary> {
        let mut txn = self.active.take().ok_or(CoreError::NoActiveTransaction)?;
        let store = Arc::clone(self.writer.store());
        let txid = txn.id();
        let (backups, temps) = txn.drain_artifacts();

        for temp in &temps {
            if let Err(e) = store.remove(temp) {
                warn!(%txid, path = %temp.display(), error = %e, "failed to delete temp file");
            }
        }

        let mut restored = Vec::new();
        let mut failed = Vec::new();
        for backup in &backups {
            match restore_backup(store.as_ref(), backup) {
                Ok(()) => restored.push(backup.original.clone()),
                Err(e) => {
                    warn!(%txid, path = %backup.original.display(), error = %e, "failed to restore document");
                    failed.push(backup.original.clone());
                }
            }
        }

        txn.mark_rolled_back();
        info!(
            %txid,
            label = txn.label(),
            reason,
            restored = restored.len(),
            failed = failed.len(),
            "rolled back transaction"
        );

        if !failed.is_empty() {
            return Err(CoreError::RestoreFailed { txid, failed });
        }
        Ok(RollbackSummary {
            txid,
            label: txn.label().to_string(),
            reason: reason.to_string(),
            restored,
        })
    }

    /// Resolves artifacts left on disk by an interrupted process.
    ///
    /// # Errors
    ///
    /// Returns `TransactionAlreadyActive` while a transaction is active
    /// (its own artifacts would be mistaken for leftovers), or
    /// `RecoveryIncomplete` if some artifacts could not be resolved.
    pub fn recover(&mut self) -> CoreResult<RecoveryReport> {
        if let Some(active) = &self.active {
            return Err(CoreError::TransactionAlreadyActive {
                active: active.id(),
                label: active.label().to_string(),
            });
        }
        recovery::recover(self.writer.store().as_ref())?.into_result()
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("config", &self.config)
            .field("active", &self.active_id())
            .finish_non_exhaustive()
    }
}
