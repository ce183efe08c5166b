//! Error types for waystate core.

use crate::types::TransactionId;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use waystate_storage::StorageError;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in waystate core operations.
///
/// Write failures (`BackupFailed`, `WriteFailed`, `PublishFailed`,
/// `SourceFailed`) are only returned after the document has been put back
/// exactly as it was found.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The path does not name a document.
    #[error("invalid document path: {}", .path.display())]
    InvalidDocumentPath {
        /// The rejected path.
        path: PathBuf,
    },

    /// The pre-write copy of a document could not be taken.
    #[error(
        "backup of {} failed{}{}: {source}",
        .path.display(),
        in_txn(.txid),
        left_at(.leftover)
    )]
    BackupFailed {
        /// Document being written.
        path: PathBuf,
        /// Owning transaction, if any.
        txid: Option<TransactionId>,
        /// Partial backup that could not be removed; recovery deletes it.
        leftover: Option<PathBuf>,
        /// Underlying storage error.
        source: StorageError,
    },

    /// Writing the new content to the temp file failed.
    #[error("write of {} failed{}: {source}", .path.display(), in_txn(.txid))]
    WriteFailed {
        /// Document being written.
        path: PathBuf,
        /// Owning transaction, if any.
        txid: Option<TransactionId>,
        /// Underlying storage error.
        source: StorageError,
    },

    /// The rename that publishes the temp file failed.
    #[error("publish of {} failed{}: {source}", .path.display(), in_txn(.txid))]
    PublishFailed {
        /// Document being written.
        path: PathBuf,
        /// Owning transaction, if any.
        txid: Option<TransactionId>,
        /// Underlying storage error.
        source: StorageError,
    },

    /// The byte stream or process feeding a write failed.
    #[error("source for {} failed: {source}", .path.display())]
    SourceFailed {
        /// Document that was to be written.
        path: PathBuf,
        /// Underlying error from the source.
        source: io::Error,
    },

    /// `begin` was called while a transaction is active.
    #[error("transaction {active} ({label}) is already active")]
    TransactionAlreadyActive {
        /// The transaction currently active.
        active: TransactionId,
        /// Its label.
        label: String,
    },

    /// `commit` or `rollback` was called with no active transaction.
    #[error("no active transaction")]
    NoActiveTransaction,

    /// Rollback could not restore every document.
    ///
    /// Every restore was attempted; `failed` lists the documents that were
    /// not put back.
    #[error("rollback of {txid} failed to restore {} document(s)", .failed.len())]
    RestoreFailed {
        /// The rolled back transaction.
        txid: TransactionId,
        /// Documents that could not be restored.
        failed: Vec<PathBuf>,
    },

    /// Commit published every write but left artifacts behind.
    #[error("commit of {txid} left {} artifact(s) behind", .leftover.len())]
    CommitIncomplete {
        /// The committed transaction.
        txid: TransactionId,
        /// Backups or temp files that could not be deleted.
        leftover: Vec<PathBuf>,
    },

    /// Startup recovery could not resolve every leftover artifact.
    #[error("recovery left {} artifact(s) unresolved", .failed.len())]
    RecoveryIncomplete {
        /// Artifacts that could not be resolved.
        failed: Vec<PathBuf>,
    },

    /// A persisted checksum record or manifest could not be parsed.
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// A classification pattern could not be compiled.
    #[error("invalid pattern {pattern:?}: {message}")]
    InvalidPattern {
        /// The pattern as configured.
        pattern: String,
        /// Parser message.
        message: String,
    },
}

fn in_txn(txid: &Option<TransactionId>) -> String {
    match txid {
        Some(id) => format!(" in {id}"),
        None => String::new(),
    }
}

fn left_at(leftover: &Option<PathBuf>) -> String {
    match leftover {
        Some(path) => format!(" (partial backup left at {})", path.display()),
        None => String::new(),
    }
}

impl CoreError {
    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Returns true for errors raised by misuse of the transaction state
    /// machine rather than by I/O.
    #[must_use]
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            Self::TransactionAlreadyActive { .. } | Self::NoActiveTransaction
        )
    }
}
