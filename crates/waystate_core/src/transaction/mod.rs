//! Transactions over atomic writes.
//!
//! A transaction groups writes so that they stand or fall together:
//! - **Publication**: each write is published immediately and atomically
//! - **Rollback**: every touched document returns to its pre-transaction
//!   content, or is removed if it did not exist
//! - **Commit**: backups and temp files are deleted, leaving no trace
//! - **Recovery**: a crash mid-transaction is resolved on the next open

mod guard;
mod manager;
mod state;

pub use guard::TransactionGuard;
pub use manager::{CommitSummary, RollbackSummary, TransactionManager};
pub use state::{Backup, Transaction, TransactionState};
