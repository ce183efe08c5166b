//! # Waystate Core
//!
//! Crash-safe persistence for small sets of state documents.
//!
//! This crate provides:
//! - Atomic single-document writes (write-then-rename with backup)
//! - Transactions that restore every touched document on rollback
//! - Recovery of writes interrupted by a crash
//! - SHA-256 checksum sets and snapshot manifests
//! - A completeness score that gates trust in recovered state
//!
//! ## Example
//!
//! ```rust
//! use std::path::Path;
//! use std::sync::Arc;
//! use waystate_core::{Config, TransactionManager};
//! use waystate_storage::{DocumentStore, InMemoryStore};
//!
//! let store = Arc::new(InMemoryStore::new());
//! let mut manager = TransactionManager::open(store.clone(), Config::default()).unwrap();
//!
//! manager.begin("checkpoint").unwrap();
//! manager.write(Path::new("state.json"), br#"{"phase":"build"}"#).unwrap();
//! manager.append_line(Path::new("checkpoints.log"), "cp-1").unwrap();
//! manager.commit().unwrap();
//!
//! assert!(store.exists(Path::new("state.json")));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod artifact;
pub mod completeness;
mod config;
mod error;
pub mod integrity;
pub mod recovery;
mod transaction;
mod types;
mod writer;

pub use completeness::{
    ChecksumStatus, CompletenessConfig, CompletenessReport, CompletenessScorer, ConsistencyRule,
    FieldLookup, JsonFieldLookup,
};
pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use integrity::{
    ChecksumSet, ChecksumVerification, IntegrityConfig, IntegrityVerifier, Manifest,
    SnapshotStatus, SnapshotVerification,
};
pub use recovery::RecoveryReport;
pub use transaction::{
    Backup, CommitSummary, RollbackSummary, Transaction, TransactionGuard, TransactionManager,
    TransactionState,
};
pub use types::{TransactionId, WriteTag};
pub use writer::AtomicWriter;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
