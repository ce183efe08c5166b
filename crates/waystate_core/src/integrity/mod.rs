//! Integrity verification.
//!
//! Two persisted records describe what a healthy document set looks like:
//!
//! - A **checksum set** (`.waystate/checksums.json` by default): one SHA-256
//!   digest per tracked document plus a combined digest, refreshed on demand
//!   and compared by [`IntegrityVerifier::verify_checksums`].
//! - A **snapshot manifest** (`manifest.json` inside a snapshot directory):
//!   an immutable description of a directory at one point in time, with
//!   each entry classified as required or optional.
//!
//! Both records go stale silently when a document changes behind the
//! verifier's back; the next verification is what notices.

mod checksum;
mod manifest;
mod record;
mod verifier;

pub use checksum::{combined_digest, digest, path_key, ALGORITHM};
pub use manifest::{Manifest, ManifestEntry, MANIFEST_VERSION};
pub use record::{ChecksumRecord, ChecksumSet};
pub use verifier::{
    ChecksumMismatch, ChecksumVerification, IntegrityVerifier, IssueKind, MismatchKind,
    SnapshotIssue, SnapshotStatus, SnapshotVerification,
};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where integrity records live and how snapshot entries are classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrityConfig {
    /// Path of the checksum set, relative to the store root.
    pub checksum_file: PathBuf,

    /// File name of the manifest inside a snapshot directory.
    pub manifest_file: String,

    /// Name of the subdirectory holding active state. Snapshots cover the
    /// top level of a directory plus everything below this one.
    pub active_dir: String,

    /// Glob patterns, relative to the snapshot directory, naming the
    /// entries whose loss fails verification.
    pub required_patterns: Vec<String>,
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            checksum_file: PathBuf::from(".waystate/checksums.json"),
            manifest_file: "manifest.json".to_string(),
            active_dir: "active".to_string(),
            required_patterns: vec!["*.json".to_string(), "active/**".to_string()],
        }
    }
}
