//! Snapshot manifest structure and serialization.
//!
//! Format:
//! ```json
//! {
//!   "snapshot_id": "20260204T113000Z",
//!   "created": "2026-02-04T11:30:00Z",
//!   "version": 1,
//!   "files": [
//!     { "path": "state.json", "checksum": "9f86d0...", "required": true },
//!     { "path": "notes.md", "checksum": "60303a...", "required": false }
//!   ],
//!   "total_files": 2,
//!   "combined_checksum": "1c5c47..."
//! }
//! ```

use super::checksum::combined_digest;
use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// One file in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the snapshot directory, `/`-separated.
    pub path: String,
    /// Lowercase hex SHA-256 digest.
    pub checksum: String,
    /// Whether losing this file fails verification.
    pub required: bool,
}

/// An immutable description of a directory at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Creation time in basic format (`YYYYMMDDTHHMMSSZ`).
    pub snapshot_id: String,
    /// Creation time (RFC 3339, UTC).
    pub created: String,
    /// Format version, always [`MANIFEST_VERSION`].
    pub version: u32,
    /// Entries in path order.
    pub files: Vec<ManifestEntry>,
    /// Number of entries.
    pub total_files: usize,
    /// Digest over every entry's checksum.
    pub combined_checksum: String,
}

impl Manifest {
    /// Creates a manifest from `entries`, stamped with `now`.
    #[must_use]
    pub fn new(mut entries: Vec<ManifestEntry>, now: DateTime<Utc>) -> Self {
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        let combined_checksum = combined_digest(&checksums(&entries));
        Self {
            snapshot_id: now.format("%Y%m%dT%H%M%SZ").to_string(),
            created: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            version: MANIFEST_VERSION,
            total_files: entries.len(),
            files: entries,
            combined_checksum,
        }
    }

    /// Returns the entry for `path`.
    #[must_use]
    pub fn entry(&self, path: &str) -> Option<&ManifestEntry> {
        self.files.iter().find(|e| e.path == path)
    }

    /// Returns the entries marked required.
    pub fn required(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.files.iter().filter(|e| e.required)
    }

    /// Returns the entries' checksums keyed by path.
    #[must_use]
    pub fn checksums(&self) -> BTreeMap<String, String> {
        checksums(&self.files)
    }

    /// Serializes the manifest to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if serialization fails.
    pub fn to_json(&self) -> CoreResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CoreError::invalid_format(format!("failed to serialize manifest: {e}")))
    }

    /// Parses a manifest from JSON.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if the JSON is malformed, the version is
    /// unknown, or `total_files` disagrees with the entry list.
    pub fn from_json(json: &[u8]) -> CoreResult<Self> {
        let manifest: Self = serde_json::from_slice(json)
            .map_err(|e| CoreError::invalid_format(format!("failed to parse manifest: {e}")))?;
        if manifest.version != MANIFEST_VERSION {
            return Err(CoreError::invalid_format(format!(
                "unsupported manifest version: {}",
                manifest.version
            )));
        }
        if manifest.total_files != manifest.files.len() {
            return Err(CoreError::invalid_format(format!(
                "manifest lists {} files but total_files is {}",
                manifest.files.len(),
                manifest.total_files
            )));
        }
        Ok(manifest)
    }
}

fn checksums(entries: &[ManifestEntry]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|e| (e.path.clone(), e.checksum.clone()))
        .collect()
}
