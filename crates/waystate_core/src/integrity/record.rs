//! The persisted checksum set.
//!
//! Format:
//! ```json
//! {
//!   "generated": "2026-02-04T11:30:00Z",
//!   "algorithm": "sha256",
//!   "files": {
//!     "state.json": "9f86d0...",
//!     "active/session.json": "60303a..."
//!   },
//!   "combined": "1c5c47..."
//! }
//! ```

use super::checksum::{combined_digest, ALGORITHM};
use crate::error::{CoreError, CoreResult};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The digest of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumRecord {
    /// Document path.
    pub path: PathBuf,
    /// Always [`ALGORITHM`].
    pub algorithm: String,
    /// Lowercase hex digest.
    pub digest: String,
}

/// Digests of a tracked document set plus one combined digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumSet {
    /// When the set was computed (RFC 3339, UTC).
    pub generated: String,
    /// Digest algorithm.
    pub algorithm: String,
    /// Digest per document, keyed by `/`-separated path.
    pub files: BTreeMap<String, String>,
    /// Digest over all of `files`.
    pub combined: String,
}

impl ChecksumSet {
    /// Creates a set stamped with the current time.
    #[must_use]
    pub fn new(files: BTreeMap<String, String>) -> Self {
        let combined = combined_digest(&files);
        Self {
            generated: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            algorithm: ALGORITHM.to_string(),
            files,
            combined,
        }
    }

    /// Returns the stored digest for `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    /// Returns the number of recorded documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if no documents are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Returns one record per document, in path order.
    #[must_use]
    pub fn records(&self) -> Vec<ChecksumRecord> {
        self.files
            .iter()
            .map(|(path, digest)| ChecksumRecord {
                path: PathBuf::from(path),
                algorithm: self.algorithm.clone(),
                digest: digest.clone(),
            })
            .collect()
    }

    /// Serializes the set to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if serialization fails.
    pub fn to_json(&self) -> CoreResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CoreError::invalid_format(format!("failed to serialize checksums: {e}")))
    }

    /// Parses a set from JSON.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if the JSON is malformed or names an
    /// algorithm other than [`ALGORITHM`].
    pub fn from_json(json: &[u8]) -> CoreResult<Self> {
        let set: Self = serde_json::from_slice(json)
            .map_err(|e| CoreError::invalid_format(format!("failed to parse checksums: {e}")))?;
        if set.algorithm != ALGORITHM {
            return Err(CoreError::invalid_format(format!(
                "unsupported checksum algorithm: {}",
                set.algorithm
            )));
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity::digest;

    fn create_test_set() -> ChecksumSet {
        let mut files = BTreeMap::new();
        files.insert("state.json".to_string(), digest(b"{}"));
        files.insert("active/session.json".to_string(), digest(b"[]"));
        ChecksumSet::new(files)
    }

    #[test]
    fn set_has_combined_digest() {
        let set = create_test_set();
        assert_eq!(set.algorithm, "sha256");
        assert_eq!(set.len(), 2);
        assert_eq!(set.combined, combined_digest(&set.files));
        assert!(set.generated.ends_with('Z'));
    }

    #[test]
    fn json_shape() {
        let set = create_test_set();
        let value: serde_json::Value = serde_json::from_str(&set.to_json().unwrap()).unwrap();
        assert!(value["generated"].is_string());
        assert_eq!(value["algorithm"], "sha256");
        assert_eq!(value["files"]["state.json"], digest(b"{}"));
        assert_eq!(value["combined"], set.combined);
    }

    #[test]
    fn parse_written_json() {
        let set = create_test_set();
        let parsed = ChecksumSet::from_json(set.to_json().unwrap().as_bytes()).unwrap();
        assert_eq!(parsed, set);
    }

    #[test]
    fn reject_other_algorithm() {
        let json = br#"{"generated":"x","algorithm":"md5","files":{},"combined":""}"#;
        assert!(matches!(
            ChecksumSet::from_json(json),
            Err(CoreError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn reject_garbage() {
        assert!(ChecksumSet::from_json(b"not json").is_err());
    }

    #[test]
    fn records_in_path_order() {
        let records = create_test_set().records();
        assert_eq!(records[0].path, PathBuf::from("active/session.json"));
        assert_eq!(records[1].path, PathBuf::from("state.json"));
    }
}
