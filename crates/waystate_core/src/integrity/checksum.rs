//! SHA-256 digests.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Component, Path};

/// Name recorded alongside every digest.
pub const ALGORITHM: &str = "sha256";

/// Returns the lowercase hex SHA-256 digest of `data`.
#[must_use]
pub fn digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Returns the digest of a whole set: SHA-256 over the per-document
/// digests concatenated in ascending path order.
///
/// The digests are ordered by their paths, compared byte-wise as UTF-8,
/// and not by the digest values themselves. Each digest contributes its
/// 64 lowercase hex characters with no separator.
///
/// The map keys are the `/`-separated paths from [`path_key`], so the
/// result does not depend on listing order or platform separators.
#[must_use]
pub fn combined_digest(files: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for digest in files.values() {
        hasher.update(digest.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Returns `path` as a `/`-separated string, the form used as a key in
/// persisted records.
#[must_use]
pub fn path_key(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
