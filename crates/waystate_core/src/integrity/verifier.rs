//! Checksum and manifest verification.

use super::checksum::{combined_digest, digest, path_key};
use super::manifest::{Manifest, ManifestEntry};
use super::record::ChecksumSet;
use super::IntegrityConfig;
use crate::artifact::is_internal;
use crate::error::{CoreError, CoreResult};
use crate::writer::AtomicWriter;
use chrono::Utc;
use glob::{MatchOptions, Pattern};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use waystate_storage::DocumentStore;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// How a tracked document differs from its stored digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MismatchKind {
    /// The content changed.
    Modified {
        /// Stored digest.
        expected: String,
        /// Current digest.
        actual: String,
    },
    /// The document is gone.
    Missing {
        /// Stored digest.
        expected: String,
    },
    /// The document exists but no digest was stored for it.
    Unrecorded {
        /// Current digest.
        actual: String,
    },
}

/// One document that failed checksum verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumMismatch {
    /// Document path.
    pub path: PathBuf,
    /// What differs.
    pub kind: MismatchKind,
}

/// Result of [`IntegrityVerifier::verify_checksums`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumVerification {
    /// Documents that differ from the stored set.
    pub mismatches: Vec<ChecksumMismatch>,
    /// Whether the stored combined digest still matches the recorded
    /// documents as they are now.
    pub combined_matches: bool,
    /// Number of documents checked.
    pub checked: usize,
}

impl ChecksumVerification {
    /// Returns true if nothing differs.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.mismatches.is_empty() && self.combined_matches
    }

    /// Returns the mismatched paths.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.mismatches.iter().map(|m| m.path.as_path())
    }
}

/// Overall outcome of a snapshot verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotStatus {
    /// Every required entry is present and unchanged.
    Verified,
    /// A required entry is missing or changed.
    Failed,
    /// The directory has no manifest; treated as valid.
    Unverifiable,
}

/// What is wrong with one snapshot entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    /// Listed in the manifest but not on disk.
    Missing,
    /// Content differs from the manifest.
    Modified,
    /// On disk but not listed in the manifest.
    Untracked,
}

/// One finding of a snapshot verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotIssue {
    /// Path relative to the snapshot directory.
    pub path: String,
    /// What is wrong.
    pub kind: IssueKind,
    /// Whether the entry is required.
    pub required: bool,
}

/// Result of [`IntegrityVerifier::verify_snapshot_manifest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotVerification {
    /// Overall outcome.
    pub status: SnapshotStatus,
    /// Required entries missing or changed.
    pub errors: Vec<SnapshotIssue>,
    /// Optional entries missing or changed, and untracked files.
    pub warnings: Vec<SnapshotIssue>,
    /// Whether the combined checksum matches; `None` without a manifest.
    pub combined_matches: Option<bool>,
    /// Number of manifest entries checked.
    pub checked: usize,
}

impl SnapshotVerification {
    fn unverifiable() -> Self {
        Self {
            status: SnapshotStatus::Unverifiable,
            errors: Vec::new(),
            warnings: Vec::new(),
            combined_matches: None,
            checked: 0,
        }
    }

    /// Returns true unless a required entry failed. A snapshot without a
    /// manifest is valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.status != SnapshotStatus::Failed
    }

    /// Returns true only if a manifest was checked and passed.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.status == SnapshotStatus::Verified
    }
}

/// Computes, stores and compares digests over a document store.
pub struct IntegrityVerifier {
    store: Arc<dyn DocumentStore>,
    writer: AtomicWriter,
    config: IntegrityConfig,
    required: Vec<Pattern>,
}

impl IntegrityVerifier {
    /// Creates a verifier over `store`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPattern` if a required pattern does not compile.
    pub fn new(store: Arc<dyn DocumentStore>, config: IntegrityConfig) -> CoreResult<Self> {
        let required = config
            .required_patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| CoreError::InvalidPattern {
                    pattern: p.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(Self {
            writer: AtomicWriter::new(Arc::clone(&store)),
            store,
            config,
            required,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &IntegrityConfig {
        &self.config
    }

    /// Returns the digest of `path`, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns a storage error other than not-found.
    pub fn calculate_checksum(&self, path: &Path) -> CoreResult<Option<String>> {
        match self.store.read(path) {
            Ok(data) => Ok(Some(digest(&data))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Computes the checksum set of `documents` without storing it.
    /// Absent documents are left out.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a document cannot be read.
    pub fn checksum_set<I, P>(&self, documents: I) -> CoreResult<ChecksumSet>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut files = BTreeMap::new();
        for path in documents {
            let path = path.as_ref();
            if let Some(d) = self.calculate_checksum(path)? {
                files.insert(path_key(path), d);
            }
        }
        Ok(ChecksumSet::new(files))
    }

    /// Computes the checksum set of `documents` and persists it to
    /// `config.checksum_file` through an atomic write.
    ///
    /// # Errors
    ///
    /// Returns a storage or write error.
    pub fn store_checksums<I, P>(&self, documents: I) -> CoreResult<ChecksumSet>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let set = self.checksum_set(documents)?;
        self.writer
            .write(&self.config.checksum_file, set.to_json()?.as_bytes())?;
        info!(
            files = set.len(),
            combined = %set.combined,
            path = %self.config.checksum_file.display(),
            "stored checksums"
        );
        Ok(set)
    }

    /// Loads the stored checksum set, or `None` if none was stored.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if the stored set cannot be parsed.
    pub fn load_checksums(&self) -> CoreResult<Option<ChecksumSet>> {
        match self.store.read(&self.config.checksum_file) {
            Ok(data) => ChecksumSet::from_json(&data).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Compares `documents` against the stored checksum set.
    ///
    /// Returns `None` if no set has been stored.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if the stored set cannot be parsed, or a
    /// storage error if a document cannot be read.
    pub fn verify_checksums<I, P>(&self, documents: I) -> CoreResult<Option<ChecksumVerification>>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let Some(stored) = self.load_checksums()? else {
            return Ok(None);
        };

        let mut mismatches = Vec::new();
        let mut checked = 0;
        for path in documents {
            let path = path.as_ref();
            checked += 1;
            let actual = self.calculate_checksum(path)?;
            let kind = match (stored.get(&path_key(path)), actual) {
                (Some(expected), Some(actual)) if expected != actual => MismatchKind::Modified {
                    expected: expected.to_string(),
                    actual,
                },
                (Some(expected), None) => MismatchKind::Missing {
                    expected: expected.to_string(),
                },
                (None, Some(actual)) => MismatchKind::Unrecorded { actual },
                _ => continue,
            };
            mismatches.push(ChecksumMismatch {
                path: path.to_path_buf(),
                kind,
            });
        }

        let mut current = BTreeMap::new();
        for key in stored.files.keys() {
            if let Some(d) = self.calculate_checksum(Path::new(key))? {
                current.insert(key.clone(), d);
            }
        }
        let combined_matches = combined_digest(&current) == stored.combined;

        if !mismatches.is_empty() || !combined_matches {
            warn!(
                mismatches = mismatches.len(),
                combined_matches, "checksum verification found differences"
            );
        }
        Ok(Some(ChecksumVerification {
            mismatches,
            combined_matches,
            checked,
        }))
    }

    /// Returns true if `path`, relative to a snapshot directory, matches a
    /// required pattern.
    #[must_use]
    pub fn is_required(&self, path: &str) -> bool {
        self.required
            .iter()
            .any(|p| p.matches_with(path, MATCH_OPTIONS))
    }

    /// Lists the files a snapshot of `dir` covers, relative to `dir`: the
    /// top-level files and everything under the active-state directory.
    ///
    /// # Errors
    ///
    /// Returns a storage error if `dir` cannot be listed.
    pub fn snapshot_files(&self, dir: &Path) -> CoreResult<Vec<String>> {
        let active = format!("{}/", self.config.active_dir);
        let mut files = Vec::new();
        for path in self.store.list(dir)? {
            if is_internal(&path) || path == self.config.checksum_file {
                continue;
            }
            let Ok(relative) = path.strip_prefix(dir) else {
                continue;
            };
            let key = path_key(relative);
            let top_level = !key.contains('/');
            if key == self.config.manifest_file || !(top_level || key.starts_with(&active)) {
                continue;
            }
            files.push(key);
        }
        Ok(files)
    }

    /// Creates a manifest of `dir` and persists it as
    /// `dir/<manifest_file>` through an atomic write.
    ///
    /// # Errors
    ///
    /// Returns a storage or write error.
    pub fn create_snapshot_manifest(&self, dir: &Path) -> CoreResult<Manifest> {
        let mut entries = Vec::new();
        for key in self.snapshot_files(dir)? {
            let data = self.store.read(&dir.join(&key))?;
            entries.push(ManifestEntry {
                required: self.is_required(&key),
                checksum: digest(&data),
                path: key,
            });
        }

        let manifest = Manifest::new(entries, Utc::now());
        self.writer.write(
            &dir.join(&self.config.manifest_file),
            manifest.to_json()?.as_bytes(),
        )?;
        info!(
            dir = %dir.display(),
            snapshot_id = %manifest.snapshot_id,
            files = manifest.total_files,
            "created snapshot manifest"
        );
        Ok(manifest)
    }

    /// Loads the manifest of `dir`, or `None` if it has none.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if the manifest cannot be parsed.
    pub fn load_manifest(&self, dir: &Path) -> CoreResult<Option<Manifest>> {
        match self.store.read(&dir.join(&self.config.manifest_file)) {
            Ok(data) => Manifest::from_json(&data).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Verifies `dir` against its own manifest. A directory without a
    /// manifest is [`SnapshotStatus::Unverifiable`], not an error.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if the manifest cannot be parsed, or a
    /// storage error.
    pub fn verify_snapshot(&self, dir: &Path) -> CoreResult<SnapshotVerification> {
        match self.load_manifest(dir)? {
            Some(manifest) => self.verify_snapshot_manifest(dir, &manifest),
            None => {
                debug!(dir = %dir.display(), "no manifest, snapshot is unverifiable");
                Ok(SnapshotVerification::unverifiable())
            }
        }
    }

    /// Verifies `dir` against `manifest`.
    ///
    /// A missing or changed required entry fails verification; the same
    /// for an optional entry, or a file the manifest does not list, is a
    /// warning. A combined-checksum mismatch is reported but does not fail
    /// verification on its own.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a file cannot be read.
    pub fn verify_snapshot_manifest(
        &self,
        dir: &Path,
        manifest: &Manifest,
    ) -> CoreResult<SnapshotVerification> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut current = BTreeMap::new();

        for entry in &manifest.files {
            let actual = self.calculate_checksum(&dir.join(&entry.path))?;
            let kind = match actual {
                None => Some(IssueKind::Missing),
                Some(d) => {
                    let changed = d != entry.checksum;
                    current.insert(entry.path.clone(), d);
                    changed.then_some(IssueKind::Modified)
                }
            };
            if let Some(kind) = kind {
                let issue = SnapshotIssue {
                    path: entry.path.clone(),
                    kind,
                    required: entry.required,
                };
                if entry.required {
                    errors.push(issue);
                } else {
                    warnings.push(issue);
                }
            }
        }

        for key in self.snapshot_files(dir)? {
            if manifest.entry(&key).is_none() {
                warnings.push(SnapshotIssue {
                    required: self.is_required(&key),
                    path: key,
                    kind: IssueKind::Untracked,
                });
            }
        }

        let combined_matches = combined_digest(&current) == manifest.combined_checksum;
        let status = if errors.is_empty() {
            SnapshotStatus::Verified
        } else {
            SnapshotStatus::Failed
        };

        if status == SnapshotStatus::Failed {
            warn!(
                dir = %dir.display(),
                snapshot_id = %manifest.snapshot_id,
                errors = errors.len(),
                warnings = warnings.len(),
                "snapshot verification failed"
            );
        } else {
            debug!(
                dir = %dir.display(),
                snapshot_id = %manifest.snapshot_id,
                warnings = warnings.len(),
                combined_matches,
                "snapshot verified"
            );
        }

        Ok(SnapshotVerification {
            status,
            errors,
            warnings,
            combined_matches: Some(combined_matches),
            checked: manifest.files.len(),
        })
    }
}

impl std::fmt::Debug for IntegrityVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrityVerifier")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
