//! The completeness scorer.

use super::config::CompletenessConfig;
use super::fields::{FieldLookup, JsonFieldLookup};
use super::report::{ChecksumStatus, CompletenessReport};
use crate::integrity::{IntegrityVerifier, MismatchKind, SnapshotStatus};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use waystate_storage::DocumentStore;

/// Returns `⌊weight·present/total⌋`, or the full weight for an empty list.
#[must_use]
pub const fn ratio_score(weight: u32, present: usize, total: usize) -> u32 {
    if total == 0 {
        return weight;
    }
    (weight as usize * present / total) as u32
}

/// Combines file presence counts into a 0-100 score.
#[must_use]
pub const fn file_score(
    required_present: usize,
    required: usize,
    optional_present: usize,
    optional: usize,
) -> u32 {
    ratio_score(70, required_present, required) + ratio_score(30, optional_present, optional)
}

/// Combines field presence counts into a 0-100 score.
#[must_use]
pub const fn field_score(
    required_present: usize,
    required: usize,
    important_present: usize,
    important: usize,
) -> u32 {
    ratio_score(60, required_present, required) + ratio_score(40, important_present, important)
}

/// Combines the file and field scores into the overall score.
#[must_use]
pub const fn overall_score(file_score: u32, field_score: u32) -> u32 {
    40 * file_score / 100 + 60 * field_score / 100
}

/// Scores how much of the expected state a directory holds.
///
/// The scorer never fails: unreadable or corrupt documents count as
/// missing, and integrity errors surface as [`ChecksumStatus::Failed`].
///
/// # Example
///
/// ```rust
/// use std::path::Path;
/// use std::sync::Arc;
/// use waystate_core::{CompletenessConfig, CompletenessScorer};
/// use waystate_storage::InMemoryStore;
///
/// let store = Arc::new(InMemoryStore::with_documents([
///     ("state.json", br#"{"id": "run-1"}"#.to_vec()),
/// ]));
/// let config = CompletenessConfig::new()
///     .required_files(["state.json"])
///     .required_fields(["state.json:id"]);
/// let scorer = CompletenessScorer::new(store, config);
/// assert_eq!(scorer.score(Path::new("")), 100);
/// ```
pub struct CompletenessScorer {
    store: Arc<dyn DocumentStore>,
    config: CompletenessConfig,
    lookup: Box<dyn FieldLookup>,
    verifier: Option<IntegrityVerifier>,
}

impl CompletenessScorer {
    /// Creates a scorer that looks fields up in JSON documents and has no
    /// integrity verifier.
    pub fn new(store: Arc<dyn DocumentStore>, config: CompletenessConfig) -> Self {
        Self {
            store,
            config,
            lookup: Box::new(JsonFieldLookup),
            verifier: None,
        }
    }

    /// Replaces the field lookup.
    #[must_use]
    pub fn with_lookup(mut self, lookup: impl FieldLookup + 'static) -> Self {
        self.lookup = Box::new(lookup);
        self
    }

    /// Surfaces this verifier's results as `checksum_ok`.
    #[must_use]
    pub fn with_verifier(mut self, verifier: IntegrityVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &CompletenessConfig {
        &self.config
    }

    /// Returns the overall score of `dir`.
    #[must_use]
    pub fn score(&self, dir: &Path) -> u32 {
        self.calculate_completeness_score(dir)
    }

    /// Returns the overall score of `dir`.
    #[must_use]
    pub fn calculate_completeness_score(&self, dir: &Path) -> u32 {
        let (files, _, _) = self.files(dir);
        let (fields, _, _) = self.fields(dir);
        overall_score(files, fields)
    }

    /// Returns true if the score of `dir` reaches `min_score`.
    #[must_use]
    pub fn is_complete(&self, dir: &Path, min_score: u32) -> bool {
        self.score(dir) >= min_score
    }

    /// Returns the full report for `dir`.
    #[must_use]
    pub fn report(&self, dir: &Path) -> CompletenessReport {
        let (file_score, missing_required_files, missing_optional_files) = self.files(dir);
        let (field_score, missing_required_fields, missing_important_fields) = self.fields(dir);
        let score = overall_score(file_score, field_score);
        let consistency_ok = self.check_consistency(dir);
        let checksum_ok = self.checksum_status(dir);

        debug!(
            dir = %dir.display(),
            score,
            file_score,
            field_score,
            consistency_ok,
            checksum = %checksum_ok,
            "scored directory"
        );

        CompletenessReport {
            score,
            file_score,
            field_score,
            missing_required_files,
            missing_optional_files,
            missing_required_fields,
            missing_important_fields,
            consistency_ok,
            checksum_ok,
            min_score: self.config.min_score,
        }
    }

    /// Returns the human-readable report for `dir`.
    #[must_use]
    pub fn report_text(&self, dir: &Path) -> String {
        self.report(dir).render_text()
    }

    /// Returns the JSON report for `dir`.
    #[must_use]
    pub fn report_json(&self, dir: &Path) -> Value {
        self.report(dir).to_json()
    }

    /// Checks that the current checkpoint of `dir` appears in its
    /// checkpoint log. Without a configured rule every directory is
    /// consistent.
    #[must_use]
    pub fn check_consistency(&self, dir: &Path) -> bool {
        let Some(rule) = &self.config.consistency else {
            return true;
        };
        let Some(current) =
            self.lookup
                .resolve(self.store.as_ref(), dir, &rule.current_checkpoint_field)
        else {
            return true;
        };
        let current = current.trim();

        match self.store.read(&dir.join(&rule.checkpoint_log)) {
            Ok(data) => String::from_utf8_lossy(&data)
                .lines()
                .map(str::trim)
                .any(|line| !line.is_empty() && line == current),
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "checkpoint log unreadable");
                false
            }
        }
    }

    /// Returns the integrity outcome for `dir`.
    ///
    /// Stored checksums are compared for the configured files, and the
    /// directory's own manifest is verified if it has one. Files present
    /// but never recorded do not fail the check.
    #[must_use]
    pub fn checksum_status(&self, dir: &Path) -> ChecksumStatus {
        let Some(verifier) = &self.verifier else {
            return ChecksumStatus::Unknown;
        };
        let mut outcomes = Vec::new();

        let documents: Vec<PathBuf> = self
            .config
            .required_files
            .iter()
            .chain(&self.config.optional_files)
            .map(|f| dir.join(f))
            .collect();
        match verifier.verify_checksums(&documents) {
            Ok(Some(result)) => {
                let changed = result
                    .mismatches
                    .iter()
                    .any(|m| !matches!(m.kind, MismatchKind::Unrecorded { .. }));
                outcomes.push(!changed && result.combined_matches);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "checksum verification failed");
                outcomes.push(false);
            }
        }

        match verifier.verify_snapshot(dir) {
            Ok(result) => match result.status {
                SnapshotStatus::Verified => outcomes.push(true),
                SnapshotStatus::Failed => outcomes.push(false),
                SnapshotStatus::Unverifiable => {}
            },
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "manifest verification failed");
                outcomes.push(false);
            }
        }

        if outcomes.contains(&false) {
            ChecksumStatus::Failed
        } else if outcomes.is_empty() {
            ChecksumStatus::Unknown
        } else {
            ChecksumStatus::Verified
        }
    }

    fn files(&self, dir: &Path) -> (u32, Vec<String>, Vec<String>) {
        let missing = |files: &[String]| -> Vec<String> {
            files
                .iter()
                .filter(|f| !self.store.exists(&dir.join(f)))
                .cloned()
                .collect()
        };
        let required = missing(&self.config.required_files);
        let optional = missing(&self.config.optional_files);
        let score = file_score(
            self.config.required_files.len() - required.len(),
            self.config.required_files.len(),
            self.config.optional_files.len() - optional.len(),
            self.config.optional_files.len(),
        );
        (score, required, optional)
    }

    fn fields(&self, dir: &Path) -> (u32, Vec<String>, Vec<String>) {
        let missing = |fields: &[String]| -> Vec<String> {
            fields
                .iter()
                .filter(|f| self.lookup.resolve(self.store.as_ref(), dir, f).is_none())
                .cloned()
                .collect()
        };
        let required = missing(&self.config.required_fields);
        let important = missing(&self.config.important_fields);
        let score = field_score(
            self.config.required_fields.len() - required.len(),
            self.config.required_fields.len(),
            self.config.important_fields.len() - important.len(),
            self.config.important_fields.len(),
        );
        (score, required, important)
    }
}

impl std::fmt::Debug for CompletenessScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletenessScorer")
            .field("config", &self.config)
            .field("verifier", &self.verifier)
            .finish_non_exhaustive()
    }
}
