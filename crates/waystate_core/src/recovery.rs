//! Recovery of writes interrupted by a crash.
//!
//! A process that dies mid-write or mid-transaction leaves artifacts beside
//! the documents it was touching. On the next start they are resolved
//! before any new write is trusted:
//!
//! | owner | commit marker | `.bak` | `.new` | `.tmp`, `.bak.tmp` |
//! |---|---|---|---|---|
//! | transaction | absent | restore over document | remove document | delete |
//! | transaction | present | delete | delete | delete |
//! | standalone write | n/a | delete | delete | delete |
//!
//! A standalone write is complete once its rename happened, and harmless
//! before it, so its leftovers are simply discarded. A `.bak.tmp` is a
//! backup that never finished; the document was not touched yet.
//!
//! Backups of one document left by two or more uncommitted transactions
//! cannot be ordered, so neither is restored. They are reported as failed
//! and need to be resolved by hand.

use crate::artifact::{parse_artifact, parse_commit_marker, Artifact, ArtifactKind};
use crate::error::{CoreError, CoreResult};
use crate::types::{TransactionId, WriteTag};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use waystate_storage::DocumentStore;

/// Artifacts found on disk by [`scan`].
#[derive(Debug, Clone, Default)]
pub struct PendingArtifacts {
    /// Backups, temp files and absence markers.
    pub artifacts: Vec<Artifact>,
    /// Commit markers and the tags they belong to.
    pub commit_markers: Vec<(PathBuf, WriteTag)>,
}

impl PendingArtifacts {
    /// Returns true if nothing needs resolving.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty() && self.commit_markers.is_empty()
    }

    /// Returns true if the commit of `tag` had started.
    #[must_use]
    pub fn is_committed(&self, tag: &WriteTag) -> bool {
        self.commit_markers.iter().any(|(_, t)| t == tag)
    }

    /// Returns the distinct transactions that left artifacts behind.
    #[must_use]
    pub fn transactions(&self) -> Vec<TransactionId> {
        let mut seen = Vec::new();
        for id in self.artifacts.iter().filter_map(|a| a.tag.transaction()) {
            if !seen.contains(&id) {
                seen.push(id);
            }
        }
        seen
    }
}

/// Outcome of [`recover`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Interrupted transactions whose documents were restored.
    pub rolled_back: Vec<TransactionId>,
    /// Committed transactions or standalone writes whose leftovers were discarded.
    pub rolled_forward: Vec<WriteTag>,
    /// Documents put back from a backup.
    pub restored: Vec<PathBuf>,
    /// Documents removed because they did not exist before the transaction.
    pub removed: Vec<PathBuf>,
    /// Artifacts that could not be resolved.
    pub failed: Vec<PathBuf>,
}

impl RecoveryReport {
    /// Returns true if there was nothing to recover.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.rolled_back.is_empty() && self.rolled_forward.is_empty() && self.failed.is_empty()
    }

    /// Converts a report with unresolved artifacts into an error.
    ///
    /// # Errors
    ///
    /// Returns `RecoveryIncomplete` listing the artifacts still on disk.
    pub fn into_result(self) -> CoreResult<Self> {
        if self.failed.is_empty() {
            Ok(self)
        } else {
            Err(CoreError::RecoveryIncomplete {
                failed: self.failed,
            })
        }
    }
}

/// Lists every artifact and commit marker in the store.
///
/// # Errors
///
/// Returns a storage error if the store cannot be listed.
pub fn scan(store: &dyn DocumentStore) -> CoreResult<PendingArtifacts> {
    let mut pending = PendingArtifacts::default();
    for path in store.list(Path::new(""))? {
        if let Some(tag) = parse_commit_marker(&path) {
            pending.commit_markers.push((path, tag));
        } else if let Some(artifact) = parse_artifact(&path) {
            pending.artifacts.push(artifact);
        }
    }
    Ok(pending)
}

fn rolls_forward(pending: &PendingArtifacts, artifact: &Artifact) -> bool {
    matches!(artifact.tag, WriteTag::Solo(_)) || pending.is_committed(&artifact.tag)
}

/// Backups and absence markers put a document back; temp files never do.
fn restores(artifact: &Artifact) -> bool {
    matches!(artifact.kind, ArtifactKind::Backup | ArtifactKind::Absent)
}

/// Documents that more than one uncommitted transaction would restore.
fn conflicting_restores(pending: &PendingArtifacts) -> HashSet<&Path> {
    let mut owners: HashMap<&Path, HashSet<WriteTag>> = HashMap::new();
    for artifact in &pending.artifacts {
        if restores(artifact) && !rolls_forward(pending, artifact) {
            owners
                .entry(artifact.document.as_path())
                .or_default()
                .insert(artifact.tag);
        }
    }
    owners
        .into_iter()
        .filter(|(_, tags)| tags.len() > 1)
        .map(|(document, _)| document)
        .collect()
}

/// Resolves every leftover artifact in the store.
///
/// Recovery is best-effort in the same way as rollback: every artifact is
/// visited even if an earlier one fails, and failures are listed in the
/// report rather than aborting.
///
/// # Errors
///
/// Returns a storage error only if the store cannot be listed.
pub fn recover(store: &dyn DocumentStore) -> CoreResult<RecoveryReport> {
    let pending = scan(store)?;
    let mut report = RecoveryReport::default();
    if pending.is_empty() {
        return Ok(report);
    }

    let mut failed_tags: HashSet<WriteTag> = HashSet::new();
    let conflicted = conflicting_restores(&pending);

    for artifact in &pending.artifacts {
        let forward = rolls_forward(&pending, artifact);

        if !forward && conflicted.contains(artifact.document.as_path()) && restores(artifact) {
            warn!(
                path = %artifact.path.display(),
                document = %artifact.document.display(),
                "backups from several interrupted transactions"
            );
            report.failed.push(artifact.path.clone());
            failed_tags.insert(artifact.tag);
            continue;
        }

        let outcome = if forward || !restores(artifact) {
            store.remove(&artifact.path)
        } else if artifact.kind == ArtifactKind::Backup {
            store
                .rename(&artifact.path, &artifact.document)
                .map(|()| report.restored.push(artifact.document.clone()))
        } else {
            store
                .remove(&artifact.document)
                .and_then(|()| store.remove(&artifact.path))
                .map(|()| report.removed.push(artifact.document.clone()))
        };

        if let Err(e) = outcome {
            warn!(path = %artifact.path.display(), error = %e, "failed to resolve artifact");
            report.failed.push(artifact.path.clone());
            failed_tags.insert(artifact.tag);
            continue;
        }

        match artifact.tag {
            WriteTag::Transaction(id) if !forward => {
                if !report.rolled_back.contains(&id) {
                    report.rolled_back.push(id);
                }
            }
            tag => {
                if !report.rolled_forward.contains(&tag) {
                    report.rolled_forward.push(tag);
                }
            }
        }
    }

    for (marker, tag) in &pending.commit_markers {
        if failed_tags.contains(tag) {
            // Keep the marker so the next recovery still rolls forward
            continue;
        }
        match store.remove(marker) {
            Ok(()) => {
                if !report.rolled_forward.contains(tag) {
                    report.rolled_forward.push(*tag);
                }
            }
            Err(e) => {
                warn!(path = %marker.display(), error = %e, "failed to remove commit marker");
                report.failed.push(marker.clone());
            }
        }
    }

    info!(
        rolled_back = report.rolled_back.len(),
        rolled_forward = report.rolled_forward.len(),
        restored = report.restored.len(),
        failed = report.failed.len(),
        "resolved interrupted writes"
    );
    Ok(report)
}
