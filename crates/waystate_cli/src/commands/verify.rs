//! Verify command implementation.

use super::profile::Profile;
use std::path::Path;
use tracing::warn;
use waystate_core::integrity::{ChecksumVerification, IssueKind, MismatchKind};
use waystate_core::{IntegrityVerifier, SnapshotStatus, SnapshotVerification};

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of documents and manifest entries checked.
    pub checked: usize,
    /// Problems that fail verification.
    pub errors: Vec<String>,
    /// Problems reported without failing.
    pub warnings: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs the verify command.
pub fn run(root: &Path, profile: &Profile, dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying {:?} under {:?}", dir, root);
    println!();

    let store = super::open_store(root, profile)?;
    let verifier = super::verifier(&store, profile)?;
    let result = verify(&verifier, dir, profile)?;

    for warning in &result.warnings {
        println!("    WARNING: {}", warning);
    }
    for error in &result.errors {
        println!("    ERROR: {}", error);
    }

    println!();
    if result.is_ok() {
        println!("✓ Verification passed ({} checked)", result.checked);
        Ok(())
    } else {
        println!("✗ Verification failed");
        Err("Verification failed".into())
    }
}

/// Checks stored checksums for the profile's files and the directory's manifest.
pub fn verify(
    verifier: &IntegrityVerifier,
    dir: &Path,
    profile: &Profile,
) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let mut result = VerifyResult::default();

    println!("Checking stored checksums...");
    match verifier.verify_checksums(super::tracked_files(dir, profile))? {
        Some(checksums) => record_checksums(&mut result, &checksums),
        None => println!("  No stored checksums (run `waystate checksums` to record them)"),
    }

    println!("Checking snapshot manifest...");
    let snapshot = verifier.verify_snapshot(dir)?;
    record_snapshot(&mut result, &snapshot);

    if !result.is_ok() {
        warn!(
            dir = %dir.display(),
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "verification failed"
        );
    }
    Ok(result)
}

fn record_checksums(result: &mut VerifyResult, checksums: &ChecksumVerification) {
    println!(
        "  Documents checked: {}, mismatched: {}",
        checksums.checked,
        checksums.mismatches.len()
    );
    result.checked += checksums.checked;

    for mismatch in &checksums.mismatches {
        let path = mismatch.path.display();
        match &mismatch.kind {
            MismatchKind::Modified { expected, actual } => result.errors.push(format!(
                "{} modified: expected {}, got {}",
                path, expected, actual
            )),
            MismatchKind::Missing { expected } => result
                .errors
                .push(format!("{} missing (expected {})", path, expected)),
            MismatchKind::Unrecorded { .. } => result
                .warnings
                .push(format!("{} has no stored checksum", path)),
        }
    }
    if !checksums.combined_matches {
        result
            .warnings
            .push("combined checksum differs from the stored one".to_string());
    }
}

fn record_snapshot(result: &mut VerifyResult, snapshot: &SnapshotVerification) {
    if snapshot.status == SnapshotStatus::Unverifiable {
        println!("  No manifest (run `waystate snapshot` to create one)");
        return;
    }
    println!(
        "  Entries checked: {}, errors: {}, warnings: {}",
        snapshot.checked,
        snapshot.errors.len(),
        snapshot.warnings.len()
    );
    result.checked += snapshot.checked;

    for issue in &snapshot.errors {
        result
            .errors
            .push(format!("{} {}", issue.path, describe(issue.kind)));
    }
    for issue in &snapshot.warnings {
        result
            .warnings
            .push(format!("{} {}", issue.path, describe(issue.kind)));
    }
    if snapshot.combined_matches == Some(false) {
        result
            .warnings
            .push("combined checksum differs from the manifest".to_string());
    }
}

fn describe(kind: IssueKind) -> &'static str {
    match kind {
        IssueKind::Missing => "is missing",
        IssueKind::Modified => "was modified",
        IssueKind::Untracked => "is not in the manifest",
    }
}
