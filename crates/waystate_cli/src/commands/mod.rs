//! CLI command implementations.

pub mod profile;
pub mod recover;
pub mod report;
pub mod score;
pub mod snapshot;
pub mod verify;

use profile::Profile;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use waystate_core::{CompletenessScorer, IntegrityVerifier};
use waystate_storage::DocumentStore;

/// Opens the document root described by `profile`.
pub fn open_store(
    root: &Path,
    profile: &Profile,
) -> Result<Arc<dyn DocumentStore>, Box<dyn std::error::Error>> {
    let store = profile.config().file_store(root)?;
    Ok(Arc::new(store))
}

/// Creates a verifier over `store` with the profile's integrity settings.
pub fn verifier(
    store: &Arc<dyn DocumentStore>,
    profile: &Profile,
) -> Result<IntegrityVerifier, Box<dyn std::error::Error>> {
    Ok(IntegrityVerifier::new(Arc::clone(store), profile.integrity.clone())?)
}

/// Creates a scorer over `store` that also reports integrity.
pub fn scorer(
    store: &Arc<dyn DocumentStore>,
    profile: &Profile,
) -> Result<CompletenessScorer, Box<dyn std::error::Error>> {
    Ok(
        CompletenessScorer::new(Arc::clone(store), profile.completeness.clone())
            .with_verifier(verifier(store, profile)?),
    )
}

/// The profile's required and optional files under `dir`.
pub fn tracked_files(dir: &Path, profile: &Profile) -> Vec<PathBuf> {
    profile
        .completeness
        .required_files
        .iter()
        .chain(&profile.completeness.optional_files)
        .map(|file| dir.join(file))
        .collect()
}
