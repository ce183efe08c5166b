//! Snapshot and checksum commands.

use super::profile::Profile;
use std::path::Path;
use tracing::debug;

/// Writes a manifest for `dir`.
pub fn run(root: &Path, profile: &Profile, dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(root, profile)?;
    let verifier = super::verifier(&store, profile)?;
    let manifest = verifier.create_snapshot_manifest(dir)?;
    debug!(dir = %dir.display(), snapshot_id = %manifest.snapshot_id, "wrote snapshot manifest");

    println!("✓ Snapshot manifest created");
    println!("  Snapshot: {}", manifest.snapshot_id);
    println!("  Files: {}", manifest.total_files);
    println!("  Required: {}", manifest.required().count());
    println!("  Combined: {}", manifest.combined_checksum);
    Ok(())
}

/// Stores checksums for the profile's files under `dir`.
pub fn store_checksums(
    root: &Path,
    profile: &Profile,
    dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(root, profile)?;
    let verifier = super::verifier(&store, profile)?;
    let files = super::tracked_files(dir, profile);
    if files.is_empty() {
        return Err("Profile lists no files to checksum".into());
    }
    let set = verifier.store_checksums(&files)?;
    debug!(dir = %dir.display(), files = set.len(), "stored checksums");

    println!("✓ Checksums stored");
    println!("  Path: {:?}", root.join(&profile.integrity.checksum_file));
    println!("  Files: {} of {}", set.len(), files.len());
    println!("  Combined: {}", set.combined);
    Ok(())
}
