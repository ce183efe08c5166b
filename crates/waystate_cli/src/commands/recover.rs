//! Recover command implementation.

use super::profile::Profile;
use std::path::Path;
use waystate_core::recovery;
use tracing::{info, warn};
use waystate_core::TransactionManager;

/// Resolves artifacts left under `root` by an interrupted process.
pub fn run(root: &Path, profile: &Profile, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(root, profile)?;
    info!(root = %root.display(), dry_run, "recovering document root");

    if dry_run {
        let pending = recovery::scan(store.as_ref())?;
        if pending.is_empty() {
            println!("Nothing to recover");
            return Ok(());
        }
        println!("Pending artifacts: {}", pending.artifacts.len());
        for artifact in &pending.artifacts {
            println!("  {:?} ({:?} of {:?})", artifact.path, artifact.kind, artifact.document);
        }
        for (marker, tag) in &pending.commit_markers {
            println!("  {:?} (commit of {})", marker, tag);
        }
        println!("Interrupted transactions: {}", pending.transactions().len());
        return Ok(());
    }

    let mut manager = TransactionManager::with_config(store, profile.config());
    let report = manager.recover().inspect_err(|e| {
        warn!(root = %root.display(), error = %e, "recovery left artifacts behind");
    })?;

    if report.is_noop() {
        println!("✓ Nothing to recover");
        return Ok(());
    }
    println!("✓ Recovery complete");
    println!("  Rolled back: {}", report.rolled_back.len());
    println!("  Rolled forward: {}", report.rolled_forward.len());
    for path in &report.restored {
        println!("  Restored: {:?}", path);
    }
    for path in &report.removed {
        println!("  Removed: {:?}", path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn recovers_interrupted_transaction() {
        let root = tempfile::tempdir().unwrap();
        let profile = Profile::from_json(br#"{"sync": false}"#).unwrap();
        fs::write(root.path().join("state.json"), b"old").unwrap();

        let store = super::super::open_store(root.path(), &profile).unwrap();
        let mut manager = TransactionManager::new(store);
        manager.begin("interrupted").unwrap();
        manager.write(Path::new("state.json"), b"new").unwrap();
        drop(manager);

        run(root.path(), &profile, true).unwrap();
        assert_eq!(fs::read(root.path().join("state.json")).unwrap(), b"new");

        run(root.path(), &profile, false).unwrap();
        assert_eq!(fs::read(root.path().join("state.json")).unwrap(), b"old");
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 1);
    }
}
