//! Score command implementation.

use super::profile::Profile;
use std::path::Path;

/// Runs the score command.
///
/// With `check`, a score below the profile's minimum is an error so the
/// process exits non-zero.
pub fn run(
    root: &Path,
    profile: &Profile,
    dir: &Path,
    check: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(root, profile)?;
    let scorer = super::scorer(&store, profile)?;
    let score = scorer.score(dir);
    println!("{}", score);

    if check {
        check_minimum(score, profile.completeness.min_score)?;
    }
    Ok(())
}

fn check_minimum(score: u32, min_score: u32) -> Result<(), String> {
    if score < min_score {
        return Err(format!("Score {} is below the minimum of {}", score, min_score));
    }
    Ok(())
}
