//! Report command implementation.

use super::profile::Profile;
use std::path::Path;

/// Runs the report command.
pub fn run(
    root: &Path,
    profile: &Profile,
    dir: &Path,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(root, profile)?;
    let scorer = super::scorer(&store, profile)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&scorer.report_json(dir))?),
        "text" => print!("{}", scorer.report_text(dir)),
        other => return Err(format!("Unknown format: {} (expected text or json)", other).into()),
    }
    Ok(())
}
