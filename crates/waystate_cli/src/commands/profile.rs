//! Profile loading.
//!
//! A profile tells the tools what a complete directory looks like:
//!
//! ```json
//! {
//!   "completeness": {
//!     "required_files": ["state.json", "plan.json"],
//!     "optional_files": ["notes.md"],
//!     "required_fields": ["state.json:run_id"],
//!     "important_fields": ["state.json:owner"],
//!     "consistency": {
//!       "current_checkpoint_field": "state.json:checkpoint",
//!       "checkpoint_log": "checkpoints.log"
//!     },
//!     "min_score": 80
//!   },
//!   "integrity": {
//!     "required_patterns": ["*.json", "active/**"]
//!   },
//!   "sync": true
//! }
//! ```
//!
//! Every key is optional.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use waystate_core::{CompletenessConfig, Config, IntegrityConfig};

/// Settings loaded from `--profile`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// What a complete directory holds.
    pub completeness: CompletenessConfig,
    /// Where checksums and manifests live.
    pub integrity: IntegrityConfig,
    /// Fsync writes made by the tools.
    pub sync: bool,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            completeness: CompletenessConfig::default(),
            integrity: IntegrityConfig::default(),
            sync: true,
        }
    }
}

impl Profile {
    /// Loads the profile at `path`, or the default profile without one.
    pub fn load(path: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let data =
            fs::read(path).map_err(|e| format!("Failed to read profile {:?}: {}", path, e))?;
        Self::from_json(&data).map_err(|e| format!("Invalid profile {:?}: {}", path, e).into())
    }

    /// Parses a profile.
    pub fn from_json(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    /// Returns the core config for this profile.
    pub fn config(&self) -> Config {
        Config::new().sync(self.sync).integrity(self.integrity.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_profile_uses_defaults() {
        let profile = Profile::from_json(b"{}").unwrap();
        assert_eq!(profile.completeness, CompletenessConfig::default());
        assert_eq!(profile.completeness.min_score, 80);
        assert!(profile.sync);
    }

    #[test]
    fn partial_profile() {
        let profile = Profile::from_json(
            br#"{
                "completeness": {
                    "required_files": ["state.json"],
                    "required_fields": ["state.json:run_id"],
                    "min_score": 90
                },
                "sync": false
            }"#,
        )
        .unwrap();

        assert_eq!(profile.completeness.required_files, vec!["state.json"]);
        assert!(profile.completeness.optional_files.is_empty());
        assert_eq!(profile.completeness.min_score, 90);
        assert!(!profile.sync);
        assert_eq!(profile.integrity, IntegrityConfig::default());
    }

    #[test]
    fn malformed_profile_is_rejected() {
        assert!(Profile::from_json(b"{\"completeness\": []}").is_err());
    }

    #[test]
    fn missing_profile_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Profile::load(Some(&dir.path().join("absent.json"))).is_err());
        assert!(Profile::load(None).is_ok());
    }
}
