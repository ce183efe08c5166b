//! Scorer configuration.

use serde::{Deserialize, Serialize};

/// Score at or above which state counts as complete.
pub const DEFAULT_MIN_SCORE: u32 = 80;

/// What a complete directory holds.
///
/// File entries are paths relative to the scored directory. Field entries
/// are identifiers understood by the scorer's
/// [`FieldLookup`](super::FieldLookup); for [`JsonFieldLookup`](super::JsonFieldLookup)
/// that is `<document>:<dotted.key>`.
///
/// Deserializes from a JSON profile; missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletenessConfig {
    /// Files that must exist.
    pub required_files: Vec<String>,
    /// Files that should exist.
    pub optional_files: Vec<String>,
    /// Fields that must hold a value.
    pub required_fields: Vec<String>,
    /// Fields that should hold a value.
    pub important_fields: Vec<String>,
    /// Checkpoint consistency rule, if any.
    pub consistency: Option<ConsistencyRule>,
    /// Minimum score for [`CompletenessReport::is_complete`](super::CompletenessReport::is_complete).
    pub min_score: u32,
}

impl Default for CompletenessConfig {
    fn default() -> Self {
        Self {
            required_files: Vec::new(),
            optional_files: Vec::new(),
            required_fields: Vec::new(),
            important_fields: Vec::new(),
            consistency: None,
            min_score: DEFAULT_MIN_SCORE,
        }
    }
}

impl CompletenessConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the required files.
    #[must_use]
    pub fn required_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_files = files.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the optional files.
    #[must_use]
    pub fn optional_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional_files = files.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the required fields.
    #[must_use]
    pub fn required_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the important fields.
    #[must_use]
    pub fn important_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.important_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the consistency rule.
    #[must_use]
    pub fn consistency(mut self, rule: ConsistencyRule) -> Self {
        self.consistency = Some(rule);
        self
    }

    /// Sets the minimum score.
    #[must_use]
    pub const fn min_score(mut self, score: u32) -> Self {
        self.min_score = score;
        self
    }
}

/// The current checkpoint must appear in the checkpoint log.
///
/// No recorded checkpoint is consistent; a recorded checkpoint with no log
/// is not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyRule {
    /// Field holding the current checkpoint identifier.
    pub current_checkpoint_field: String,
    /// Line-oriented, append-only log of checkpoint identifiers.
    pub checkpoint_log: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_min_score() {
        assert_eq!(CompletenessConfig::default().min_score, 80);
    }

    #[test]
    fn profile_with_missing_keys() {
        let config: CompletenessConfig = serde_json::from_str(
            r#"{
                "required_files": ["state.json"],
                "consistency": {
                    "current_checkpoint_field": "state.json:checkpoint",
                    "checkpoint_log": "checkpoints.log"
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.required_files, vec!["state.json".to_string()]);
        assert!(config.optional_files.is_empty());
        assert_eq!(config.min_score, DEFAULT_MIN_SCORE);
        assert_eq!(config.consistency.unwrap().checkpoint_log, "checkpoints.log");
    }

    #[test]
    fn builder_pattern() {
        let config = CompletenessConfig::new()
            .required_files(["a", "b"])
            .important_fields(["a:x"])
            .min_score(50);
        assert_eq!(config.required_files.len(), 2);
        assert_eq!(config.important_fields, vec!["a:x".to_string()]);
        assert_eq!(config.min_score, 50);
    }
}
