//! Completeness reports.

use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;

/// Integrity outcome surfaced next to the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumStatus {
    /// Stored checksums or the manifest matched.
    Verified,
    /// A tracked document or required snapshot entry differs.
    Failed,
    /// Nothing to verify against.
    Unknown,
}

impl ChecksumStatus {
    /// Returns the status as a tri-state boolean.
    #[must_use]
    pub const fn as_bool(self) -> Option<bool> {
        match self {
            Self::Verified => Some(true),
            Self::Failed => Some(false),
            Self::Unknown => None,
        }
    }

    /// Returns the lowercase name used in reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ChecksumStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The score of a directory and what held it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletenessReport {
    /// Overall score, 0-100.
    pub score: u32,
    /// File presence score, 0-100.
    pub file_score: u32,
    /// Field presence score, 0-100.
    pub field_score: u32,
    /// Required files that are absent.
    pub missing_required_files: Vec<String>,
    /// Optional files that are absent.
    pub missing_optional_files: Vec<String>,
    /// Required fields with no value.
    pub missing_required_fields: Vec<String>,
    /// Important fields with no value.
    pub missing_important_fields: Vec<String>,
    /// Whether the current checkpoint appears in the checkpoint log.
    pub consistency_ok: bool,
    /// Integrity outcome.
    pub checksum_ok: ChecksumStatus,
    /// Score needed to count as complete.
    pub min_score: u32,
}

impl CompletenessReport {
    /// Returns true if the score reaches `min_score`.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.score >= self.min_score
    }

    /// Returns the human-readable report; same as the `Display` output.
    #[must_use]
    pub fn render_text(&self) -> String {
        self.to_string()
    }

    /// Returns the report in the JSON shape recovery tooling consumes.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "score": self.score,
            "file_score": self.file_score,
            "state_score": self.field_score,
            "missing_files": self.missing_required_files,
            "missing_fields": self.missing_required_fields,
            "consistency": self.consistency_ok,
            "is_complete": self.is_complete(),
            "checksum": self.checksum_ok,
        })
    }
}

impl fmt::Display for CompletenessReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.is_complete() { "complete" } else { "incomplete" };
        writeln!(
            f,
            "Completeness: {}/100 ({verdict}, minimum {})",
            self.score, self.min_score
        )?;
        writeln!(f, "  Files:       {}/100", self.file_score)?;
        writeln!(f, "  State:       {}/100", self.field_score)?;
        writeln!(
            f,
            "  Consistency: {}",
            if self.consistency_ok { "ok" } else { "checkpoint not in log" }
        )?;
        writeln!(f, "  Checksums:   {}", self.checksum_ok)?;

        let sections = [
            ("Missing required files", &self.missing_required_files),
            ("Missing optional files", &self.missing_optional_files),
            ("Missing required fields", &self.missing_required_fields),
            ("Missing important fields", &self.missing_important_fields),
        ];
        for (title, items) in sections {
            if items.is_empty() {
                continue;
            }
            writeln!(f)?;
            writeln!(f, "{title}:")?;
            for item in items {
                writeln!(f, "  - {item}")?;
            }
        }
        Ok(())
    }
}
