//! Completeness scoring.
//!
//! The scorer turns a directory of documents into a 0-100 score that
//! recovery tooling uses to decide whether recovered state can be trusted:
//!
//! ```text
//! file_score  = ⌊70·required_present/required⌋ + ⌊30·optional_present/optional⌋
//! field_score = ⌊60·required_fields/required⌋  + ⌊40·important_fields/important⌋
//! score       = ⌊40·file_score/100⌋ + ⌊60·field_score/100⌋
//! ```
//!
//! An empty list awards its term's full weight. All arithmetic is integer,
//! so the score is reproducible bit for bit. Consistency and checksum
//! results are reported alongside the score and never change it.

mod config;
mod fields;
mod report;
mod scorer;

pub use config::{CompletenessConfig, ConsistencyRule, DEFAULT_MIN_SCORE};
pub use fields::{FieldLookup, JsonFieldLookup};
pub use report::{ChecksumStatus, CompletenessReport};
pub use scorer::{field_score, file_score, overall_score, ratio_score, CompletenessScorer};
