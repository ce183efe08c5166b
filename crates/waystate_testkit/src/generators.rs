//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random document sets and write
//! plans that respect the store's path rules.

use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy for generating a single valid file name.
pub fn document_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,11}\\.(json|md|txt)").expect("Invalid regex")
}

/// Strategy for generating a document path of one to three segments.
pub fn document_path_strategy() -> impl Strategy<Value = String> {
    (
        prop::collection::vec(
            prop::string::string_regex("[a-z][a-z0-9]{0,7}").expect("Invalid regex"),
            0..3,
        ),
        document_name_strategy(),
    )
        .prop_map(|(dirs, name)| {
            let mut parts = dirs;
            parts.push(name);
            parts.join("/")
        })
}

/// Strategy for generating document content (arbitrary bytes).
pub fn content_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..256)
}

/// Strategy for generating a set of distinct documents.
///
/// A path is never also used as a directory by another path in the set.
pub fn document_set_strategy(max: usize) -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    prop::collection::btree_map(document_path_strategy(), content_strategy(), 1..=max).prop_map(
        |mut set| {
            let paths: Vec<String> = set.keys().cloned().collect();
            set.retain(|path, _| {
                !paths
                    .iter()
                    .any(|other| other.starts_with(&format!("{path}/")))
            });
            set
        },
    )
}

/// A sequence of writes to apply within one transaction.
#[derive(Debug, Clone)]
pub struct WritePlan {
    /// Documents present before the transaction.
    pub initial: BTreeMap<String, Vec<u8>>,
    /// Writes in order; a path may repeat.
    pub writes: Vec<(String, Vec<u8>)>,
}

/// Strategy for generating a write plan over a small namespace, so that
/// writes hit both existing and new documents and sometimes repeat.
pub fn write_plan_strategy() -> impl Strategy<Value = WritePlan> {
    let names = prop::sample::select(vec![
        "state.json",
        "plan.json",
        "notes.md",
        "active/session.json",
        "active/lock.json",
        "log/events.txt",
    ]);
    (
        prop::collection::btree_map(names.clone(), content_strategy(), 0..4),
        prop::collection::vec((names, content_strategy()), 1..8),
    )
        .prop_map(|(initial, writes)| WritePlan {
            initial: initial
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            writes: writes
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        })
}

/// Presence counts for one completeness term: `(present, total)`.
pub fn presence_strategy(max: usize) -> impl Strategy<Value = (usize, usize)> {
    (0..=max).prop_flat_map(|total| (0..=total, Just(total)))
}
