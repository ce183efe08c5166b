//! Completeness scores over realistic and degenerate directories.

use proptest::prelude::*;
use std::path::Path;
use std::sync::Arc;
use waystate_core::{ChecksumStatus, CompletenessConfig, CompletenessScorer};
use waystate_storage::{DocumentStore, InMemoryStore};
use waystate_testkit::fixtures::scenarios::{workflow_profile, workflow_run, RUN_DIR};
use waystate_testkit::fixtures::{with_temp_store, TestStore};

fn run_dir() -> &'static Path {
    Path::new(RUN_DIR)
}

fn scorer(store: &TestStore, config: CompletenessConfig) -> CompletenessScorer {
    CompletenessScorer::new(Arc::clone(&store.store), config)
}

#[test]
fn worked_example_scores_64() {
    with_temp_store(|store| {
        store.seed(&[
            ("state.json", br#"{"id":"r-1"}"#),
            ("plan.json", b"{}"),
        ]);
        let config = CompletenessConfig::new()
            .required_files(["state.json", "plan.json"])
            .optional_files(["a.md", "b.md", "c.md", "d.md", "e.md"])
            .required_fields(["state.json:id"])
            .important_fields(["state.json:owner", "plan.json:steps"]);

        let report = scorer(store, config).report(Path::new(""));

        assert_eq!(report.file_score, 70);
        assert_eq!(report.field_score, 60);
        assert_eq!(report.score, 64);
        assert!(!report.is_complete());
        assert_eq!(report.missing_optional_files.len(), 5);
        assert_eq!(
            report.missing_important_fields,
            vec!["state.json:owner", "plan.json:steps"]
        );
    });
}

#[test]
fn complete_run_reaches_full_score() {
    with_temp_store(|store| {
        workflow_run(store);
        let scorer = scorer(store, workflow_profile());

        assert_eq!(scorer.score(run_dir()), 100);
        assert!(scorer.is_complete(run_dir(), 100));
        assert!(scorer.check_consistency(run_dir()));
        assert_eq!(scorer.checksum_status(run_dir()), ChecksumStatus::Unknown);
    });
}

#[test]
fn missing_pieces_are_listed() {
    with_temp_store(|store| {
        workflow_run(store);
        store.remove(Path::new("run/plan.json")).unwrap();
        store.remove(Path::new("run/notes.md")).unwrap();
        store
            .write(
                Path::new("run/state.json"),
                br#"{"run_id":"r-42","phase":"","checkpoint":"cp-2"}"#,
            )
            .unwrap();

        let report = scorer(store, workflow_profile()).report(run_dir());

        assert_eq!(report.missing_required_files, vec!["plan.json"]);
        assert_eq!(report.missing_optional_files, vec!["notes.md"]);
        // An empty string counts as absent
        assert_eq!(report.missing_required_fields, vec!["state.json:phase"]);
        assert_eq!(
            report.missing_important_fields,
            vec!["state.json:owner", "plan.json:steps"]
        );
        // files: 35 + 15, fields: 30 + 0
        assert_eq!(report.file_score, 50);
        assert_eq!(report.field_score, 30);
        assert_eq!(report.score, 38);

        let text = report.to_string();
        assert!(text.starts_with("Completeness: 38/100 (incomplete, minimum 80)"));
        assert!(text.contains("Missing required files:\n  - plan.json"));
    });
}

#[test]
fn checkpoint_must_appear_in_log() {
    with_temp_store(|store| {
        workflow_run(store);
        let scorer = scorer(store, workflow_profile());

        store
            .write(Path::new("run/checkpoints.log"), b"cp-1\n")
            .unwrap();
        assert!(!scorer.check_consistency(run_dir()));

        store.remove(Path::new("run/checkpoints.log")).unwrap();
        assert!(!scorer.check_consistency(run_dir()));

        // Consistency does not feed the score
        assert_eq!(scorer.score(run_dir()), 100);
    });
}

#[test]
fn corrupt_documents_degrade_to_missing() {
    with_temp_store(|store| {
        workflow_run(store);
        store.seed(&[
            ("run/state.json", b"{\"run_id\": \"r-42\", "),
            ("run/plan.json", &[0xff, 0xfe, 0x00]),
        ]);
        let scorer = scorer(store, workflow_profile());

        let report = scorer.report(run_dir());

        assert_eq!(report.file_score, 100);
        assert_eq!(report.field_score, 0);
        assert_eq!(report.score, 40);
        assert_eq!(report.missing_required_fields.len(), 2);
        // No readable checkpoint, nothing to contradict
        assert!(report.consistency_ok);
    });
}

#[test]
fn empty_directory_and_empty_profile() {
    with_temp_store(|store| {
        let empty = scorer(store, CompletenessConfig::new());
        assert_eq!(empty.score(Path::new("nowhere")), 100);

        let report = scorer(store, workflow_profile()).report(Path::new("nowhere"));
        assert_eq!(report.score, 0);
        assert!(report.consistency_ok);
    });
}

#[test]
fn reports_are_deterministic() {
    with_temp_store(|store| {
        workflow_run(store);
        store.remove(Path::new("run/summary.txt")).unwrap();
        let scorer = scorer(store, workflow_profile());

        assert_eq!(scorer.report(run_dir()), scorer.report(run_dir()));
        assert_eq!(scorer.report_text(run_dir()), scorer.report_text(run_dir()));

        let json = scorer.report_json(run_dir());
        let mut keys: Vec<&str> = json
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "checksum",
                "consistency",
                "file_score",
                "is_complete",
                "missing_fields",
                "missing_files",
                "score",
                "state_score",
            ]
        );
        assert_eq!(json["score"], 94);
        assert_eq!(json["is_complete"], true);
        assert_eq!(json["checksum"], "unknown");
    });
}

#[test]
fn custom_lookup_reads_plain_text() {
    with_temp_store(|store| {
        store.seed(&[("owner.txt", b"ci\n")]);
        let lookup = |store: &dyn DocumentStore, dir: &Path, field: &str| {
            let data = store.read(&dir.join(field)).ok()?;
            let text = String::from_utf8(data).ok()?;
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        };
        let config = CompletenessConfig::new().required_fields(["owner.txt", "missing.txt"]);

        let report = scorer(store, config).with_lookup(lookup).report(Path::new(""));

        assert_eq!(report.missing_required_fields, vec!["missing.txt"]);
        assert_eq!(report.field_score, 70);
    });
}

#[test]
fn verifier_feeds_checksum_status() {
    with_temp_store(|store| {
        workflow_run(store);
        let verifier = store.verifier();
        verifier.create_snapshot_manifest(run_dir()).unwrap();
        verifier
            .store_checksums(["run/state.json", "run/plan.json"])
            .unwrap();
        let scorer = scorer(store, workflow_profile()).with_verifier(store.verifier());

        // notes.md and summary.txt were never recorded; that is not a failure
        let report = scorer.report(run_dir());
        assert_eq!(report.checksum_ok, ChecksumStatus::Verified);

        store
            .write(Path::new("run/notes.md"), b"# Notes\nedited\n")
            .unwrap();
        // Optional entry changed: a manifest warning only
        assert_eq!(scorer.checksum_status(run_dir()), ChecksumStatus::Verified);

        store
            .write(Path::new("run/plan.json"), br#"{"steps":["fetch"]}"#)
            .unwrap();
        let report = scorer.report(run_dir());
        assert_eq!(report.checksum_ok, ChecksumStatus::Failed);
        // Integrity does not change the score
        assert_eq!(report.score, 100);
    });
}

#[test]
fn verifier_without_records_is_unknown() {
    with_temp_store(|store| {
        workflow_run(store);
        let scorer = scorer(store, workflow_profile()).with_verifier(store.verifier());
        assert_eq!(scorer.checksum_status(run_dir()), ChecksumStatus::Unknown);

        store.seed(&[("run/manifest.json", b"not a manifest")]);
        assert_eq!(scorer.checksum_status(run_dir()), ChecksumStatus::Failed);
    });
}

const FILES: [&str; 6] = ["r0", "r1", "r2", "o0", "o1", "o2"];
const FIELDS: [&str; 4] = ["a", "b", "c", "d"];

fn presence_store(files: &[bool], fields: &[bool]) -> Arc<InMemoryStore> {
    let store = InMemoryStore::new();
    for (name, _) in FILES.iter().zip(files).filter(|(_, present)| **present) {
        store.write(Path::new(name), b"x").unwrap();
    }
    let object: serde_json::Map<String, serde_json::Value> = FIELDS
        .iter()
        .zip(fields)
        .filter(|(_, present)| **present)
        .map(|(key, _)| ((*key).to_string(), serde_json::Value::from(1)))
        .collect();
    let doc = serde_json::to_vec(&object).unwrap();
    store.write(Path::new("fields.json"), &doc).unwrap();
    Arc::new(store)
}

fn presence_config() -> CompletenessConfig {
    CompletenessConfig::new()
        .required_files(FILES[..3].iter().copied())
        .optional_files(FILES[3..].iter().copied())
        .required_fields(["fields.json:a", "fields.json:b"])
        .important_fields(["fields.json:c", "fields.json:d"])
}

proptest! {
    #[test]
    fn adding_anything_never_lowers_the_score(
        files in prop::collection::vec(any::<bool>(), FILES.len()),
        fields in prop::collection::vec(any::<bool>(), FIELDS.len()),
        flip in 0usize..(FILES.len() + FIELDS.len()),
    ) {
        let before = CompletenessScorer::new(presence_store(&files, &fields), presence_config())
            .score(Path::new(""));

        let (mut more_files, mut more_fields) = (files.clone(), fields.clone());
        if flip < FILES.len() {
            more_files[flip] = true;
        } else {
            more_fields[flip - FILES.len()] = true;
        }
        let after = CompletenessScorer::new(
            presence_store(&more_files, &more_fields),
            presence_config(),
        )
        .score(Path::new(""));

        prop_assert!(before <= 100);
        prop_assert!(after >= before);
    }
}
