//! A failure at any step of a write leaves the document as it was found.

use proptest::prelude::*;
use std::path::Path;
use std::sync::Arc;
use waystate_core::{AtomicWriter, Config, CoreError, TransactionManager};
use waystate_storage::{DocumentStore, InMemoryStore};
use waystate_testkit::crash::{FaultyStore, Operation, Target};
use waystate_testkit::fixtures::{artifacts, contents, with_file_store};

const DOC: &str = "active/state.json";

fn faulty(initial: Option<&[u8]>) -> (Arc<InMemoryStore>, Arc<FaultyStore>) {
    let inner = Arc::new(InMemoryStore::new());
    if let Some(data) = initial {
        inner.write(Path::new(DOC), data).unwrap();
    }
    let store = Arc::new(FaultyStore::new(inner.clone()));
    (inner, store)
}

fn inject(store: &FaultyStore, step: usize) {
    match step {
        0 => store.fail(Operation::CreateDir, Target::Any),
        1 => store.fail(Operation::Write, Target::backup(DOC)),
        2 => store.fail(Operation::Write, Target::temp(DOC)),
        3 => store.tear_write(Target::temp(DOC)),
        _ => store.fail(Operation::Rename, Target::exact(DOC)),
    }
}

#[test]
fn failed_write_keeps_prior_content() {
    for step in 0..5 {
        let (inner, store) = faulty(Some(b"{\"v\":1}"));
        let writer = AtomicWriter::new(store.clone());
        inject(&store, step);

        let result = writer.write(Path::new(DOC), b"{\"v\":2,\"extra\":true}");

        assert!(result.is_err(), "step {step} should fail");
        assert_eq!(inner.read(Path::new(DOC)).unwrap(), b"{\"v\":1}", "step {step}");
        assert!(artifacts(inner.as_ref()).is_empty(), "step {step}");
    }
}

#[test]
fn failed_write_keeps_document_absent() {
    for step in [0, 2, 3, 4] {
        let (inner, store) = faulty(None);
        let writer = AtomicWriter::new(store.clone());
        inject(&store, step);

        assert!(writer.write(Path::new(DOC), b"new").is_err());
        assert!(!inner.exists(Path::new(DOC)), "step {step}");
        assert!(inner.is_empty(), "step {step}");
    }
}

#[test]
fn error_names_the_failed_step() {
    let (_inner, store) = faulty(Some(b"old"));
    let writer = AtomicWriter::new(store.clone());

    store.fail(Operation::Write, Target::backup(DOC));
    assert!(matches!(
        writer.write(Path::new(DOC), b"x"),
        Err(CoreError::BackupFailed { txid: None, .. })
    ));

    store.fail(Operation::Write, Target::temp(DOC));
    assert!(matches!(
        writer.write(Path::new(DOC), b"x"),
        Err(CoreError::WriteFailed { .. })
    ));

    store.fail(Operation::Rename, Target::exact(DOC));
    assert!(matches!(
        writer.write(Path::new(DOC), b"x"),
        Err(CoreError::PublishFailed { .. })
    ));
}

#[test]
fn append_failure_keeps_prior_lines() {
    let (inner, store) = faulty(Some(b"one\n"));
    let writer = AtomicWriter::new(store.clone());
    store.fail(Operation::Rename, Target::exact(DOC));

    assert!(writer.append_line(Path::new(DOC), "two").is_err());
    assert_eq!(inner.read(Path::new(DOC)).unwrap(), b"one\n");

    writer.append_line(Path::new(DOC), "two").unwrap();
    assert_eq!(inner.read(Path::new(DOC)).unwrap(), b"one\ntwo\n");
}

#[test]
fn crash_before_rename_recovers_prior_content() {
    let (inner, store) = faulty(Some(b"prior"));
    let writer = AtomicWriter::new(store.clone());
    store.crash_on(Operation::Rename, Target::exact(DOC));

    assert!(writer.write(Path::new(DOC), b"next").is_err());
    assert!(store.has_crashed());
    // The crash blocked cleanup
    assert!(!artifacts(inner.as_ref()).is_empty());
    assert_eq!(inner.read(Path::new(DOC)).unwrap(), b"prior");

    TransactionManager::open(inner.clone(), Config::default()).unwrap();
    assert!(artifacts(inner.as_ref()).is_empty());
    assert_eq!(inner.read(Path::new(DOC)).unwrap(), b"prior");
}

#[test]
fn file_store_crash_before_rename() {
    with_file_store(|test_store, root| {
        test_store.seed(&[(DOC, b"prior")]);
        let store = Arc::new(FaultyStore::new(Arc::clone(&test_store.store)));
        store.crash_on(Operation::Rename, Target::exact(DOC));

        let writer = AtomicWriter::new(store);
        assert!(writer.write(Path::new(DOC), b"next").is_err());
        assert_eq!(std::fs::read(root.join(DOC)).unwrap(), b"prior");

        // A fresh process opens the same directory
        let reopened = Config::new().sync(false).file_store(root).unwrap();
        let reopened: Arc<dyn DocumentStore> = Arc::new(reopened);
        TransactionManager::open(Arc::clone(&reopened), Config::default()).unwrap();

        assert!(artifacts(reopened.as_ref()).is_empty());
        assert_eq!(std::fs::read(root.join(DOC)).unwrap(), b"prior");
    });
}

proptest! {
    #[test]
    fn reads_never_see_mixed_content(
        before in proptest::collection::vec(any::<u8>(), 0..64),
        after in proptest::collection::vec(any::<u8>(), 0..64),
        step in 0usize..6,
    ) {
        let (inner, store) = faulty(Some(before.as_slice()));
        let writer = AtomicWriter::new(store.clone());
        if step < 5 {
            inject(&store, step);
        }

        let result = writer.write(Path::new(DOC), &after);
        let seen = inner.read(Path::new(DOC)).unwrap();

        if result.is_ok() {
            prop_assert_eq!(seen, after);
        } else {
            prop_assert_eq!(seen, before);
        }
        prop_assert_eq!(contents(inner.as_ref()).len(), 1);
    }
}
