//! Atomic single-document publication.
//!
//! Every write follows the write-then-rename pattern:
//! 1. Ensure the parent directory exists
//! 2. Copy the current document (if any) to a backup beside it; the copy
//!    is written under a staging name and renamed, so a backup is never partial
//! 3. Write the new content to a temp file beside it
//! 4. Rename the temp file over the document
//!
//! A reader therefore sees either the old or the new content, never a
//! mixture. If any step fails, the temp file is removed and the backup is
//! put back before the error is returned.
//!
//! `append` and `append_line` are read-modify-write: they assume a single
//! writer per document root. Two processes appending to the same document
//! can lose each other's updates.

use crate::artifact::{self, artifact_path, ArtifactKind};
use crate::error::{CoreError, CoreResult};
use crate::transaction::{Backup, Transaction};
use crate::types::{TransactionId, WriteTag};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, warn};
use waystate_storage::{normalize, DocumentStore, StorageError, StorageResult};

/// Publishes documents without ever exposing a torn write.
///
/// The writer is cheap to clone; clones share the same store.
///
/// # Example
///
/// ```rust
/// use std::path::Path;
/// use std::sync::Arc;
/// use waystate_core::AtomicWriter;
/// use waystate_storage::{DocumentStore, InMemoryStore};
///
/// let store = Arc::new(InMemoryStore::new());
/// let writer = AtomicWriter::new(store.clone());
/// writer.write(Path::new("state.json"), b"{}").unwrap();
/// writer.append_line(Path::new("log.txt"), "started").unwrap();
/// assert_eq!(store.read(Path::new("log.txt")).unwrap(), b"started\n");
/// ```
#[derive(Clone)]
pub struct AtomicWriter {
    store: Arc<dyn DocumentStore>,
}

impl AtomicWriter {
    /// Creates a writer over `store`.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Atomically replaces the content of `path`.
    ///
    /// # Errors
    ///
    /// Returns `BackupFailed`, `WriteFailed` or `PublishFailed`; in every
    /// case the document is left as it was found.
    pub fn write(&self, path: &Path, content: &[u8]) -> CoreResult<()> {
        self.publish(path, content, None)
    }

    /// Appends `content` to `path` (created if absent).
    ///
    /// # Errors
    ///
    /// Same as [`Self::write`], plus storage errors reading the current content.
    pub fn append(&self, path: &Path, content: &[u8]) -> CoreResult<()> {
        let data = self.appended(path, content)?;
        self.publish(path, &data, None)
    }

    /// Appends `line` and a trailing newline to `path`.
    ///
    /// If the current content does not end with a newline one is inserted
    /// first, so `line` always starts a line of its own.
    ///
    /// # Errors
    ///
    /// Same as [`Self::append`].
    pub fn append_line(&self, path: &Path, line: &str) -> CoreResult<()> {
        let data = self.appended_line(path, line)?;
        self.publish(path, &data, None)
    }

    /// Atomically replaces `path` with everything read from `source`.
    ///
    /// The source is drained before anything touches `path`.
    ///
    /// # Errors
    ///
    /// Returns `SourceFailed` if reading the source fails, otherwise the
    /// same errors as [`Self::write`].
    pub fn write_from<R: Read>(&self, path: &Path, source: R) -> CoreResult<()> {
        let data = read_source(path, source)?;
        self.publish(path, &data, None)
    }

    /// Atomically replaces `path` with the standard output of `command`.
    ///
    /// # Errors
    ///
    /// Returns `SourceFailed` if the command cannot be spawned or exits
    /// unsuccessfully; `path` is not touched in that case.
    pub fn write_from_command(&self, path: &Path, command: &mut Command) -> CoreResult<()> {
        let data = run_command(path, command)?;
        self.publish(path, &data, None)
    }

    /// Returns the current content of `path` with `content` appended.
    pub(crate) fn appended(&self, path: &Path, content: &[u8]) -> CoreResult<Vec<u8>> {
        let mut data = self.current(path)?;
        data.extend_from_slice(content);
        Ok(data)
    }

    /// Returns the current content of `path` with `line` appended as a line.
    pub(crate) fn appended_line(&self, path: &Path, line: &str) -> CoreResult<Vec<u8>> {
        let mut data = self.current(path)?;
        if data.last().is_some_and(|&b| b != b'\n') {
            data.push(b'\n');
        }
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');
        Ok(data)
    }

    fn current(&self, path: &Path) -> CoreResult<Vec<u8>> {
        match self.store.read(path) {
            Ok(data) => Ok(data),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Publishes `content` at `path`, optionally inside `txn`.
    ///
    /// Inside a transaction the backup and temp file are registered on the
    /// transaction before anything is written, and cleanup is deferred to
    /// commit or rollback.
    pub(crate) fn publish(
        &self,
        path: &Path,
        content: &[u8],
        mut txn: Option<&mut Transaction>,
    ) -> CoreResult<()> {
        let path = document_path(path)?;
        let txid = txn.as_ref().map(|t| t.id());
        let tag = match txn.as_ref() {
            Some(t) => t.tag(),
            None => WriteTag::solo(),
        };
        let temp = artifact_path(&path, &tag, ArtifactKind::Temp)
            .ok_or_else(|| CoreError::InvalidDocumentPath { path: path.clone() })?;

        if let Some(parent) = path.parent() {
            self.store
                .create_dir_all(parent)
                .map_err(|source| CoreError::WriteFailed {
                    path: path.clone(),
                    txid,
                    source,
                })?;
        }

        let backed_up = txn.as_ref().is_some_and(|t| t.has_backup(&path));
        let fresh = if backed_up {
            None
        } else {
            self.take_backup(&path, &tag, txn.is_some())?
        };

        if let Some(t) = txn.as_deref_mut() {
            if let Some(backup) = &fresh {
                t.register_backup(backup.clone())?;
            }
            t.register_temp(temp.clone())?;
        }

        if let Err(source) = self.store.write(&temp, content) {
            self.abandon(&temp, fresh.as_ref(), txn.as_deref_mut());
            return Err(CoreError::WriteFailed { path, txid, source });
        }

        if let Err(source) = self.store.rename(&temp, &path) {
            self.abandon(&temp, fresh.as_ref(), txn.as_deref_mut());
            return Err(CoreError::PublishFailed { path, txid, source });
        }

        debug!(path = %path.display(), txid = ?txid, bytes = content.len(), "published document");

        if txn.is_none() {
            if let Some(backup) = fresh {
                if let Err(e) = discard_backup(self.store.as_ref(), &backup) {
                    // The rename already made the write durable; recovery
                    // discards standalone leftovers.
                    warn!(path = %backup.location.display(), error = %e, "failed to delete backup");
                }
            }
        }
        Ok(())
    }

    /// Copies the current document aside before it is replaced.
    ///
    /// Inside a transaction a document that does not exist yet gets an
    /// empty `.new` marker so rollback and recovery know to remove it.
    fn take_backup(
        &self,
        path: &Path,
        tag: &WriteTag,
        in_txn: bool,
    ) -> CoreResult<Option<Backup>> {
        let owner = tag.transaction();
        let failed = |source, leftover| CoreError::BackupFailed {
            path: path.to_path_buf(),
            txid: owner,
            leftover,
            source,
        };

        let (kind, data, existed) = match self.store.read(path) {
            Ok(data) => (ArtifactKind::Backup, data, true),
            Err(e) if e.is_not_found() => {
                if !in_txn {
                    return Ok(None);
                }
                (ArtifactKind::Absent, Vec::new(), false)
            }
            Err(e) => return Err(failed(e, None)),
        };

        let location = artifact_path(path, tag, kind).ok_or_else(|| {
            CoreError::InvalidDocumentPath {
                path: path.to_path_buf(),
            }
        })?;
        if let Err((e, leftover)) = self.put_artifact(path, tag, kind, &location, &data) {
            return Err(failed(e, leftover));
        }

        debug!(path = %path.display(), backup = %location.display(), existed, "took backup");
        Ok(Some(Backup {
            original: path.to_path_buf(),
            location,
            existed,
            owner,
        }))
    }

    /// Writes a backup artifact to `location`.
    ///
    /// A `.bak` is written under its staging name and renamed into place, so
    /// recovery only ever restores complete copies. On failure the partial
    /// file is removed; if that fails too its path is returned with the error.
    fn put_artifact(
        &self,
        path: &Path,
        tag: &WriteTag,
        kind: ArtifactKind,
        location: &Path,
        data: &[u8],
    ) -> Result<(), (StorageError, Option<PathBuf>)> {
        let staged = match kind {
            ArtifactKind::Backup => artifact_path(path, tag, ArtifactKind::BackupTemp),
            _ => None,
        };
        let written = staged.as_deref().unwrap_or(location);

        let result = self.store.write(written, data).and_then(|()| match &staged {
            Some(staged) => self.store.rename(staged, location),
            None => Ok(()),
        });

        result.map_err(|e| {
            let leftover = match self.store.remove(written) {
                Ok(()) => None,
                Err(cleanup) => {
                    warn!(path = %written.display(), error = %cleanup, "failed to remove partial backup");
                    Some(written.to_path_buf())
                }
            };
            (e, leftover)
        })
    }

    /// Undoes a failed write: removes the temp file and puts back a backup
    /// taken by this write.
    fn abandon(&self, temp: &Path, fresh: Option<&Backup>, txn: Option<&mut Transaction>) {
        if let Err(e) = self.store.remove(temp) {
            warn!(path = %temp.display(), error = %e, "failed to remove temp file");
        }

        let Some(backup) = fresh else {
            return;
        };
        match restore_backup(self.store.as_ref(), backup) {
            Ok(()) => {
                if let Some(t) = txn {
                    t.unregister_backup(&backup.original);
                }
            }
            Err(e) => {
                // Stays registered (or on disk for recovery) so the restore
                // is retried later.
                warn!(path = %backup.original.display(), error = %e, "failed to restore backup");
            }
        }
    }
}

impl std::fmt::Debug for AtomicWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicWriter").finish_non_exhaustive()
    }
}

/// Validates that `path` names a document the writer may publish.
fn document_path(path: &Path) -> CoreResult<PathBuf> {
    let invalid = || CoreError::InvalidDocumentPath {
        path: path.to_path_buf(),
    };
    let path = normalize(path).map_err(|_| invalid())?;
    if path.file_name().is_none() || artifact::is_internal(&path) {
        return Err(invalid());
    }
    Ok(path)
}

/// Puts a backup back over its document and consumes the backup.
pub(crate) fn restore_backup(store: &dyn DocumentStore, backup: &Backup) -> StorageResult<()> {
    if backup.existed {
        store.rename(&backup.location, &backup.original)
    } else {
        store.remove(&backup.original)?;
        store.remove(&backup.location)
    }
}

/// Deletes a backup that is no longer needed.
pub(crate) fn discard_backup(store: &dyn DocumentStore, backup: &Backup) -> StorageResult<()> {
    store.remove(&backup.location)
}

pub(crate) fn read_source<R: Read>(path: &Path, mut source: R) -> CoreResult<Vec<u8>> {
    let mut data = Vec::new();
    source
        .read_to_end(&mut data)
        .map_err(|source| CoreError::SourceFailed {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(data)
}

pub(crate) fn run_command(path: &Path, command: &mut Command) -> CoreResult<Vec<u8>> {
    let failed = |source| CoreError::SourceFailed {
        path: path.to_path_buf(),
        source,
    };
    let output = command.output().map_err(failed)?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(failed(io::Error::new(
            io::ErrorKind::Other,
            format!("{:?} exited with {}: {}", command, output.status, stderr.trim()),
        )));
    }
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use waystate_storage::{FileStore, InMemoryStore};

    fn writer() -> (Arc<InMemoryStore>, AtomicWriter) {
        let store = Arc::new(InMemoryStore::new());
        let writer = AtomicWriter::new(store.clone());
        (store, writer)
    }

    #[test]
    fn write_creates_document() {
        let (store, writer) = writer();
        writer.write(Path::new("a/b/state.json"), b"{}").unwrap();
        assert_eq!(store.read(Path::new("a/b/state.json")).unwrap(), b"{}");
    }

    #[test]
    fn write_leaves_no_artifacts() {
        let (store, writer) = writer();
        writer.write(Path::new("doc"), b"one").unwrap();
        writer.write(Path::new("doc"), b"two").unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.read(Path::new("doc")).unwrap(), b"two");
    }

    #[test]
    fn append_concatenates() {
        let (store, writer) = writer();
        writer.append(Path::new("log"), b"ab").unwrap();
        writer.append(Path::new("log"), b"cd").unwrap();
        assert_eq!(store.read(Path::new("log")).unwrap(), b"abcd");
    }

    #[test]
    fn append_line_starts_a_new_line() {
        let (store, writer) = writer();
        store.write(Path::new("log"), b"no newline").unwrap();
        writer.append_line(Path::new("log"), "next").unwrap();
        writer.append_line(Path::new("log"), "last").unwrap();
        assert_eq!(
            store.read(Path::new("log")).unwrap(),
            b"no newline\nnext\nlast\n"
        );
    }

    #[test]
    fn write_from_reader() {
        let (store, writer) = writer();
        writer
            .write_from(Path::new("doc"), &b"streamed"[..])
            .unwrap();
        assert_eq!(store.read(Path::new("doc")).unwrap(), b"streamed");
    }

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "source died"))
        }
    }

    #[test]
    fn failing_source_leaves_document_untouched() {
        let (store, writer) = writer();
        store.write(Path::new("doc"), b"original").unwrap();

        let result = writer.write_from(Path::new("doc"), BrokenReader);

        assert!(matches!(result, Err(CoreError::SourceFailed { .. })));
        assert_eq!(store.read(Path::new("doc")).unwrap(), b"original");
        assert_eq!(store.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn write_from_command_output() {
        let (store, writer) = writer();
        writer
            .write_from_command(Path::new("doc"), Command::new("echo").arg("hello"))
            .unwrap();
        assert_eq!(store.read(Path::new("doc")).unwrap(), b"hello\n");
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_leaves_document_untouched() {
        let (store, writer) = writer();
        store.write(Path::new("doc"), b"original").unwrap();

        let result = writer.write_from_command(Path::new("doc"), &mut Command::new("false"));

        assert!(matches!(result, Err(CoreError::SourceFailed { .. })));
        assert_eq!(store.read(Path::new("doc")).unwrap(), b"original");
    }

    #[test]
    fn rejects_artifact_and_empty_paths() {
        let (_store, writer) = writer();
        let tag = WriteTag::solo();
        let temp = artifact_path(Path::new("doc"), &tag, ArtifactKind::Temp).unwrap();

        assert!(matches!(
            writer.write(&temp, b"x"),
            Err(CoreError::InvalidDocumentPath { .. })
        ));
        assert!(matches!(
            writer.write(Path::new(""), b"x"),
            Err(CoreError::InvalidDocumentPath { .. })
        ));
        assert!(matches!(
            writer.write(Path::new("../escape"), b"x"),
            Err(CoreError::InvalidDocumentPath { .. })
        ));
    }

    #[test]
    fn backup_is_renamed_into_place() {
        let (store, writer) = writer();
        store.write(Path::new("doc"), b"old").unwrap();
        let tag = WriteTag::Transaction(TransactionId::generate());

        let backup = writer.take_backup(Path::new("doc"), &tag, true).unwrap().unwrap();

        assert_eq!(store.read(&backup.location).unwrap(), b"old");
        let staged = artifact_path(Path::new("doc"), &tag, ArtifactKind::BackupTemp).unwrap();
        assert!(!store.exists(&staged));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn file_store_write_is_atomic_rename() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::open(dir.path()).unwrap());
        let writer = AtomicWriter::new(store.clone());

        writer.write(Path::new("active/state.json"), b"v1").unwrap();
        writer.write(Path::new("active/state.json"), b"v2").unwrap();

        assert_eq!(
            std::fs::read(dir.path().join("active/state.json")).unwrap(),
            b"v2"
        );
        assert_eq!(
            store.list(Path::new("")).unwrap(),
            vec![PathBuf::from("active/state.json")]
        );
    }
}
