//! Fault injection for crash and failure testing.
//!
//! [`FaultyStore`] wraps any [`DocumentStore`] and fails chosen operations
//! on chosen paths, so tests can interrupt a write or a transaction at any
//! step and check what is left on disk.
//!
//! ## Test Strategy
//!
//! 1. **Failure during a step** - the operation returns an error, the
//!    caller is expected to clean up
//! 2. **Torn write** - half the bytes reach the store before the error
//! 3. **Crash** - the operation fails and so does every later mutation,
//!    as if the process had died; recovery then runs on the inner store
//!
//! ## Usage
//!
//! ```rust
//! use std::path::Path;
//! use std::sync::Arc;
//! use waystate_core::TransactionManager;
//! use waystate_storage::{DocumentStore, InMemoryStore};
//! use waystate_testkit::crash::{FaultyStore, Operation, Target};
//!
//! let inner = Arc::new(InMemoryStore::new());
//! let store = Arc::new(FaultyStore::new(inner.clone()));
//! store.fail(Operation::Rename, Target::document("b.json"));
//!
//! let mut manager = TransactionManager::new(store.clone());
//! manager.begin("demo").unwrap();
//! manager.write(Path::new("a.json"), b"1").unwrap();
//! assert!(manager.write(Path::new("b.json"), b"2").is_err());
//! manager.rollback("write failed").unwrap();
//! assert!(inner.is_empty());
//! ```

use parking_lot::Mutex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use waystate_core::artifact::{parse_artifact, ArtifactKind};
use waystate_storage::{DocumentStore, StorageError, StorageResult};

/// Store operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `read`.
    Read,
    /// `write`.
    Write,
    /// `rename`; matched against the destination.
    Rename,
    /// `remove`.
    Remove,
    /// `create_dir_all`.
    CreateDir,
}

impl Operation {
    const fn mutates(self) -> bool {
        !matches!(self, Self::Read)
    }
}

/// Which paths a fault applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Every path.
    Any,
    /// Exactly this path.
    Exact(PathBuf),
    /// A document and every artifact that belongs to it.
    Document(PathBuf),
    /// Temp files of a document.
    Temp(PathBuf),
    /// Backups (staged or published) and absence markers of a document.
    Backup(PathBuf),
}

impl Target {
    /// Targets `path` and its artifacts.
    pub fn document(path: impl Into<PathBuf>) -> Self {
        Self::Document(path.into())
    }

    /// Targets the temp files of `path`.
    pub fn temp(path: impl Into<PathBuf>) -> Self {
        Self::Temp(path.into())
    }

    /// Targets the backups of `path`.
    pub fn backup(path: impl Into<PathBuf>) -> Self {
        Self::Backup(path.into())
    }

    /// Targets exactly `path`.
    pub fn exact(path: impl Into<PathBuf>) -> Self {
        Self::Exact(path.into())
    }

    fn matches(&self, path: &Path) -> bool {
        let artifact = parse_artifact(path);
        match self {
            Self::Any => true,
            Self::Exact(p) => path == p,
            Self::Document(p) => path == p || artifact.is_some_and(|a| &a.document == p),
            Self::Temp(p) => {
                artifact.is_some_and(|a| &a.document == p && a.kind == ArtifactKind::Temp)
            }
            Self::Backup(p) => {
                artifact.is_some_and(|a| &a.document == p && a.kind != ArtifactKind::Temp)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Fail,
    Tear,
    Crash,
}

#[derive(Debug)]
struct Fault {
    op: Operation,
    target: Target,
    skip: usize,
    mode: Mode,
}

/// A store wrapper that fails operations on demand.
///
/// Each fault fires once, on the first matching call after `skip`
/// matching calls have gone through.
pub struct FaultyStore {
    inner: Arc<dyn DocumentStore>,
    faults: Mutex<Vec<Fault>>,
    fired: AtomicUsize,
    crashed: AtomicBool,
}

impl FaultyStore {
    /// Wraps `inner`.
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner,
            faults: Mutex::new(Vec::new()),
            fired: AtomicUsize::new(0),
            crashed: AtomicBool::new(false),
        }
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &Arc<dyn DocumentStore> {
        &self.inner
    }

    /// Fails the next `op` on `target`.
    pub fn fail(&self, op: Operation, target: Target) {
        self.fail_after(op, target, 0);
    }

    /// Lets `skip` matching calls through, then fails the next one.
    pub fn fail_after(&self, op: Operation, target: Target, skip: usize) {
        self.push(op, target, skip, Mode::Fail);
    }

    /// Writes half of the next write to `target`, then fails.
    pub fn tear_write(&self, target: Target) {
        self.push(Operation::Write, target, 0, Mode::Tear);
    }

    /// Fails the next `op` on `target` and every mutation after it.
    pub fn crash_on(&self, op: Operation, target: Target) {
        self.push(op, target, 0, Mode::Crash);
    }

    /// Clears every pending fault and the crashed state.
    pub fn reset(&self) {
        self.faults.lock().clear();
        self.fired.store(0, Ordering::SeqCst);
        self.crashed.store(false, Ordering::SeqCst);
    }

    /// Returns whether a crash fault has fired.
    pub fn has_crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }

    /// Returns how many faults have fired.
    pub fn faults_fired(&self) -> usize {
        self.fired.load(Ordering::SeqCst)
    }

    fn push(&self, op: Operation, target: Target, skip: usize, mode: Mode) {
        self.faults.lock().push(Fault {
            op,
            target,
            skip,
            mode,
        });
    }

    /// Decides whether this call fails, consuming the matching fault.
    fn check(&self, op: Operation, path: &Path) -> Option<Mode> {
        if op.mutates() && self.has_crashed() {
            return Some(Mode::Crash);
        }

        let mut faults = self.faults.lock();
        let index = faults
            .iter_mut()
            .position(|f| f.op == op && f.target.matches(path) && skip_or_fire(f))?;
        let fault = faults.remove(index);
        self.fired.fetch_add(1, Ordering::SeqCst);
        if fault.mode == Mode::Crash {
            self.crashed.store(true, Ordering::SeqCst);
        }
        Some(fault.mode)
    }
}

fn skip_or_fire(fault: &mut Fault) -> bool {
    if fault.skip == 0 {
        return true;
    }
    fault.skip -= 1;
    false
}

fn simulated(op: Operation, path: &Path, mode: Mode) -> StorageError {
    let what = match mode {
        Mode::Fail => "simulated failure",
        Mode::Tear => "simulated torn write",
        Mode::Crash => "simulated crash",
    };
    StorageError::Io(io::Error::new(
        io::ErrorKind::Other,
        format!("{what} during {op:?} of {}", path.display()),
    ))
}

impl DocumentStore for FaultyStore {
    fn read(&self, path: &Path) -> StorageResult<Vec<u8>> {
        match self.check(Operation::Read, path) {
            Some(mode) => Err(simulated(Operation::Read, path, mode)),
            None => self.inner.read(path),
        }
    }

    fn write(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        match self.check(Operation::Write, path) {
            Some(Mode::Tear) => {
                let _ = self.inner.write(path, &data[..data.len() / 2]);
                Err(simulated(Operation::Write, path, Mode::Tear))
            }
            Some(mode) => Err(simulated(Operation::Write, path, mode)),
            None => self.inner.write(path, data),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn list(&self, root: &Path) -> StorageResult<Vec<PathBuf>> {
        self.inner.list(root)
    }

    fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
        match self.check(Operation::Rename, to) {
            Some(mode) => Err(simulated(Operation::Rename, to, mode)),
            None => self.inner.rename(from, to),
        }
    }

    fn remove(&self, path: &Path) -> StorageResult<()> {
        match self.check(Operation::Remove, path) {
            Some(mode) => Err(simulated(Operation::Remove, path, mode)),
            None => self.inner.remove(path),
        }
    }

    fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        match self.check(Operation::CreateDir, path) {
            Some(mode) => Err(simulated(Operation::CreateDir, path, mode)),
            None => self.inner.create_dir_all(path),
        }
    }
}

impl std::fmt::Debug for FaultyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultyStore")
            .field("pending", &self.faults.lock().len())
            .field("fired", &self.faults_fired())
            .field("crashed", &self.has_crashed())
            .finish_non_exhaustive()
    }
}
