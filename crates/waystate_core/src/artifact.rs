//! Naming of the on-disk artifacts a write leaves between its start and
//! its resolution.
//!
//! ```text
//! <dir>/
//! ├─ state.json                     # the document
//! ├─ .state.json.<tag>.tmp          # new content before publication
//! ├─ .state.json.<tag>.bak.tmp      # backup still being written
//! ├─ .state.json.<tag>.bak          # pre-write copy of the document
//! └─ .state.json.<tag>.new          # the document did not exist before
//! <root>/
//! └─ .waystate-commit.<txid>        # commit in progress, roll forward
//! ```
//!
//! Artifacts live beside their document so that the publishing rename never
//! crosses a filesystem boundary. A `.bak` only appears through a rename
//! from `.bak.tmp`, so its content is always complete.

use crate::types::WriteTag;
use std::path::{Path, PathBuf};

/// Prefix of the commit marker written at the store root.
pub const COMMIT_MARKER_PREFIX: &str = ".waystate-commit.";

/// The kind of a write artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactKind {
    /// New content not yet published.
    Temp,
    /// Backup content not yet renamed into place. Never trusted.
    BackupTemp,
    /// Copy of the document's content before the write.
    Backup,
    /// Marker recording that the document was absent before the write.
    Absent,
}

impl ArtifactKind {
    /// File extension used for this kind.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Temp => "tmp",
            Self::BackupTemp => "bak.tmp",
            Self::Backup => "bak",
            Self::Absent => "new",
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "tmp" => Some(Self::Temp),
            "bak" => Some(Self::Backup),
            "new" => Some(Self::Absent),
            _ => None,
        }
    }
}

/// An artifact found on disk, decoded from its file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Path of the artifact itself.
    pub path: PathBuf,
    /// Path of the document it belongs to.
    pub document: PathBuf,
    /// Owner of the artifact.
    pub tag: WriteTag,
    /// What the artifact holds.
    pub kind: ArtifactKind,
}

/// Returns the path of the artifact of `kind` for `document`.
///
/// Returns `None` if `document` has no file name.
#[must_use]
pub fn artifact_path(document: &Path, tag: &WriteTag, kind: ArtifactKind) -> Option<PathBuf> {
    let name = document.file_name()?.to_str()?;
    let file = format!(".{name}.{tag}.{}", kind.extension());
    Some(match document.parent() {
        Some(parent) => parent.join(file),
        None => PathBuf::from(file),
    })
}

/// Decodes an artifact path. Returns `None` for ordinary documents.
#[must_use]
pub fn parse_artifact(path: &Path) -> Option<Artifact> {
    let file = path.file_name()?.to_str()?;
    let rest = file.strip_prefix('.')?;
    let (rest, ext) = rest.rsplit_once('.')?;
    let (rest, kind) = match (ext, rest.strip_suffix(".bak")) {
        ("tmp", Some(staged)) => (staged, ArtifactKind::BackupTemp),
        _ => (rest, ArtifactKind::from_extension(ext)?),
    };
    let (name, tag) = rest.rsplit_once('.')?;
    if name.is_empty() {
        return None;
    }
    let tag = WriteTag::parse(tag)?;
    let document = match path.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    };
    Some(Artifact {
        path: path.to_path_buf(),
        document,
        tag,
        kind,
    })
}

/// Returns the path of the commit marker for `tag`.
#[must_use]
pub fn commit_marker_path(tag: &WriteTag) -> PathBuf {
    PathBuf::from(format!("{COMMIT_MARKER_PREFIX}{tag}"))
}

/// Decodes a commit marker path. Only markers at the store root count.
#[must_use]
pub fn parse_commit_marker(path: &Path) -> Option<WriteTag> {
    if path.parent().is_some_and(|p| !p.as_os_str().is_empty()) {
        return None;
    }
    let file = path.file_name()?.to_str()?;
    WriteTag::parse(file.strip_prefix(COMMIT_MARKER_PREFIX)?)
}

/// Returns true for any path the write machinery owns: artifacts and
/// commit markers. Such paths are never tracked as documents.
#[must_use]
pub fn is_internal(path: &Path) -> bool {
    parse_artifact(path).is_some() || parse_commit_marker(path).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionId;

    #[test]
    fn artifact_lives_beside_document() {
        let tag = WriteTag::Transaction(TransactionId::generate());
        let path = artifact_path(Path::new("active/state.json"), &tag, ArtifactKind::Backup)
            .unwrap();
        assert_eq!(path.parent(), Some(Path::new("active")));
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            format!(".state.json.{tag}.bak")
        );
    }

    #[test]
    fn artifact_roundtrip_for_every_kind() {
        let tag = WriteTag::solo();
        for kind in [
            ArtifactKind::Temp,
            ArtifactKind::BackupTemp,
            ArtifactKind::Backup,
            ArtifactKind::Absent,
        ] {
            let path = artifact_path(Path::new("a/b/doc.v2.yaml"), &tag, kind).unwrap();
            let artifact = parse_artifact(&path).unwrap();
            assert_eq!(artifact.document, PathBuf::from("a/b/doc.v2.yaml"));
            assert_eq!(artifact.tag, tag);
            assert_eq!(artifact.kind, kind);
        }
    }

    #[test]
    fn staged_backup_is_not_a_backup() {
        let tag = WriteTag::Transaction(TransactionId::generate());
        let staged =
            artifact_path(Path::new("notes.bak"), &tag, ArtifactKind::BackupTemp).unwrap();
        assert_eq!(
            staged.to_str().unwrap(),
            format!(".notes.bak.{tag}.bak.tmp")
        );

        let artifact = parse_artifact(&staged).unwrap();
        assert_eq!(artifact.kind, ArtifactKind::BackupTemp);
        assert_eq!(artifact.document, PathBuf::from("notes.bak"));

        // A temp file of a document named like a backup stays a temp file
        let temp = artifact_path(Path::new("x.bak"), &tag, ArtifactKind::Temp).unwrap();
        assert_eq!(parse_artifact(&temp).unwrap().kind, ArtifactKind::Temp);
    }

    #[test]
    fn ordinary_documents_are_not_artifacts() {
        assert!(parse_artifact(Path::new("state.json")).is_none());
        assert!(parse_artifact(Path::new(".hidden")).is_none());
        assert!(parse_artifact(Path::new(".notes.backup.bak")).is_none());
        assert!(!is_internal(Path::new("active/session.json")));
    }

    #[test]
    fn document_without_name_has_no_artifacts() {
        let tag = WriteTag::solo();
        assert!(artifact_path(Path::new(""), &tag, ArtifactKind::Temp).is_none());
    }

    #[test]
    fn commit_marker_only_at_root() {
        let tag = WriteTag::Transaction(TransactionId::generate());
        let marker = commit_marker_path(&tag);
        assert_eq!(parse_commit_marker(&marker), Some(tag));
        assert!(is_internal(&marker));

        let nested = Path::new("sub").join(&marker);
        assert_eq!(parse_commit_marker(&nested), None);
    }
}
