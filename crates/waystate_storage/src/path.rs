//! Relative path normalization shared by all stores.

use crate::error::{StorageError, StorageResult};
use std::path::{Component, Path, PathBuf};

/// Normalizes a store-relative path.
///
/// `.` components are dropped. Absolute paths, prefixes and `..` are
/// rejected so that no path can address anything outside the store root.
/// The empty path denotes the root itself.
pub fn normalize(path: &Path) -> StorageResult<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(StorageError::InvalidPath {
                    path: path.to_path_buf(),
                    reason: "parent directory components are not allowed",
                })
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(StorageError::InvalidPath {
                    path: path.to_path_buf(),
                    reason: "path must be relative to the store root",
                })
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_current_dir_components() {
        let p = normalize(Path::new("./a/./b.json")).unwrap();
        assert_eq!(p, PathBuf::from("a/b.json"));
    }

    #[test]
    fn empty_path_is_root() {
        assert_eq!(normalize(Path::new("")).unwrap(), PathBuf::new());
        assert_eq!(normalize(Path::new(".")).unwrap(), PathBuf::new());
    }

    #[test]
    fn rejects_parent_components() {
        let result = normalize(Path::new("a/../../etc/passwd"));
        assert!(matches!(result, Err(StorageError::InvalidPath { .. })));
    }

    #[test]
    fn rejects_absolute_paths() {
        let result = normalize(Path::new("/etc/passwd"));
        assert!(matches!(result, Err(StorageError::InvalidPath { .. })));
    }
}
