//! Field lookup.

use serde_json::Value;
use std::path::Path;
use waystate_storage::DocumentStore;

/// Resolves a field identifier to its value within a directory.
///
/// Returns `None` when the field is absent, null or empty, and also when
/// its document is missing or unreadable: the scorer treats all of these
/// the same way.
pub trait FieldLookup: Send + Sync {
    /// Resolves `field` against the documents under `dir`.
    fn resolve(&self, store: &dyn DocumentStore, dir: &Path, field: &str) -> Option<String>;
}

impl<F> FieldLookup for F
where
    F: Fn(&dyn DocumentStore, &Path, &str) -> Option<String> + Send + Sync,
{
    fn resolve(&self, store: &dyn DocumentStore, dir: &Path, field: &str) -> Option<String> {
        self(store, dir, field)
    }
}

/// Looks fields up in JSON documents.
///
/// A field identifier is `<document>:<dotted.key>`, for example
/// `state.json:session.id`. Numeric segments index into arrays.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFieldLookup;

impl FieldLookup for JsonFieldLookup {
    fn resolve(&self, store: &dyn DocumentStore, dir: &Path, field: &str) -> Option<String> {
        let (document, key) = field.split_once(':')?;
        let data = store.read(&dir.join(document)).ok()?;
        let root: Value = serde_json::from_slice(&data).ok()?;

        let mut value = &root;
        for segment in key.split('.').filter(|s| !s.is_empty()) {
            value = match value {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        present(value)
    }
}

fn present(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) if items.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waystate_storage::InMemoryStore;

    fn store() -> InMemoryStore {
        InMemoryStore::with_documents([
            (
                "dir/state.json",
                br#"{"session":{"id":"s1","tags":[],"meta":{}},"count":3,"note":null,"empty":"","steps":["a","b"]}"#
                    .to_vec(),
            ),
            ("dir/broken.json", b"{".to_vec()),
        ])
    }

    fn resolve(field: &str) -> Option<String> {
        JsonFieldLookup.resolve(&store(), Path::new("dir"), field)
    }

    #[test]
    fn nested_values() {
        assert_eq!(resolve("state.json:session.id"), Some("s1".to_string()));
        assert_eq!(resolve("state.json:count"), Some("3".to_string()));
        assert_eq!(resolve("state.json:steps.1"), Some("b".to_string()));
    }

    #[test]
    fn empty_values_are_absent() {
        assert_eq!(resolve("state.json:note"), None);
        assert_eq!(resolve("state.json:empty"), None);
        assert_eq!(resolve("state.json:session.tags"), None);
        assert_eq!(resolve("state.json:session.meta"), None);
    }

    #[test]
    fn missing_or_unreadable_is_absent() {
        assert_eq!(resolve("state.json:nope"), None);
        assert_eq!(resolve("other.json:x"), None);
        assert_eq!(resolve("broken.json:x"), None);
        assert_eq!(resolve("no-separator"), None);
    }

    #[test]
    fn closures_are_lookups() {
        let lookup = |_: &dyn DocumentStore, _: &Path, field: &str| {
            (field == "known").then(|| "value".to_string())
        };
        let store = InMemoryStore::new();
        assert_eq!(
            lookup.resolve(&store, Path::new(""), "known"),
            Some("value".to_string())
        );
        assert_eq!(lookup.resolve(&store, Path::new(""), "other"), None);
    }
}
