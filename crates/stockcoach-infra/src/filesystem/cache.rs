//! File-backed key-value cache.
//!
//! Each entry is one JSON file at `{root}/{namespace}/{key}.json`. Writes go
//! to a temporary sibling first and are renamed into place, so a reader never
//! sees a half-written snapshot.

use std::path::{Path, PathBuf};

use stockcoach_core::storage::kv_store::KvStore;
use stockcoach_types::error::RepositoryError;
use tracing::debug;

/// `KvStore` over plain JSON files.
#[derive(Debug, Clone)]
pub struct FileKvStore {
    root: PathBuf,
}

impl FileKvStore {
    /// A store rooted at `root` (usually `{data_dir}/cache`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of one entry. Keys are escaped so any user id maps to a single
    /// file name inside the namespace directory.
    pub fn entry_path(&self, namespace: &str, key: &str) -> PathBuf {
        self.root
            .join(escape(namespace))
            .join(format!("{}.json", escape(key)))
    }
}

fn escape(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for b in segment.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

fn io_error(path: &Path, e: std::io::Error) -> RepositoryError {
    RepositoryError::Cache(format!("{}: {e}", path.display()))
}

impl KvStore for FileKvStore {
    async fn get(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, RepositoryError> {
        let path = self.entry_path(namespace, key);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path, e)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| RepositoryError::Cache(format!("{}: invalid JSON: {e}", path.display())))
    }

    async fn set(
        &self,
        namespace: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), RepositoryError> {
        let path = self.entry_path(namespace, key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }

        let body = serde_json::to_vec(value)
            .map_err(|e| RepositoryError::Cache(format!("serialize: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| io_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_error(&path, e))?;

        debug!(namespace, key, "cache entry written");
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), RepositoryError> {
        let path = self.entry_path(namespace, key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_set_get_delete() {
        let dir = tempdir().unwrap();
        let store = FileKvStore::new(dir.path());

        assert_eq!(store.get("messages", "user-1").await.unwrap(), None);

        let value = json!([{"id": "x", "content": "hi"}]);
        store.set("messages", "user-1", &value).await.unwrap();
        assert_eq!(store.get("messages", "user-1").await.unwrap(), Some(value));
        assert!(dir.path().join("messages").join("user-1.json").exists());

        store.delete("messages", "user-1").await.unwrap();
        assert_eq!(store.get("messages", "user-1").await.unwrap(), None);
        // Deleting a missing entry is fine.
        store.delete("messages", "user-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_set_overwrites_snapshot() {
        let dir = tempdir().unwrap();
        let store = FileKvStore::new(dir.path());

        store.set("messages", "u", &json!([1, 2])).await.unwrap();
        store.set("messages", "u", &json!([1, 2, 3])).await.unwrap();
        assert_eq!(store.get("messages", "u").await.unwrap(), Some(json!([1, 2, 3])));
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_an_error() {
        let dir = tempdir().unwrap();
        let store = FileKvStore::new(dir.path());
        let path = store.entry_path("messages", "u");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();

        let err = store.get("messages", "u").await.unwrap_err();
        assert!(matches!(err, RepositoryError::Cache(_)));
    }

    #[test]
    fn test_keys_cannot_escape_namespace() {
        let store = FileKvStore::new("/data/cache");
        assert_eq!(
            store.entry_path("messages", "../etc/passwd"),
            PathBuf::from("/data/cache/messages/%2E%2E%2Fetc%2Fpasswd.json")
        );
        assert_eq!(
            store.entry_path("geo", "ada@example.com"),
            PathBuf::from("/data/cache/geo/ada%40example%2Ecom.json")
        );
    }
}
