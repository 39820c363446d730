//! Local-filesystem blob store.
//!
//! Blobs live under `<root>/<namespace>/<file name>`. Keys are validated
//! against path traversal before they ever touch the filesystem, and the
//! backend performs a write/read/delete round-trip at startup so
//! permission or mount problems surface immediately.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::{BlobStore, Namespace};

pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: PathBuf, public_base_url: String) -> Self {
        let public_base_url = public_base_url.trim_end_matches('/').to_string();
        Self {
            root,
            public_base_url,
        }
    }

    /// Startup round-trip check: write, read back, delete.
    pub async fn validate(&self) -> Result<(), StorageError> {
        let probe = self.root.join(".health-check");
        if let Some(parent) = probe.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Unavailable(format!("cannot create root: {e}")))?;
        }
        tokio::fs::write(&probe, b"ok")
            .await
            .map_err(|e| StorageError::Unavailable(format!("cannot write: {e}")))?;
        let read = tokio::fs::read(&probe)
            .await
            .map_err(|e| StorageError::Unavailable(format!("cannot read back: {e}")))?;
        tokio::fs::remove_file(&probe)
            .await
            .map_err(|e| StorageError::Unavailable(format!("cannot delete: {e}")))?;
        if read != b"ok" {
            return Err(StorageError::Unavailable(
                "round-trip returned different bytes".to_string(),
            ));
        }
        Ok(())
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

/// Reject traversal and oddball characters before touching the filesystem.
fn validate_key(key: &str) -> Result<(), StorageError> {
    let well_formed = !key.is_empty()
        && !key.starts_with('/')
        && !key.contains('\\')
        && !key.split('/').any(|part| part.is_empty() || part == "." || part == "..")
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/'));
    if well_formed {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(
        &self,
        namespace: Namespace,
        file_name: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<String, StorageError> {
        let key = format!("{}/{}", namespace.as_str(), file_name);
        let path = self.resolve(&key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        tracing::debug!(key, size = bytes.len(), "stored blob");
        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(StorageError::Unavailable(e.to_string())),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Unavailable(e.to_string())),
        }
    }

    async fn signed_url(&self, key: &str, _ttl_secs: u64) -> Result<String, StorageError> {
        validate_key(key)?;
        Ok(format!("{}/uploads/{key}", self.public_base_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, LocalBlobStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path().to_path_buf(), "http://localhost:3000/".into());
        (dir, store)
    }

    #[tokio::test]
    async fn round_trip_is_byte_exact() {
        let (_dir, store) = store();
        let bytes: Vec<u8> = (0..=255).collect();
        let key = store
            .put(Namespace::Original, "img.jpg", &bytes, "image/jpeg")
            .await
            .unwrap();
        assert_eq!(key, "original/img.jpg");
        assert_eq!(store.get(&key).await.unwrap(), bytes);
    }

    #[tokio::test]
    async fn put_is_idempotent_by_key() {
        let (_dir, store) = store();
        store
            .put(Namespace::Processed, "a.jpg", b"first", "image/jpeg")
            .await
            .unwrap();
        let key = store
            .put(Namespace::Processed, "a.jpg", b"second", "image/jpeg")
            .await
            .unwrap();
        assert_eq!(store.get(&key).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let (_dir, store) = store();
        match store.get("original/nope.jpg").await {
            Err(StorageError::NotFound(key)) => assert_eq!(key, "original/nope.jpg"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_silent_on_missing() {
        let (_dir, store) = store();
        let key = store
            .put(Namespace::Original, "gone.png", b"x", "image/png")
            .await
            .unwrap();
        store.delete(&key).await.unwrap();
        store.delete(&key).await.unwrap();
        assert!(matches!(store.get(&key).await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let (_dir, store) = store();
        for key in ["../etc/passwd", "/abs", "a//b", "original/..", "a\\b", ""] {
            assert!(
                matches!(store.get(key).await, Err(StorageError::InvalidKey(_))),
                "key {key:?} should be invalid"
            );
        }
    }

    #[tokio::test]
    async fn signed_url_is_plain_and_unbounded() {
        let (_dir, store) = store();
        let url = store.signed_url("original/a.jpg", 3600).await.unwrap();
        assert_eq!(url, "http://localhost:3000/uploads/original/a.jpg");
    }

    #[tokio::test]
    async fn validate_round_trips() {
        let (_dir, store) = store();
        store.validate().await.unwrap();
    }
}
