//! Storage-type-agnostic object store for image blobs.
//!
//! Two namespaces by convention: `original/` for uploads and `processed/`
//! for canonical derivatives. Backends must preserve byte-exact
//! round-trips; the factory picks one from configuration.

pub mod error;
pub mod local;
pub mod s3;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

pub use error::StorageError;
pub use local::LocalBlobStore;
pub use s3::S3BlobStore;

/// The two blob namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Original,
    Processed,
}

impl Namespace {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Processed => "processed",
        }
    }
}

/// Pluggable object store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under `namespace/file_name`, returning the stored key.
    /// Idempotent by key: a second put with the same key overwrites.
    async fn put(
        &self,
        namespace: Namespace,
        file_name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Fetch a blob by stored key.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Delete a blob by stored key. Silent when the key is already gone.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Mint a time-bounded read URL. The local backend returns a plain URL
    /// served by the application and ignores the TTL.
    async fn signed_url(&self, key: &str, ttl_secs: u64) -> Result<String, StorageError>;
}

/// Backend selection, normally derived from `STORAGE_TYPE`.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    Local {
        root: PathBuf,
        /// Base URL the application serves `uploads/` under.
        public_base_url: String,
    },
    S3 {
        bucket: String,
        region: String,
        /// Custom endpoint for MinIO / LocalStack style deployments.
        endpoint_url: Option<String>,
        force_path_style: bool,
    },
}

/// Build the configured backend.
pub async fn create_blob_store(config: &StorageConfig) -> Result<Arc<dyn BlobStore>, StorageError> {
    match config {
        StorageConfig::Local {
            root,
            public_base_url,
        } => {
            let store = LocalBlobStore::new(root.clone(), public_base_url.clone());
            store.validate().await?;
            Ok(Arc::new(store))
        }
        StorageConfig::S3 {
            bucket,
            region,
            endpoint_url,
            force_path_style,
        } => Ok(Arc::new(
            S3BlobStore::new(bucket, region, endpoint_url.as_deref(), *force_path_style).await,
        )),
    }
}

/// Content type for an image file extension.
pub fn content_type_for(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "heif" => "image/heif",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_match_layout() {
        assert_eq!(Namespace::Original.as_str(), "original");
        assert_eq!(Namespace::Processed.as_str(), "processed");
    }

    #[test]
    fn content_types_cover_upload_extensions() {
        assert_eq!(content_type_for("jpg"), "image/jpeg");
        assert_eq!(content_type_for("JPEG"), "image/jpeg");
        assert_eq!(content_type_for("png"), "image/png");
        assert_eq!(content_type_for("heif"), "image/heif");
        assert_eq!(content_type_for("exe"), "application/octet-stream");
    }
}
