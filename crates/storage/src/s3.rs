//! S3-compatible blob store.
//!
//! Works against AWS as well as MinIO/LocalStack via a custom endpoint and
//! forced path-style addressing. Read URLs are presigned GetObject
//! requests bounded by the caller-supplied TTL.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

use crate::error::StorageError;
use crate::{BlobStore, Namespace};

pub struct S3BlobStore {
    client: S3Client,
    bucket: String,
}

impl S3BlobStore {
    pub async fn new(
        bucket: &str,
        region: &str,
        endpoint_url: Option<&str>,
        force_path_style: bool,
    ) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;

        let mut builder = S3ConfigBuilder::from(&aws_config);
        if let Some(endpoint) = endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }
        if force_path_style {
            builder = builder.force_path_style(true);
        }
        let client = S3Client::from_conf(builder.build());

        tracing::info!(bucket, region, "S3 blob store initialized");
        Self {
            client,
            bucket: bucket.to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(
        &self,
        namespace: Namespace,
        file_name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError> {
        let key = format!("{}/{}", namespace.as_str(), file_name);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::Unavailable(format!("put {key}: {e}")))?;
        tracing::debug!(key, size = bytes.len(), "stored blob");
        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map(|s| s.is_no_such_key()).unwrap_or(false) {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::Unavailable(format!("get {key}: {e}"))
                }
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Unavailable(format!("read {key}: {e}")))?;
        Ok(bytes.into_bytes().to_vec())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        // DeleteObject succeeds for missing keys, which gives us the
        // silent-on-missing contract for free.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Unavailable(format!("delete {key}: {e}")))?;
        Ok(())
    }

    async fn signed_url(&self, key: &str, ttl_secs: u64) -> Result<String, StorageError> {
        let presigning = PresigningConfig::expires_in(Duration::from_secs(ttl_secs.max(1)))
            .map_err(|e| StorageError::Unavailable(format!("presign config: {e}")))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Unavailable(format!("presign {key}: {e}")))?;
        Ok(request.uri().to_string())
    }
}
