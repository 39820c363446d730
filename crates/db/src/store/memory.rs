//! In-memory record store.
//!
//! A single `RwLock` over the whole map makes every mutation trivially
//! linearizable per record. Creation order is tracked explicitly so that
//! newest-first listing is stable even when two records share a
//! creation timestamp.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{HashCandidate, ImageMeta, ImageRecord, ImageStatus, NewImageRecord, RecordPatch};
use crate::store::RecordStore;

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    record: ImageRecord,
}

/// Hermetic [`RecordStore`] backend.
#[derive(Default)]
pub struct MemoryRecordStore {
    entries: RwLock<HashMap<Uuid, Entry>>,
    next_seq: AtomicU64,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(&self, input: NewImageRecord) -> Result<ImageRecord, StoreError> {
        let now = Utc::now();
        let record = ImageRecord {
            id: Uuid::new_v4(),
            original_name: input.original_name,
            original_size: input.original_size,
            original_path: input.original_path,
            processed_path: None,
            processed_size: None,
            file_type: input.file_type,
            width: None,
            height: None,
            status: ImageStatus::Pending,
            meta_data: ImageMeta::default(),
            created_at: now,
            updated_at: now,
        };
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.entries.write().await.insert(
            record.id,
            Entry {
                seq,
                record: record.clone(),
            },
        );
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ImageRecord>, StoreError> {
        Ok(self.entries.read().await.get(&id).map(|e| e.record.clone()))
    }

    async fn update(
        &self,
        id: Uuid,
        patch: RecordPatch,
    ) -> Result<Option<ImageRecord>, StoreError> {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get_mut(&id) else {
            return Ok(None);
        };
        patch.apply(&mut entry.record, Utc::now());
        Ok(Some(entry.record.clone()))
    }

    async fn transition(
        &self,
        id: Uuid,
        from: ImageStatus,
        to: ImageStatus,
    ) -> Result<Option<ImageRecord>, StoreError> {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get_mut(&id) else {
            return Ok(None);
        };
        if entry.record.status != from {
            return Ok(None);
        }
        entry.record.status = to;
        entry.record.updated_at = Utc::now();
        Ok(Some(entry.record.clone()))
    }

    async fn list(
        &self,
        status: Option<ImageStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<ImageRecord>, i64), StoreError> {
        let entries = self.entries.read().await;
        let mut matching: Vec<&Entry> = entries
            .values()
            .filter(|e| status.is_none_or(|s| e.record.status == s))
            .collect();
        matching.sort_by(|a, b| {
            b.record
                .created_at
                .cmp(&a.record.created_at)
                .then(b.seq.cmp(&a.seq))
        });

        let total = matching.len() as i64;
        let offset = offset.max(0) as usize;
        let limit = limit.max(0) as usize;
        let page = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|e| e.record.clone())
            .collect();
        Ok((page, total))
    }

    async fn find_processed_with_hash(&self) -> Result<Vec<HashCandidate>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .values()
            .filter(|e| {
                e.record.status == ImageStatus::Processed && e.record.meta_data.p_hash.is_some()
            })
            .map(|e| HashCandidate {
                id: e.record.id,
                original_name: e.record.original_name.clone(),
                meta_data: e.record.meta_data.clone(),
            })
            .collect())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.entries.write().await.remove(&id).is_some())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_input(name: &str) -> NewImageRecord {
        NewImageRecord {
            original_name: name.to_string(),
            original_size: 4096,
            original_path: format!("original/{name}"),
            file_type: "jpg".to_string(),
        }
    }

    #[tokio::test]
    async fn create_assigns_id_pending_status_and_timestamps() {
        let store = MemoryRecordStore::new();
        let record = store.create(new_input("a.jpg")).await.unwrap();
        assert_eq!(record.status, ImageStatus::Pending);
        assert_eq!(record.created_at, record.updated_at);
        assert!(record.processed_path.is_none());

        let fetched = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.original_name, "a.jpg");
    }

    #[tokio::test]
    async fn get_unknown_is_none() {
        let store = MemoryRecordStore::new();
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_merges_metadata_and_bumps_updated_at() {
        let store = MemoryRecordStore::new();
        let record = store.create(new_input("a.jpg")).await.unwrap();

        let patch = RecordPatch {
            meta: Some(ImageMeta {
                p_hash: Some("00".repeat(16)),
                ..Default::default()
            }),
            ..Default::default()
        };
        let updated = store.update(record.id, patch).await.unwrap().unwrap();
        assert!(updated.meta_data.p_hash.is_some());
        assert!(updated.updated_at >= record.updated_at);

        // Second patch keeps the fingerprint.
        let patch = RecordPatch {
            status: Some(ImageStatus::Failed),
            meta: Some(ImageMeta {
                rejection_reason: Some("blurry".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let updated = store.update(record.id, patch).await.unwrap().unwrap();
        assert_eq!(updated.status, ImageStatus::Failed);
        assert!(updated.meta_data.p_hash.is_some());
        assert_eq!(updated.meta_data.rejection_reason.as_deref(), Some("blurry"));
    }

    #[tokio::test]
    async fn update_missing_record_is_none() {
        let store = MemoryRecordStore::new();
        let result = store
            .update(Uuid::new_v4(), RecordPatch::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn transition_is_compare_and_set() {
        let store = MemoryRecordStore::new();
        let record = store.create(new_input("a.jpg")).await.unwrap();

        let claimed = store
            .transition(record.id, ImageStatus::Pending, ImageStatus::Processing)
            .await
            .unwrap();
        assert_eq!(claimed.unwrap().status, ImageStatus::Processing);

        // A second claim loses: the record is no longer PENDING.
        let second = store
            .transition(record.id, ImageStatus::Pending, ImageStatus::Processing)
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn stale_transition_cannot_demote_a_terminal_record() {
        let store = MemoryRecordStore::new();
        let record = store.create(new_input("a.jpg")).await.unwrap();

        // A run claims the record and commits its terminal status.
        store
            .transition(record.id, ImageStatus::Pending, ImageStatus::Processing)
            .await
            .unwrap();
        store
            .update(
                record.id,
                RecordPatch {
                    status: Some(ImageStatus::Processed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // A reset based on the stale PROCESSING observation loses.
        let stale = store
            .transition(record.id, ImageStatus::Processing, ImageStatus::Pending)
            .await
            .unwrap();
        assert!(stale.is_none());
        let current = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(current.status, ImageStatus::Processed);
    }

    #[tokio::test]
    async fn list_is_newest_first_with_status_filter_and_total() {
        let store = MemoryRecordStore::new();
        let a = store.create(new_input("a.jpg")).await.unwrap();
        let b = store.create(new_input("b.jpg")).await.unwrap();
        let c = store.create(new_input("c.jpg")).await.unwrap();
        store
            .update(
                b.id,
                RecordPatch {
                    status: Some(ImageStatus::Processed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let (page, total) = store.list(None, 0, 10).await.unwrap();
        assert_eq!(total, 3);
        let ids: Vec<Uuid> = page.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![c.id, b.id, a.id]);

        let (page, total) = store.list(Some(ImageStatus::Pending), 0, 10).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(page.len(), 2);

        let (page, total) = store.list(None, 1, 1).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, b.id);
    }

    #[tokio::test]
    async fn hash_candidates_require_processed_status_and_fingerprint() {
        let store = MemoryRecordStore::new();
        let processed = store.create(new_input("hashed.jpg")).await.unwrap();
        let failed = store.create(new_input("failed.jpg")).await.unwrap();
        let bare = store.create(new_input("bare.jpg")).await.unwrap();

        let fingerprint = ImageMeta {
            p_hash: Some("ab".repeat(16)),
            ..Default::default()
        };
        store
            .update(
                processed.id,
                RecordPatch {
                    status: Some(ImageStatus::Processed),
                    meta: Some(fingerprint.clone()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        // FAILED with a fingerprint (duplicate rejection) is not a candidate.
        store
            .update(
                failed.id,
                RecordPatch {
                    status: Some(ImageStatus::Failed),
                    meta: Some(fingerprint),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        // PROCESSED without a fingerprint is not a candidate either.
        store
            .update(
                bare.id,
                RecordPatch {
                    status: Some(ImageStatus::Processed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let candidates = store.find_processed_with_hash().await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, processed.id);
        assert_eq!(candidates[0].original_name, "hashed.jpg");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryRecordStore::new();
        let record = store.create(new_input("a.jpg")).await.unwrap();
        assert!(store.delete(record.id).await.unwrap());
        assert!(!store.delete(record.id).await.unwrap());
        assert!(store.get(record.id).await.unwrap().is_none());
    }
}
