//! The record-store seam.
//!
//! Two backends implement [`RecordStore`]: [`memory::MemoryRecordStore`]
//! (hermetic, used by tests and DATABASE_URL-less development) and
//! [`postgres::PgRecordStore`] (production). Handlers and the pipeline
//! only ever see `Arc<dyn RecordStore>`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{HashCandidate, ImageRecord, ImageStatus, NewImageRecord, RecordPatch};

/// Persistent mapping from image id to image record.
///
/// Guarantees required of every backend:
/// - `update` and `transition` are linearizable per record.
/// - `transition` is a compare-and-set: it succeeds only while the record
///   still has the expected `from` status, which is what makes the
///   pipeline single-writer per image id.
/// - `find_processed_with_hash` is a snapshot read; concurrent inserts may
///   or may not appear.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new record with a fresh id, server timestamps, and
    /// PENDING status.
    async fn create(&self, input: NewImageRecord) -> Result<ImageRecord, StoreError>;

    /// Fetch by id.
    async fn get(&self, id: Uuid) -> Result<Option<ImageRecord>, StoreError>;

    /// Apply a partial update atomically, bumping `updated_at`.
    /// Returns `None` when the record does not exist.
    async fn update(&self, id: Uuid, patch: RecordPatch)
        -> Result<Option<ImageRecord>, StoreError>;

    /// Compare-and-set status change. Returns the updated record, or `None`
    /// when the record is missing or its status no longer matches `from`.
    async fn transition(
        &self,
        id: Uuid,
        from: ImageStatus,
        to: ImageStatus,
    ) -> Result<Option<ImageRecord>, StoreError>;

    /// Page through records, newest first, optionally filtered by status.
    /// Returns the page plus the total matching count.
    async fn list(
        &self,
        status: Option<ImageStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<ImageRecord>, i64), StoreError>;

    /// Every PROCESSED record carrying a stored fingerprint, projected to
    /// the fields duplicate detection needs.
    async fn find_processed_with_hash(&self) -> Result<Vec<HashCandidate>, StoreError>;

    /// Remove by id. Returns whether a record was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Cheap reachability probe for the health endpoint.
    async fn health_check(&self) -> Result<(), StoreError>;
}
