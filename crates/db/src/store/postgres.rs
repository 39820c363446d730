//! Postgres record store.
//!
//! Single `images` table with a JSONB metadata column. The compare-and-set
//! transition is a guarded UPDATE; the shallow-merge update runs inside a
//! row-locked transaction so concurrent patches serialize per record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{HashCandidate, ImageMeta, ImageRecord, ImageStatus, NewImageRecord, RecordPatch};
use crate::store::RecordStore;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, original_name, original_size, original_path, processed_path, \
     processed_size, file_type, width, height, status, meta_data, created_at, updated_at";

/// Row shape; status is normalized on conversion.
#[derive(Debug, FromRow)]
struct ImageRow {
    id: Uuid,
    original_name: String,
    original_size: i64,
    original_path: String,
    processed_path: Option<String>,
    processed_size: Option<i64>,
    file_type: String,
    width: Option<i32>,
    height: Option<i32>,
    status: String,
    meta_data: Json<ImageMeta>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ImageRow> for ImageRecord {
    fn from(row: ImageRow) -> Self {
        Self {
            id: row.id,
            original_name: row.original_name,
            original_size: row.original_size,
            original_path: row.original_path,
            processed_path: row.processed_path,
            processed_size: row.processed_size,
            file_type: row.file_type,
            width: row.width,
            height: row.height,
            status: ImageStatus::from_stored(&row.status),
            meta_data: row.meta_data.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Production [`RecordStore`] backend.
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn create(&self, input: NewImageRecord) -> Result<ImageRecord, StoreError> {
        let query = format!(
            "INSERT INTO images (original_name, original_size, original_path, file_type, status)
             VALUES ($1, $2, $3, $4, 'PENDING')
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, ImageRow>(&query)
            .bind(&input.original_name)
            .bind(input.original_size)
            .bind(&input.original_path)
            .bind(&input.file_type)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ImageRecord>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM images WHERE id = $1");
        let row = sqlx::query_as::<_, ImageRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn update(
        &self,
        id: Uuid,
        patch: RecordPatch,
    ) -> Result<Option<ImageRecord>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let query = format!("SELECT {COLUMNS} FROM images WHERE id = $1 FOR UPDATE");
        let Some(row) = sqlx::query_as::<_, ImageRow>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let mut record: ImageRecord = row.into();
        patch.apply(&mut record, Utc::now());

        let query = format!(
            "UPDATE images SET
                status = $2,
                processed_path = $3,
                processed_size = $4,
                width = $5,
                height = $6,
                meta_data = $7,
                updated_at = $8
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, ImageRow>(&query)
            .bind(id)
            .bind(record.status.as_str())
            .bind(&record.processed_path)
            .bind(record.processed_size)
            .bind(record.width)
            .bind(record.height)
            .bind(Json(&record.meta_data))
            .bind(record.updated_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(row.into()))
    }

    async fn transition(
        &self,
        id: Uuid,
        from: ImageStatus,
        to: ImageStatus,
    ) -> Result<Option<ImageRecord>, StoreError> {
        let query = format!(
            "UPDATE images SET status = $3, updated_at = now()
             WHERE id = $1 AND status = $2
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, ImageRow>(&query)
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn list(
        &self,
        status: Option<ImageStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<ImageRecord>, i64), StoreError> {
        let (rows, total) = match status {
            Some(status) => {
                let query = format!(
                    "SELECT {COLUMNS} FROM images WHERE status = $1
                     ORDER BY created_at DESC OFFSET $2 LIMIT $3"
                );
                let rows = sqlx::query_as::<_, ImageRow>(&query)
                    .bind(status.as_str())
                    .bind(offset.max(0))
                    .bind(limit.max(0))
                    .fetch_all(&self.pool)
                    .await?;
                let total: (i64,) =
                    sqlx::query_as("SELECT COUNT(*) FROM images WHERE status = $1")
                        .bind(status.as_str())
                        .fetch_one(&self.pool)
                        .await?;
                (rows, total.0)
            }
            None => {
                let query = format!(
                    "SELECT {COLUMNS} FROM images
                     ORDER BY created_at DESC OFFSET $1 LIMIT $2"
                );
                let rows = sqlx::query_as::<_, ImageRow>(&query)
                    .bind(offset.max(0))
                    .bind(limit.max(0))
                    .fetch_all(&self.pool)
                    .await?;
                let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM images")
                    .fetch_one(&self.pool)
                    .await?;
                (rows, total.0)
            }
        };
        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    async fn find_processed_with_hash(&self) -> Result<Vec<HashCandidate>, StoreError> {
        #[derive(FromRow)]
        struct CandidateRow {
            id: Uuid,
            original_name: String,
            meta_data: Json<ImageMeta>,
        }

        // Matches the partial expression index from the initial migration.
        let rows = sqlx::query_as::<_, CandidateRow>(
            "SELECT id, original_name, meta_data FROM images
             WHERE status = 'PROCESSED' AND meta_data->>'pHash' IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| HashCandidate {
                id: row.id,
                original_name: row.original_name,
                meta_data: row.meta_data.0,
            })
            .collect())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM images WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }
}
