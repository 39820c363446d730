//! Handlers for the `/api/images` resource: batch upload, listing with
//! minted URLs, single fetch, delete, and manual re-processing.

use axum::extract::multipart::Multipart;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use photogate_core::naming;
use photogate_db::models::{ImageRecord, ImageStatus, NewImageRecord};
use photogate_storage::{content_type_for, Namespace};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::query::{ListImagesParams, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::state::AppState;

/// Maximum number of files per upload request.
pub const MAX_UPLOAD_FILES: usize = 10;

/// Maximum size of a single uploaded file.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Request body limit for the upload route: ten full-size files plus
/// multipart framing.
pub const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_FILES * MAX_UPLOAD_BYTES + 1024 * 1024;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Per-file summary returned from an upload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub id: Uuid,
    pub status: ImageStatus,
    pub original_name: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub images: Vec<UploadedImage>,
}

/// A record plus its minted read URLs.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageWithUrls {
    #[serde(flatten)]
    pub image: ImageRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub pages: i64,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub images: Vec<ImageWithUrls>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct GetResponse {
    pub success: bool,
    pub image: ImageWithUrls,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReprocessResponse {
    pub success: bool,
    pub message: String,
    pub image_id: Uuid,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/images
///
/// Multipart batch upload (`images[]`, 1-10 files, each <= 10 MiB,
/// extension in the accepted set). Stores each original, creates a PENDING
/// record, and schedules a pipeline run; returns per-file summaries
/// immediately while the runs proceed in the background.
///
/// Partial failure is per-file: successfully created records persist even
/// when a sibling file fails to store.
pub async fn upload_batch(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<UploadResponse>)> {
    let mut files: Vec<(String, String, axum::body::Bytes)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            // Non-file form fields are ignored.
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {e}")))?;

        if files.len() == MAX_UPLOAD_FILES {
            return Err(AppError::BadRequest(format!(
                "Too many files: at most {MAX_UPLOAD_FILES} per upload"
            )));
        }

        let ext = naming::file_extension(&file_name)
            .filter(|ext| naming::is_allowed_extension(ext))
            .ok_or_else(|| {
                AppError::BadRequest(format!(
                    "Unsupported file type for '{file_name}'. Allowed: {}",
                    naming::ALLOWED_UPLOAD_EXTENSIONS.join(", ")
                ))
            })?;

        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::BadRequest(format!(
                "File '{file_name}' exceeds the {} MiB limit",
                MAX_UPLOAD_BYTES / (1024 * 1024)
            )));
        }

        files.push((file_name, ext, bytes));
    }

    if files.is_empty() {
        return Err(AppError::BadRequest("No files uploaded".to_string()));
    }

    let mut images = Vec::with_capacity(files.len());
    let mut failures = 0usize;
    for (file_name, ext, bytes) in files {
        match admit_one(&state, &file_name, &ext, &bytes).await {
            Ok(summary) => images.push(summary),
            Err(e) => {
                failures += 1;
                tracing::error!(file = %file_name, error = %e, "upload failed for file");
            }
        }
    }

    if images.is_empty() {
        return Err(AppError::InternalError(format!(
            "all {failures} upload(s) failed"
        )));
    }

    let message = if failures == 0 {
        format!("{} image(s) uploaded", images.len())
    } else {
        format!("{} image(s) uploaded, {failures} failed", images.len())
    };

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            success: true,
            message,
            images,
        }),
    ))
}

/// Store one file's bytes, create its record, and schedule a run.
async fn admit_one(
    state: &AppState,
    file_name: &str,
    ext: &str,
    bytes: &[u8],
) -> AppResult<UploadedImage> {
    let blob_name = naming::original_file_name(Uuid::new_v4(), ext);
    let stored_key = state
        .blobs
        .put(Namespace::Original, &blob_name, bytes, content_type_for(ext))
        .await?;

    let record = state
        .records
        .create(NewImageRecord {
            original_name: file_name.to_string(),
            original_size: bytes.len() as i64,
            original_path: stored_key,
            file_type: ext.to_string(),
        })
        .await?;

    if state.scheduler.schedule(record.id).is_err() {
        // The record stays PENDING; a later re-process request picks it up.
        tracing::warn!(image_id = %record.id, "scheduler unavailable, record left pending");
    }

    Ok(UploadedImage {
        id: record.id,
        status: record.status,
        original_name: record.original_name,
    })
}

/// GET /api/images
///
/// Paginated listing, newest first, optionally filtered by status. Each
/// returned record carries minted read URLs.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListImagesParams>,
) -> AppResult<Json<ListResponse>> {
    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if page < 1 {
        return Err(AppError::BadRequest("page must be >= 1".to_string()));
    }
    if limit < 1 {
        return Err(AppError::BadRequest("limit must be >= 1".to_string()));
    }
    let limit = limit.min(MAX_PAGE_SIZE);

    let status = match &params.status {
        Some(raw) => Some(
            ImageStatus::parse_filter(raw)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown status '{raw}'")))?,
        ),
        None => None,
    };

    let (records, total) = state.records.list(status, (page - 1) * limit, limit).await?;

    let mut images = Vec::with_capacity(records.len());
    for record in records {
        images.push(with_urls(&state, record).await);
    }

    let pages = if total == 0 { 0 } else { (total + limit - 1) / limit };
    Ok(Json(ListResponse {
        success: true,
        images,
        pagination: Pagination {
            total,
            page,
            limit,
            pages,
        },
    }))
}

/// GET /api/images/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<GetResponse>> {
    let record = state
        .records
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Image {id} not found")))?;
    Ok(Json(GetResponse {
        success: true,
        image: with_urls(&state, record).await,
    }))
}

/// DELETE /api/images/{id}
///
/// Removes both blobs before the record. A blob-delete failure is logged
/// and the record is removed anyway.
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    let record = state
        .records
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Image {id} not found")))?;

    if let Err(e) = state.blobs.delete(&record.original_path).await {
        tracing::warn!(image_id = %id, key = %record.original_path, error = %e, "original blob delete failed");
    }
    if let Some(processed_path) = &record.processed_path {
        if let Err(e) = state.blobs.delete(processed_path).await {
            tracing::warn!(image_id = %id, key = %processed_path, error = %e, "processed blob delete failed");
        }
    }

    state.records.delete(id).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "Image deleted successfully".to_string(),
    }))
}

/// POST /api/images/{id}/process
///
/// Manual re-process: puts the record back to PENDING (whatever its
/// current state) and schedules a run. Already-PROCESSED records are
/// refused.
pub async fn reprocess(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<ReprocessResponse>)> {
    // The reset must not stomp a pipeline run that reaches PROCESSED
    // between our read and our write, so it goes through the store's
    // compare-and-set: a lost race means the status moved, and the re-read
    // re-applies the already-processed check before trying again.
    loop {
        let record = state
            .records
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Image {id} not found")))?;

        if record.status == ImageStatus::Processed {
            return Err(AppError::BadRequest(
                "Image has already been processed".to_string(),
            ));
        }

        if state
            .records
            .transition(id, record.status, ImageStatus::Pending)
            .await?
            .is_some()
        {
            break;
        }
    }

    state
        .scheduler
        .schedule(id)
        .map_err(|e| AppError::Unavailable(e.to_string()))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ReprocessResponse {
            success: true,
            message: "Image queued for processing".to_string(),
            image_id: id,
        }),
    ))
}

/// Mint read URLs for a record. Signing failures degrade to absent URLs
/// rather than failing the request.
async fn with_urls(state: &AppState, record: ImageRecord) -> ImageWithUrls {
    let ttl = state.config.signed_url_ttl_secs;

    let original_url = match state.blobs.signed_url(&record.original_path, ttl).await {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!(key = %record.original_path, error = %e, "signed URL minting failed");
            None
        }
    };

    let processed_url = match &record.processed_path {
        Some(key) => match state.blobs.signed_url(key, ttl).await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "signed URL minting failed");
                None
            }
        },
        None => None,
    };

    ImageWithUrls {
        image: record,
        original_url,
        processed_url,
    }
}
