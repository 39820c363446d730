//! Image record entity, metadata map, status enum, and DTOs.

use chrono::{DateTime, Utc};
use photogate_core::RejectionCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of an image record.
///
/// Monotone through PENDING -> PROCESSING -> {PROCESSED, FAILED}; the only
/// transition back is an explicit re-process request resetting to PENDING.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImageStatus {
    Pending,
    Processing,
    Processed,
    // Earlier deployments wrote REJECTED and ERROR; both normalize to FAILED.
    #[serde(alias = "REJECTED", alias = "ERROR")]
    Failed,
}

impl ImageStatus {
    /// Canonical wire/database form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Processed => "PROCESSED",
            Self::Failed => "FAILED",
        }
    }

    /// Parse a stored status, normalizing legacy literals. Unknown strings
    /// normalize to FAILED with a warning rather than poisoning reads.
    pub fn from_stored(value: &str) -> Self {
        match value {
            "PENDING" => Self::Pending,
            "PROCESSING" => Self::Processing,
            "PROCESSED" => Self::Processed,
            "FAILED" | "REJECTED" | "ERROR" => Self::Failed,
            other => {
                tracing::warn!(status = other, "unknown stored image status, treating as FAILED");
                Self::Failed
            }
        }
    }

    /// Parse a caller-supplied filter value (case-insensitive, accepts the
    /// legacy literals). `None` for unrecognized input.
    pub fn parse_filter(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "PROCESSING" => Some(Self::Processing),
            "PROCESSED" => Some(Self::Processed),
            "FAILED" | "REJECTED" | "ERROR" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Structured metadata map written atomically with status changes.
///
/// All keys are optional; absent keys are omitted from serialized output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<Vec<RejectionCode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similar_to: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<DateTime<Utc>>,
    /// Opaque analyzer diagnostics from the deciding stage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<serde_json::Value>,
    /// Raw failure text; written only when the development flag is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl ImageMeta {
    /// Shallow merge: keys present in `patch` overwrite, absent keys keep
    /// their current value.
    pub fn merge(&mut self, patch: ImageMeta) {
        macro_rules! take {
            ($field:ident) => {
                if patch.$field.is_some() {
                    self.$field = patch.$field;
                }
            };
        }
        take!(rejection_reason);
        take!(validation_errors);
        take!(p_hash);
        take!(similar_to);
        take!(width);
        take!(height);
        take!(format);
        take!(processing_time);
        take!(diagnostics);
        take!(error_detail);
    }
}

// ---------------------------------------------------------------------------
// Record and DTOs
// ---------------------------------------------------------------------------

/// The persistent image entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: Uuid,
    pub original_name: String,
    pub original_size: i64,
    pub original_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_size: Option<i64>,
    pub file_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<i32>,
    pub status: ImageStatus,
    pub meta_data: ImageMeta,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// DTO for creating a new record. Id, timestamps, and the initial PENDING
/// status are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewImageRecord {
    pub original_name: String,
    pub original_size: i64,
    pub original_path: String,
    pub file_type: String,
}

/// Partial update applied atomically to a single record.
///
/// `meta` is shallow-merged into the existing metadata; every other field
/// overwrites when present.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub status: Option<ImageStatus>,
    pub processed_path: Option<String>,
    pub processed_size: Option<i64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub meta: Option<ImageMeta>,
}

impl RecordPatch {
    /// Apply to a record in place, bumping `updated_at`.
    pub fn apply(self, record: &mut ImageRecord, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(path) = self.processed_path {
            record.processed_path = Some(path);
        }
        if let Some(size) = self.processed_size {
            record.processed_size = Some(size);
        }
        if let Some(width) = self.width {
            record.width = Some(width);
        }
        if let Some(height) = self.height {
            record.height = Some(height);
        }
        if let Some(meta) = self.meta {
            record.meta_data.merge(meta);
        }
        record.updated_at = now;
    }
}

/// Duplicate-detection projection: every PROCESSED record with a stored
/// fingerprint, trimmed to the fields the matcher needs.
#[derive(Debug, Clone)]
pub struct HashCandidate {
    pub id: Uuid,
    pub original_name: String,
    pub meta_data: ImageMeta,
}
