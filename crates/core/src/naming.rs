//! Blob-key naming conventions.
//!
//! Originals land under `original/` keyed by record id; derivatives land
//! under `processed/` keyed by the original's stem plus a millisecond
//! timestamp, so re-processing never overwrites an earlier derivative.

use uuid::Uuid;

/// Extensions accepted at the upload boundary.
pub const ALLOWED_UPLOAD_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "heic", "heif"];

/// Lowercased extension of a filename, if it has one.
pub fn file_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Whether the extension is accepted at the upload boundary.
pub fn is_allowed_extension(ext: &str) -> bool {
    ALLOWED_UPLOAD_EXTENSIONS.contains(&ext)
}

/// File name (within the `original/` namespace) for an uploaded blob.
pub fn original_file_name(blob_id: Uuid, ext: &str) -> String {
    format!("{blob_id}.{ext}")
}

/// File name (within the `processed/` namespace) for the canonical
/// derivative of an original.
///
/// Uses the original key's file stem plus a millisecond timestamp, so a
/// re-processed image never overwrites an earlier derivative. Derivatives
/// are always JPEG.
pub fn derived_file_name(original_key: &str, timestamp_millis: i64) -> String {
    let file_name = original_key.rsplit('/').next().unwrap_or(original_key);
    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name);
    format!("{stem}-{timestamp_millis}.jpg")
}
