//! Pipeline orchestrator.
//!
//! `run` drives one image through the admission stages in fixed,
//! cheapest-first order: size, face heuristic (guarded), blur heuristic,
//! then the perceptual-hash duplicate check, which needs a corpus scan.
//! The record claim (PENDING -> PROCESSING) is a compare-and-set, so at
//! most one run mutates a record at a time; a run on anything but a
//! PENDING record is a no-op.

use std::sync::Arc;

use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use photogate_core::analyzers::{blur, face, phash, size};
use photogate_core::config::DerivativeConfig;
use photogate_core::{failure, naming, AnalyzerConfig, AnalyzerError, Verdict};
use photogate_db::models::{ImageMeta, ImageRecord, ImageStatus, RecordPatch};
use photogate_db::{RecordStore, StoreError};
use photogate_storage::{BlobStore, Namespace};
use uuid::Uuid;

pub struct Pipeline {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    analyzers: Arc<AnalyzerConfig>,
    development: bool,
}

/// Outcome of the stage sequence before it is written back to the record.
enum Evaluation {
    /// Every stage accepted; the derivative is stored.
    Processed(RecordPatch),
    /// A stage rejected; terminal FAILED patch.
    Rejected(RecordPatch),
}

impl Pipeline {
    pub fn new(
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        analyzers: Arc<AnalyzerConfig>,
        development: bool,
    ) -> Self {
        Self {
            records,
            blobs,
            analyzers,
            development,
        }
    }

    /// Run the admission pipeline for one image.
    ///
    /// Returns the record's final state, or `None` when the record was
    /// deleted before or during the run (a tolerated no-op).
    pub async fn run(&self, id: Uuid) -> Result<Option<ImageRecord>, StoreError> {
        let Some(record) = self
            .records
            .transition(id, ImageStatus::Pending, ImageStatus::Processing)
            .await?
        else {
            // Not PENDING (or already gone): leave the record unchanged.
            tracing::debug!(image_id = %id, "record not pending, skipping run");
            return self.records.get(id).await;
        };

        tracing::info!(image_id = %id, name = %record.original_name, "pipeline run started");
        let started = std::time::Instant::now();

        let patch = match self.evaluate(&record).await {
            Ok(Evaluation::Processed(patch)) => {
                tracing::info!(
                    image_id = %id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "image accepted"
                );
                patch
            }
            Ok(Evaluation::Rejected(patch)) => {
                tracing::info!(
                    image_id = %id,
                    reason = patch
                        .meta
                        .as_ref()
                        .and_then(|m| m.rejection_reason.as_deref())
                        .unwrap_or("unknown"),
                    "image rejected"
                );
                patch
            }
            Err(error_text) => {
                let (code, message) = failure::categorize(&error_text);
                tracing::error!(image_id = %id, error = %error_text, code = %code, "pipeline run errored");
                RecordPatch {
                    status: Some(ImageStatus::Failed),
                    meta: Some(ImageMeta {
                        rejection_reason: Some(message.to_string()),
                        validation_errors: Some(vec![code]),
                        error_detail: self.development.then(|| error_text),
                        ..Default::default()
                    }),
                    ..Default::default()
                }
            }
        };

        let updated = self.records.update(id, patch).await?;
        if updated.is_none() {
            tracing::debug!(image_id = %id, "record deleted mid-run, final update skipped");
        }
        Ok(updated)
    }

    /// Run the stages. `Err` carries the exception text for categorization.
    async fn evaluate(&self, record: &ImageRecord) -> Result<Evaluation, String> {
        let bytes: Arc<Vec<u8>> = match self.blobs.get(&record.original_path).await {
            Ok(bytes) => Arc::new(bytes),
            Err(e) => return Err(format!("original blob unreadable: {e}")),
        };

        // -- Stage 1: size/resolution --
        let verdict = self
            .run_stage({
                let bytes = Arc::clone(&bytes);
                let cfg = Arc::clone(&self.analyzers);
                move || size::analyze(&bytes, &cfg.size)
            })
            .await
            .map_err(|e| e.to_string())?;

        if let Verdict::Reject { .. } = verdict {
            return Ok(Evaluation::Rejected(reject_patch(verdict, None, None, None)));
        }
        // Original dimensions from the accepted size verdict; carried on
        // every terminal update from here on.
        let (width, height) = dimensions_from(&verdict);

        // -- Stage 2: face heuristic (guarded) --
        // A rejecting verdict is terminal, but an analyzer failure here is
        // not: log it and continue as an accept.
        match self
            .run_stage({
                let bytes = Arc::clone(&bytes);
                let cfg = Arc::clone(&self.analyzers);
                move || face::analyze_guarded(&bytes, &cfg.face)
            })
            .await
        {
            Ok(verdict @ Verdict::Reject { .. }) => {
                return Ok(Evaluation::Rejected(reject_patch(verdict, width, height, None)));
            }
            Ok(Verdict::Accept { .. }) => {}
            Err(e) => {
                tracing::warn!(image_id = %record.id, error = %e, "face analyzer failed, continuing");
            }
        }

        // -- Stage 3: blur heuristic --
        let verdict = self
            .run_stage({
                let bytes = Arc::clone(&bytes);
                let cfg = Arc::clone(&self.analyzers);
                move || blur::analyze(&bytes, &cfg.blur)
            })
            .await
            .map_err(|e| e.to_string())?;
        if let Verdict::Reject { .. } = verdict {
            return Ok(Evaluation::Rejected(reject_patch(verdict, width, height, None)));
        }

        // -- Stage 4: perceptual hash + duplicate check --
        let hash = self
            .run_stage({
                let bytes = Arc::clone(&bytes);
                let cfg = Arc::clone(&self.analyzers);
                move || phash::compute(&bytes, &cfg.duplicate)
            })
            .await
            .map_err(|e| e.to_string())?;

        if let Some(hit) = self.find_duplicate(record, &hash).await {
            let verdict = Verdict::reject(
                photogate_core::RejectionCode::DuplicateImageDetected,
                format!(
                    "This image is a duplicate of {} ({}).",
                    hit.id, hit.original_name
                ),
                serde_json::json!({ "distance": hit.distance }),
            );
            let extra = ImageMeta {
                p_hash: Some(hash),
                similar_to: Some(hit.id),
                ..Default::default()
            };
            return Ok(Evaluation::Rejected(reject_patch(
                verdict,
                width,
                height,
                Some(extra),
            )));
        }

        // -- All stages accepted: build and store the derivative --
        let (jpeg, derived_width, derived_height) = self
            .run_stage({
                let bytes = Arc::clone(&bytes);
                let cfg = Arc::clone(&self.analyzers);
                move || make_derivative(&bytes, &cfg.derivative)
            })
            .await
            .map_err(|e| e.to_string())?;

        let file_name = naming::derived_file_name(
            &record.original_path,
            Utc::now().timestamp_millis(),
        );
        let stored_key = self
            .blobs
            .put(Namespace::Processed, &file_name, &jpeg, "image/jpeg")
            .await
            .map_err(|e| format!("derivative store failed: {e}"))?;

        Ok(Evaluation::Processed(RecordPatch {
            status: Some(ImageStatus::Processed),
            processed_path: Some(stored_key),
            processed_size: Some(jpeg.len() as i64),
            width,
            height,
            meta: Some(ImageMeta {
                p_hash: Some(hash),
                width: Some(derived_width),
                height: Some(derived_height),
                format: Some("jpeg".to_string()),
                processing_time: Some(Utc::now()),
                ..Default::default()
            }),
        }))
    }

    /// Offload a CPU-bound stage to the blocking pool.
    async fn run_stage<T, F>(&self, stage: F) -> Result<T, AnalyzerError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, AnalyzerError> + Send + 'static,
    {
        tokio::task::spawn_blocking(stage)
            .await
            .map_err(|e| AnalyzerError::Internal(format!("stage task failed: {e}")))?
    }

    /// Snapshot the accepted corpus and look for a collision. Errors fail
    /// open: duplicate detection never turns a store hiccup into a
    /// user-facing rejection.
    async fn find_duplicate(
        &self,
        record: &ImageRecord,
        hash: &str,
    ) -> Option<phash::DuplicateHit> {
        let candidates = match self.records.find_processed_with_hash().await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(image_id = %record.id, error = %e, "duplicate scan failed, continuing");
                return None;
            }
        };
        let candidates: Vec<phash::DuplicateCandidate> = candidates
            .into_iter()
            .filter(|c| c.id != record.id)
            .map(|c| phash::DuplicateCandidate {
                id: c.id,
                original_name: c.original_name,
                p_hash: c.meta_data.p_hash,
            })
            .collect();
        phash::find_duplicate(hash, &record.original_name, &candidates, &self.analyzers.duplicate)
    }
}

/// Original dimensions out of a size-stage verdict's diagnostics.
fn dimensions_from(verdict: &Verdict) -> (Option<i32>, Option<i32>) {
    let diagnostics = match verdict {
        Verdict::Accept { diagnostics } | Verdict::Reject { diagnostics, .. } => diagnostics,
    };
    let width = diagnostics["width"].as_u64().map(|w| w as i32);
    let height = diagnostics["height"].as_u64().map(|h| h as i32);
    (width, height)
}

/// Terminal FAILED patch for a rejecting verdict.
fn reject_patch(
    verdict: Verdict,
    width: Option<i32>,
    height: Option<i32>,
    extra_meta: Option<ImageMeta>,
) -> RecordPatch {
    let Verdict::Reject {
        code,
        message,
        diagnostics,
    } = verdict
    else {
        unreachable!("reject_patch called with an accepting verdict");
    };

    let mut meta = ImageMeta {
        rejection_reason: Some(message),
        validation_errors: Some(vec![code]),
        diagnostics: Some(diagnostics),
        ..Default::default()
    };
    if let Some(extra) = extra_meta {
        meta.merge(extra);
    }

    RecordPatch {
        status: Some(ImageStatus::Failed),
        width,
        height,
        meta: Some(meta),
        ..Default::default()
    }
}

/// Canonical derivative: fit within the configured square without
/// enlargement, re-encoded as JPEG.
fn make_derivative(
    bytes: &[u8],
    cfg: &DerivativeConfig,
) -> Result<(Vec<u8>, u32, u32), AnalyzerError> {
    let img = image::load_from_memory(bytes)?;
    let img = if img.width() > cfg.max_dimension || img.height() > cfg.max_dimension {
        img.thumbnail(cfg.max_dimension, cfg.max_dimension)
    } else {
        img
    };
    // JPEG has no alpha channel; flatten unconditionally.
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let (width, height) = (rgb.width(), rgb.height());

    let mut buf = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, cfg.jpeg_quality))?;
    Ok((buf, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::png::PngEncoder;
    use image::RgbImage;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            image::Rgb([10, 200, 30]),
        ));
        let mut buf = Vec::new();
        img.write_with_encoder(PngEncoder::new(&mut buf)).unwrap();
        buf
    }

    #[test]
    fn derivative_shrinks_large_images_to_fit() {
        let (jpeg, w, h) = make_derivative(&png(1600, 1200), &DerivativeConfig::default()).unwrap();
        assert!(w <= 800 && h <= 800);
        assert_eq!((w, h), (800, 600));
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (800, 600));
    }

    #[test]
    fn derivative_never_enlarges() {
        let (_, w, h) = make_derivative(&png(400, 300), &DerivativeConfig::default()).unwrap();
        assert_eq!((w, h), (400, 300));
    }

    #[test]
    fn derivative_is_jpeg() {
        let (jpeg, _, _) = make_derivative(&png(100, 100), &DerivativeConfig::default()).unwrap();
        let format = image::guess_format(&jpeg).unwrap();
        assert_eq!(format, image::ImageFormat::Jpeg);
    }

    #[test]
    fn dimensions_extraction_reads_size_diagnostics() {
        let verdict = Verdict::accept(serde_json::json!({ "width": 900, "height": 700 }));
        assert_eq!(dimensions_from(&verdict), (Some(900), Some(700)));
        let verdict = Verdict::accept(serde_json::json!({}));
        assert_eq!(dimensions_from(&verdict), (None, None));
    }
}
