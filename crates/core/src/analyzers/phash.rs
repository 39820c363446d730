//! Perceptual fingerprint and duplicate matching.
//!
//! The fingerprint thresholds a 32x32 grayscale reduction against its mean,
//! packs the bits LSB-first, and persists the MD5 hex digest of that buffer
//! (32 lowercase hex characters). Matching against the accepted corpus is a
//! pure function over candidate projections - the caller supplies the
//! snapshot, nothing here touches a store.

use image::imageops::FilterType;
use md5::{Digest, Md5};
use uuid::Uuid;

use crate::config::DuplicateConfig;
use crate::error::AnalyzerError;

/// Projection of an accepted record offered to the duplicate check.
#[derive(Debug, Clone)]
pub struct DuplicateCandidate {
    pub id: Uuid,
    pub original_name: String,
    pub p_hash: Option<String>,
}

/// A positive duplicate verdict, naming the colliding record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateHit {
    pub id: Uuid,
    pub original_name: String,
    /// Hamming distance for hash matches; `None` for the filename fast path.
    pub distance: Option<u32>,
}

/// Compute the persisted perceptual fingerprint for the given image bytes.
pub fn compute(bytes: &[u8], cfg: &DuplicateConfig) -> Result<String, AnalyzerError> {
    let img = image::load_from_memory(bytes)?;
    let side = cfg.hash_size.max(1);
    // fit=fill: exact target dimensions, aspect ratio ignored.
    let gray = img.resize_exact(side, side, FilterType::Triangle).to_luma8();
    let data = gray.as_raw();
    if data.is_empty() {
        return Err(AnalyzerError::Internal("empty fingerprint buffer".into()));
    }

    let average = data.iter().map(|&v| u64::from(v)).sum::<u64>() as f64 / data.len() as f64;

    let mut packed = vec![0u8; data.len().div_ceil(8)];
    for (i, &pixel) in data.iter().enumerate() {
        if f64::from(pixel) >= average {
            packed[i / 8] |= 1 << (i % 8);
        }
    }

    let digest = Md5::digest(&packed);
    Ok(format!("{digest:x}"))
}

/// Compare a new image against the accepted corpus.
///
/// Filename equality (case-insensitive) short-circuits; otherwise the first
/// candidate within the configured Hamming distance wins. Candidates without
/// a stored hash only participate in the filename path.
pub fn find_duplicate(
    hash: &str,
    original_name: &str,
    candidates: &[DuplicateCandidate],
    cfg: &DuplicateConfig,
) -> Option<DuplicateHit> {
    for candidate in candidates {
        if candidate.original_name.eq_ignore_ascii_case(original_name) {
            return Some(DuplicateHit {
                id: candidate.id,
                original_name: candidate.original_name.clone(),
                distance: None,
            });
        }
    }

    for candidate in candidates {
        let Some(candidate_hash) = candidate.p_hash.as_deref() else {
            continue;
        };
        let Some(distance) = hamming_hex(hash, candidate_hash) else {
            continue;
        };
        if distance <= cfg.max_hamming_distance {
            return Some(DuplicateHit {
                id: candidate.id,
                original_name: candidate.original_name.clone(),
                distance: Some(distance),
            });
        }
    }

    None
}

/// Hamming distance between two hex strings, expanding each hex digit to
/// four bits. `None` when lengths differ or a digit fails to parse.
fn hamming_hex(a: &str, b: &str) -> Option<u32> {
    if a.len() != b.len() {
        return None;
    }
    let mut distance = 0u32;
    for (ca, cb) in a.chars().zip(b.chars()) {
        let da = ca.to_digit(16)?;
        let db = cb.to_digit(16)?;
        distance += (da ^ db).count_ones();
    }
    Some(distance)
}
