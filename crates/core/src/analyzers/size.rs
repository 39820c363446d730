//! Size/resolution stage.
//!
//! Reads only the image header (no full pixel decode) and the raw byte
//! length, so it stays the cheapest stage and runs first.

use std::io::Cursor;

use serde_json::json;

use crate::config::SizeConfig;
use crate::error::AnalyzerError;
use crate::verdict::{RejectionCode, Verdict};

/// Validate minimum resolution and file size.
pub fn analyze(bytes: &[u8], cfg: &SizeConfig) -> Result<Verdict, AnalyzerError> {
    let (width, height) = read_dimensions(bytes)?;

    if width < cfg.min_width || height < cfg.min_height {
        let message = format!(
            "Image resolution is too low. Minimum required: {}x{}. Provided: {}x{}.",
            cfg.min_width, cfg.min_height, width, height
        );
        return Ok(Verdict::reject(
            RejectionCode::SizeValidationFailed,
            message,
            json!({ "width": width, "height": height }),
        ));
    }

    let byte_length = bytes.len() as u64;
    if byte_length < cfg.min_bytes {
        let message = format!(
            "Image file size is too small. Minimum required: {}KB. Provided: {:.1}KB.",
            cfg.min_bytes / 1024,
            byte_length as f64 / 1024.0
        );
        return Ok(Verdict::reject(
            RejectionCode::SizeValidationFailed,
            message,
            json!({ "width": width, "height": height, "byteLength": byte_length }),
        ));
    }

    Ok(Verdict::accept(json!({
        "width": width,
        "height": height,
        "byteLength": byte_length,
    })))
}

/// Decode only the header to get pixel dimensions.
pub(crate) fn read_dimensions(bytes: &[u8]) -> Result<(u32, u32), AnalyzerError> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| AnalyzerError::Internal(format!("unreadable image header: {e}")))?;
    Ok(reader.into_dimensions()?)
}
