//! Mapping of uncaught pipeline exceptions to user-facing failures.
//!
//! When a stage errors out (as opposed to rejecting), the orchestrator
//! matches the error text against a fixed substring table to choose a
//! rejection code and a friendly message. The raw text is never shown to
//! users outside development mode.

use crate::verdict::RejectionCode;

/// Substring table, checked in order; first match wins.
const CATEGORIES: &[(&[&str], RejectionCode, &str)] = &[
    (
        &["duplicate"],
        RejectionCode::DuplicateImageDetected,
        "This image appears to be a duplicate of an existing photo.",
    ),
    (
        &["resolution", "dimensions"],
        RejectionCode::SizeValidationFailed,
        "Image resolution is too low. Please upload a larger photo.",
    ),
    (
        &["size"],
        RejectionCode::SizeValidationFailed,
        "Image file size is too small. Please upload a higher quality photo.",
    ),
    (
        &["format", "unsupported"],
        RejectionCode::FormatValidationFailed,
        "Unsupported image format. Please upload a JPEG, PNG or HEIC photo.",
    ),
    (
        &["face"],
        RejectionCode::MultipleFacesDetected,
        "Multiple faces detected in the image. Please upload a photo with only one person.",
    ),
];

const FALLBACK_MESSAGE: &str = "Image processing failed";

/// Categorize an exception message into a rejection code and user message.
pub fn categorize(error_text: &str) -> (RejectionCode, &'static str) {
    let lower = error_text.to_lowercase();
    for (needles, code, message) in CATEGORIES {
        if needles.iter().any(|needle| lower.contains(needle)) {
            return (*code, message);
        }
    }
    (RejectionCode::ProcessingError, FALLBACK_MESSAGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_wins_first() {
        let (code, _) = categorize("Duplicate image found during size check");
        assert_eq!(code, RejectionCode::DuplicateImageDetected);
    }

    #[test]
    fn resolution_and_dimensions_map_to_size_code() {
        assert_eq!(
            categorize("image dimensions out of range").0,
            RejectionCode::SizeValidationFailed
        );
        assert_eq!(
            categorize("Resolution too low").0,
            RejectionCode::SizeValidationFailed
        );
    }

    #[test]
    fn unsupported_decoder_reads_as_format_failure() {
        let (code, message) = categorize(
            "Image decode failed: The image format could not be determined",
        );
        assert_eq!(code, RejectionCode::FormatValidationFailed);
        assert!(message.contains("Unsupported"));
    }

    #[test]
    fn unknown_text_is_generic_processing_error() {
        let (code, message) = categorize("connection reset by peer");
        assert_eq!(code, RejectionCode::ProcessingError);
        assert_eq!(message, "Image processing failed");
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(
            categorize("UNSUPPORTED codec").0,
            RejectionCode::FormatValidationFailed
        );
    }
}
