//! Analyzer verdicts and the closed set of rejection codes.

use serde::{Deserialize, Serialize};

/// Coded rejection reason attached to a failed record.
///
/// The wire form (snake_case tag) is the only form ever persisted or
/// returned to clients; the enum keeps the set closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionCode {
    SizeValidationFailed,
    MultipleFacesDetected,
    BlurryImageDetected,
    DuplicateImageDetected,
    FormatValidationFailed,
    ProcessingError,
}

impl RejectionCode {
    /// Wire/tag form of the code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SizeValidationFailed => "size_validation_failed",
            Self::MultipleFacesDetected => "multiple_faces_detected",
            Self::BlurryImageDetected => "blurry_image_detected",
            Self::DuplicateImageDetected => "duplicate_image_detected",
            Self::FormatValidationFailed => "format_validation_failed",
            Self::ProcessingError => "processing_error",
        }
    }
}

impl std::fmt::Display for RejectionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single analyzer stage.
///
/// Diagnostics are opaque JSON forwarded into the record's metadata; the
/// orchestrator never interprets them.
#[derive(Debug, Clone)]
pub enum Verdict {
    Accept {
        diagnostics: serde_json::Value,
    },
    Reject {
        code: RejectionCode,
        message: String,
        diagnostics: serde_json::Value,
    },
}

impl Verdict {
    pub fn accept(diagnostics: serde_json::Value) -> Self {
        Self::Accept { diagnostics }
    }

    pub fn reject(
        code: RejectionCode,
        message: impl Into<String>,
        diagnostics: serde_json::Value,
    ) -> Self {
        Self::Reject {
            code,
            message: message.into(),
            diagnostics,
        }
    }

    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept { .. })
    }
}
