//! Record-store models and DTOs.

pub mod image;

pub use image::{HashCandidate, ImageMeta, ImageRecord, ImageStatus, NewImageRecord, RecordPatch};
