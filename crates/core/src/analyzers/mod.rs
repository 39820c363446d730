//! Admission-pipeline analyzer stages.
//!
//! Each stage is a pure function from image bytes plus its config section
//! to a [`crate::Verdict`]. Stages have no side effects beyond reading the
//! bytes; anything a stage learns travels in the verdict's diagnostics.
//! The orchestrator runs them in a fixed cheapest-first order: size, face
//! heuristic, blur heuristic, perceptual-hash duplicate check.

pub mod blur;
pub mod face;
pub mod phash;
pub mod size;
