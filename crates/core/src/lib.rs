//! Photogate core - pure admission-pipeline domain logic.
//!
//! Everything in this crate is a pure function over image bytes plus a
//! configuration struct: analyzer stages, verdict types, rejection codes,
//! failure categorization, and blob-key naming. No database or object
//! storage access - persistence lives in `photogate-db` / `photogate-storage`
//! and orchestration in `photogate-api`.

pub mod analyzers;
pub mod config;
pub mod error;
pub mod failure;
pub mod naming;
pub mod raster;
pub mod verdict;

pub use config::AnalyzerConfig;
pub use error::AnalyzerError;
pub use verdict::{RejectionCode, Verdict};
