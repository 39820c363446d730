/// Error raised by an analyzer stage itself, as distinct from a Reject
/// verdict. The orchestrator decides whether a stage error aborts the run
/// (most stages) or degrades to an Accept (face heuristic).
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    /// The image bytes could not be decoded at all.
    #[error("Image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    /// The analyzer hit an internal inconsistency (empty buffer, zero-sized
    /// grid, ...). Carries a human-readable description.
    #[error("Analyzer failed: {0}")]
    Internal(String),
}
