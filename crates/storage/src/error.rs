/// Blob store error type.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No blob under the given key.
    #[error("Blob not found: {0}")]
    NotFound(String),

    /// The key contains path traversal or characters outside the allowed set.
    #[error("Invalid blob key: {0}")]
    InvalidKey(String),

    /// The backend is unreachable or failed the operation.
    #[error("Blob store unavailable: {0}")]
    Unavailable(String),
}
