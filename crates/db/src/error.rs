/// Record-store error type.
///
/// Missing records are represented as `Option::None` in return values
/// (matching the repository layer conventions); this enum carries only
/// genuine store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing database rejected or dropped the operation.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed while preparing the store.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The store is shut down or otherwise temporarily unusable.
    #[error("Record store unavailable: {0}")]
    Unavailable(String),
}
