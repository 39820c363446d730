//! Image record persistence.
//!
//! [`RecordStore`] is the single seam the rest of the system talks to:
//! the Postgres backend is the production path, the in-memory backend
//! keeps development and the test suite hermetic.

pub mod error;
pub mod models;
pub mod store;

pub use error::StoreError;
pub use store::memory::MemoryRecordStore;
pub use store::postgres::PgRecordStore;
pub use store::RecordStore;

use sqlx::postgres::PgPoolOptions;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Apply embedded migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Cheap connectivity probe.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
