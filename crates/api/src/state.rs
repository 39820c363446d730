use std::sync::Arc;

use photogate_db::RecordStore;
use photogate_storage::BlobStore;

use crate::config::ServerConfig;
use crate::scheduler::PipelineScheduler;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// Cheaply cloneable; everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Image record store (Postgres in production, in-memory otherwise).
    pub records: Arc<dyn RecordStore>,
    /// Blob store for originals and derivatives.
    pub blobs: Arc<dyn BlobStore>,
    /// Background pipeline dispatch.
    pub scheduler: Arc<PipelineScheduler>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
