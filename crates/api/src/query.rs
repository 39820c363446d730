//! Shared query parameter types for API handlers.

use serde::Deserialize;

/// Hard cap applied to the `limit` parameter.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Default page size when `limit` is omitted.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Listing parameters (`?page=&limit=&status=`).
///
/// `page` is 1-based. Values are validated and clamped in the handler.
#[derive(Debug, Deserialize)]
pub struct ListImagesParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
}
