//! Route definitions for the `/images` resource.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::images;
use crate::state::AppState;

/// Routes mounted at `/api`.
///
/// ```text
/// POST   /images               -> upload_batch (multipart)
/// GET    /images               -> list (?page, ?limit, ?status)
/// GET    /images/{id}          -> get_by_id
/// DELETE /images/{id}          -> delete
/// POST   /images/{id}/process  -> reprocess
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/images",
            post(images::upload_batch).get(images::list),
        )
        .route(
            "/images/{id}",
            get(images::get_by_id).delete(images::delete),
        )
        .route("/images/{id}/process", post(images::reprocess))
        // The multipart upload can carry ten full-size files.
        .layer(DefaultBodyLimit::max(images::UPLOAD_BODY_LIMIT))
}
