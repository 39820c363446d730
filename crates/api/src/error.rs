use std::sync::OnceLock;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use photogate_db::StoreError;
use photogate_storage::StorageError;
use serde_json::json;

/// Whether error responses may carry the raw failure text. Set once at
/// startup from the `DEVELOPMENT` flag.
static DEVELOPMENT: OnceLock<bool> = OnceLock::new();

pub fn set_development(enabled: bool) {
    let _ = DEVELOPMENT.set(enabled);
}

fn development() -> bool {
    DEVELOPMENT.get().copied().unwrap_or(false)
}

/// Application-level error type for HTTP handlers.
///
/// Wraps domain and infrastructure errors and implements [`IntoResponse`]
/// to produce the service's `{error, message, stack?}` JSON shape.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A record-store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A blob-store error.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The request itself is malformed or violates upload constraints.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The addressed resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A dependency is temporarily unusable; the caller may retry.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Anything else; logged and surfaced as a generic 500.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Store(err) => match err {
                StoreError::Unavailable(msg) => {
                    (StatusCode::SERVICE_UNAVAILABLE, msg.clone())
                }
                other => {
                    tracing::error!(error = %other, "Record store error");
                    (StatusCode::INTERNAL_SERVER_ERROR, "Server Error".to_string())
                }
            },

            AppError::Storage(err) => match err {
                StorageError::NotFound(key) => {
                    (StatusCode::NOT_FOUND, format!("Blob not found: {key}"))
                }
                StorageError::InvalidKey(key) => {
                    (StatusCode::BAD_REQUEST, format!("Invalid blob key: {key}"))
                }
                StorageError::Unavailable(msg) => {
                    tracing::error!(error = %msg, "Blob store error");
                    (StatusCode::SERVICE_UNAVAILABLE, "Storage unavailable".to_string())
                }
            },

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Server Error".to_string())
            }
        };

        let mut body = json!({
            "error": true,
            "message": message,
        });
        if development() {
            body["stack"] = json!(format!("{self:?}"));
        }

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn not_found_maps_to_404_with_error_body() {
        let (status, body) = body_of(AppError::NotFound("Image abc not found".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], true);
        assert_eq!(body["message"], "Image abc not found");
    }

    #[tokio::test]
    async fn bad_request_keeps_its_message() {
        let (status, body) = body_of(AppError::BadRequest("No files uploaded".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "No files uploaded");
    }

    #[tokio::test]
    async fn internal_errors_are_sanitized() {
        let (status, body) =
            body_of(AppError::InternalError("secret connection string".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Server Error");
    }

    #[tokio::test]
    async fn storage_not_found_maps_to_404() {
        let (status, _) =
            body_of(AppError::Storage(StorageError::NotFound("original/x.jpg".into()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
