use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Incomplete upload: expected {expected} chunks, received {received}, missing {missing:?}")]
    IncompleteUpload {
        expected: i64,
        received: usize,
        missing: Vec<i32>,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Unsupported Media Type: {0}")]
    UnsupportedMediaType(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl AppError {
    /// Record store or blob store failure.
    pub fn is_storage(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Io(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::IncompleteUpload { missing, .. } = &self {
            let body = Json(json!({
                "error": self.to_string(),
                "missing": missing,
            }));
            return (StatusCode::CONFLICT, body).into_response();
        }

        let (status, message) = match self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Io(e) => {
                tracing::error!("Storage I/O error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            e @ AppError::IncompleteUpload { .. } => (StatusCode::CONFLICT, e.to_string()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            AppError::UnsupportedMediaType(msg) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, msg),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
