//! Unified error handling for admin's REST endpoints.
//!
//! RPC procedures use [`crate::rpc::RpcError`] and form actions answer with
//! an `ActionState`; everything else returns `Result<T, AppError>`, which
//! renders as `{"error": message}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::cms::CmsError;
use crate::services::MediaError;

/// Application-level error type for the admin API.
#[derive(Debug, Error)]
pub enum AppError {
    /// CMS operation failed.
    #[error("CMS error: {0}")]
    Cms(#[from] CmsError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Upload exceeds the configured limit.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Upload is not an accepted media type.
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::UnsupportedType(_) => Self::UnsupportedMediaType(err.to_string()),
            MediaError::TooLarge { .. } => Self::PayloadTooLarge(err.to_string()),
            MediaError::Empty => Self::BadRequest(err.to_string()),
            MediaError::Cms(e) => Self::Cms(e),
        }
    }
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Cms(CmsError::RateLimited(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Cms(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log server errors with Sentry
        if matches!(self, Self::Cms(_) | Self::Internal(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Admin request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Internal(_) => "Internal server error".to_string(),
            Self::Cms(_) => "External service error".to_string(),
            _ => self.to_string(),
        };

        (self.status(), Json(json!({ "error": message }))).into_response()
    }
}
