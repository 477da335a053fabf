//! RPC error codes and the error envelope.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use threadline_core::validation::FieldErrors;

use crate::cms::CmsError;
use crate::services::{CatalogError, OrderError};

/// Errors returned by procedures, rendered as the error envelope.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The `input` parameter or body is not JSON.
    #[error("Invalid JSON input: {0}")]
    Parse(String),

    /// The input has the wrong shape for the procedure.
    #[error("Invalid input: {0}")]
    BadRequest(String),

    /// The input failed validation.
    #[error("Validation failed")]
    Validation(FieldErrors),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// A query called with `POST` or a mutation with `GET`.
    #[error("{0}")]
    MethodNotSupported(String),

    /// The CMS failed.
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RpcError {
    /// Wire code of the error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Parse(_) => "PARSE_ERROR",
            Self::BadRequest(_) | Self::Validation(_) => "BAD_REQUEST",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::MethodNotSupported(_) => "METHOD_NOT_SUPPORTED",
            Self::Upstream(_) => "BAD_GATEWAY",
            Self::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Parse(_) | Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::MethodNotSupported(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The error envelope. Server-side details are not exposed.
    #[must_use]
    pub fn body(&self) -> RpcErrorBody {
        let message = match self {
            Self::Upstream(_) => "External service error".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        };
        let field_errors = match self {
            Self::Validation(errors) => Some(errors.clone()),
            _ => None,
        };
        RpcErrorBody {
            error: RpcErrorShape {
                code: self.code(),
                message,
                field_errors,
            },
        }
    }
}

/// `{"error": {...}}`
#[derive(Debug, Serialize)]
pub struct RpcErrorBody {
    pub error: RpcErrorShape,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcErrorShape {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<FieldErrors>,
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        if matches!(self, Self::Upstream(_) | Self::Internal(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "RPC procedure failed"
            );
        }

        (self.status(), Json(self.body())).into_response()
    }
}

impl From<ValidationErrors> for RpcError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(FieldErrors::from(errors))
    }
}

impl From<CmsError> for RpcError {
    fn from(err: CmsError) -> Self {
        Self::Upstream(err.to_string())
    }
}

impl From<CatalogError> for RpcError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Validation(errors) => Self::Validation(errors),
            CatalogError::NotFound(what) => Self::NotFound(format!("{what} not found")),
            CatalogError::Conflict(message) => Self::Conflict(message),
            CatalogError::Cms(e) => e.into(),
        }
    }
}

impl From<OrderError> for RpcError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Validation(errors) => Self::Validation(errors),
            OrderError::NotFound(_) => Self::NotFound(err.to_string()),
            OrderError::InvalidTransition { .. } | OrderError::Concurrent(_) => {
                Self::Conflict(err.to_string())
            }
            OrderError::Repository(e) => Self::Internal(e.to_string()),
        }
    }
}
