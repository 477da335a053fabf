//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Every error renders as JSON:
//!
//! ```json
//! { "error": "Validation failed", "fieldErrors": { "email": ["must be a valid email address"] } }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use threadline_core::checkout::PricingError;
use threadline_core::validation::FieldErrors;

use crate::cms::CmsError;
use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::cart::CartError;
use crate::services::checkout::CheckoutError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// CMS request failed.
    #[error("CMS error: {0}")]
    Cms(#[from] CmsError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Order could not be placed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Request body failed validation.
    #[error("Validation failed")]
    Validation(FieldErrors),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::Cms(e) => Self::Cms(e),
            CartError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field_errors: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl ErrorBody {
    fn message(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            field_errors: None,
            details: None,
        }
    }

    fn fields(error: impl Into<String>, field_errors: FieldErrors) -> Self {
        Self {
            error: error.into(),
            field_errors: Some(field_errors),
            details: None,
        }
    }

    fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound)
            | Self::Cms(CmsError::NotFound(_))
            | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Cms(CmsError::RateLimited(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Cms(_) => StatusCode::BAD_GATEWAY,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials
                | AuthError::InvalidToken(_)
                | AuthError::TokenReuse => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_) | AuthError::InvalidEmail(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                AuthError::InvalidSessionState => StatusCode::BAD_REQUEST,
                AuthError::EmailNotVerified => StatusCode::FORBIDDEN,
                AuthError::OAuth(_) => StatusCode::BAD_GATEWAY,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart => StatusCode::BAD_REQUEST,
                CheckoutError::Pricing(_)
                | CheckoutError::TotalChanged { .. }
                | CheckoutError::CartChanged => StatusCode::CONFLICT,
                CheckoutError::AddressNotFound => StatusCode::UNPROCESSABLE_ENTITY,
                CheckoutError::Cms(_) => StatusCode::BAD_GATEWAY,
                CheckoutError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    // Don't expose internal error details to clients
    fn body(self) -> ErrorBody {
        match self {
            Self::Database(RepositoryError::NotFound) => ErrorBody::message("Not found"),
            Self::Database(RepositoryError::Conflict(what)) => {
                ErrorBody::message(format!("Conflict: {what}"))
            }
            Self::Database(_) | Self::Internal(_) => ErrorBody::message("Internal server error"),
            Self::Cms(CmsError::NotFound(what)) => ErrorBody::message(what),
            Self::Cms(_) => ErrorBody::message("Catalog service unavailable"),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => ErrorBody::message("Invalid credentials"),
                AuthError::InvalidToken(_) | AuthError::TokenReuse => {
                    ErrorBody::message("Session expired, please sign in again")
                }
                AuthError::UserAlreadyExists => {
                    ErrorBody::message("An account with this email already exists")
                }
                AuthError::WeakPassword(msg) => ErrorBody::fields(
                    "Validation failed",
                    FieldErrors::new().with("password", msg),
                ),
                AuthError::InvalidEmail(_) => ErrorBody::fields(
                    "Validation failed",
                    FieldErrors::new().with("email", "must be a valid email address"),
                ),
                AuthError::InvalidSessionState => {
                    ErrorBody::message("Sign-in session expired, please try again")
                }
                AuthError::EmailNotVerified => {
                    ErrorBody::message("Your Google email address is not verified")
                }
                AuthError::OAuth(_) => ErrorBody::message("Sign-in provider error"),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    ErrorBody::message("Internal server error")
                }
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart => ErrorBody::message("Your cart is empty"),
                CheckoutError::Pricing(reason) => {
                    let details = pricing_details(&reason);
                    ErrorBody::message(reason.to_string()).details(details)
                }
                CheckoutError::TotalChanged { mismatch, quote } => {
                    ErrorBody::message("Prices have changed, please review your order").details(
                        serde_json::json!({
                            "reason": "total_mismatch",
                            "submitted": mismatch.submitted,
                            "quote": quote,
                        }),
                    )
                }
                CheckoutError::CartChanged => {
                    ErrorBody::message("Your cart changed, please review your order")
                        .details(serde_json::json!({ "reason": "cart_changed" }))
                }
                CheckoutError::AddressNotFound => ErrorBody::fields(
                    "Validation failed",
                    FieldErrors::new().with("fulfillment.addressId", "address not found"),
                ),
                CheckoutError::Cms(_) => ErrorBody::message("Catalog service unavailable"),
                CheckoutError::Repository(_) => ErrorBody::message("Internal server error"),
            },
            Self::Validation(errors) => ErrorBody::fields("Validation failed", errors),
            other => ErrorBody::message(other.to_string()),
        }
    }
}

fn pricing_details(reason: &PricingError) -> serde_json::Value {
    match reason {
        PricingError::EmptyCart => serde_json::json!({ "reason": "empty_cart" }),
        PricingError::Missing {
            product_id,
            variant_id,
        } => serde_json::json!({
            "reason": "missing",
            "productId": product_id,
            "variantId": variant_id,
        }),
        PricingError::Unavailable { product_id, .. } => serde_json::json!({
            "reason": "unavailable",
            "productId": product_id,
        }),
        PricingError::InsufficientStock {
            product_id,
            requested,
            available,
            ..
        } => serde_json::json!({
            "reason": "insufficient_stock",
            "productId": product_id,
            "requested": requested,
            "available": available,
        }),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        (status, Json(self.body())).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Cart synced", Some(&[("lines", "3")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use rust_decimal::Decimal;
    use threadline_core::checkout::{Quote, TotalMismatch};

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order 12".to_string());
        assert_eq!(err.to_string(), "Not found: order 12");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::UserAlreadyExists)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::TokenReuse)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::EmptyCart)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::CartChanged)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Cms(CmsError::NotFound("x".to_string()))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_validation_error_body() {
        let errors = FieldErrors::new().with("name", "is required");
        let (status, body) = body_json(AppError::Validation(errors)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "Validation failed");
        assert_eq!(body["fieldErrors"]["name"][0], "is required");
    }

    #[tokio::test]
    async fn test_weak_password_is_a_field_error() {
        let (status, body) =
            body_json(AppError::Auth(AuthError::WeakPassword("too short".to_string()))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["fieldErrors"]["password"][0], "too short");
    }

    #[tokio::test]
    async fn test_total_mismatch_includes_quote() {
        let quote = Quote {
            subtotal: Decimal::new(4000, 2),
            shipping: Decimal::new(1000, 2),
            total: Decimal::new(5000, 2),
        };
        let err = CheckoutError::TotalChanged {
            mismatch: TotalMismatch {
                expected: quote.total,
                submitted: Decimal::new(4500, 2),
            },
            quote,
        };
        let (status, body) = body_json(AppError::Checkout(err)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["details"]["reason"], "total_mismatch");
        assert_eq!(body["details"]["quote"]["total"], "50.00");
        assert_eq!(body["details"]["submitted"], "45.00");
    }

    #[tokio::test]
    async fn test_order_write_races_map_to_client_errors() {
        let repeat = CheckoutError::from(crate::db::CreateOrderError::EmptyCart);
        let (status, _) = body_json(AppError::Checkout(repeat)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let changed = CheckoutError::from(crate::db::CreateOrderError::CartChanged);
        let (status, body) = body_json(AppError::Checkout(changed)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["details"]["reason"], "cart_changed");
    }

    #[tokio::test]
    async fn test_primary_address_race_is_conflict() {
        let err = RepositoryError::Conflict("primary address changed".to_string());
        let (status, body) = body_json(AppError::Database(err)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Conflict: primary address changed");
    }

    #[tokio::test]
    async fn test_server_errors_hide_detail() {
        let (status, body) =
            body_json(AppError::Internal("connection refused at 10.0.0.3".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert!(body.get("fieldErrors").is_none());
    }
}
