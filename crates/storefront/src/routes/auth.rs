//! Credential authentication route handlers.
//!
//! Sign-up and sign-in return the user and set two cookies: a short-lived
//! access token on `/` and a refresh token scoped to `/api/auth`. Refresh
//! rotates the session; presenting an already-rotated refresh token revokes
//! every session of that user.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use validator::Validate;

use crate::db::UserRepository;
use crate::error::{AppError, Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::extract::ValidatedJson;
use crate::middleware::RequireUser;
use crate::middleware::auth::{REFRESH_COOKIE, auth_cookies, clear_auth_cookies, cookie_value};
use crate::models::User;
use crate::services::auth::{AuthService, IssuedTokens};
use crate::state::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email, length(max = 254))]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 128))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 254))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
}

// =============================================================================
// Handlers
// =============================================================================

/// Create an account with email and password.
///
/// # Route
///
/// `POST /api/auth/register`
///
/// # Errors
///
/// 409 if the email is taken, 422 for invalid fields.
#[instrument(skip(state, headers, request), fields(email = %request.email))]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<Response> {
    let auth = AuthService::new(state.pool(), state.tokens());
    let (user, tokens) = auth
        .register(
            &request.email,
            &request.password,
            &request.name,
            user_agent(&headers),
        )
        .await?;

    set_sentry_user(&user.id, Some(user.email.as_str()));
    add_breadcrumb("auth", "Registered", None);

    Ok(signed_in(
        StatusCode::CREATED,
        user,
        &tokens,
        state.config().secure_cookies(),
    ))
}

/// Sign in with email and password.
///
/// # Route
///
/// `POST /api/auth/login`
///
/// # Errors
///
/// 401 for a wrong email or password.
#[instrument(skip(state, headers, request))]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Response> {
    let auth = AuthService::new(state.pool(), state.tokens());
    let (user, tokens) = auth
        .login(&request.email, &request.password, user_agent(&headers))
        .await?;

    set_sentry_user(&user.id, Some(user.email.as_str()));
    add_breadcrumb("auth", "Signed in", None);

    Ok(signed_in(
        StatusCode::OK,
        user,
        &tokens,
        state.config().secure_cookies(),
    ))
}

/// Exchange the refresh cookie for a new token pair.
///
/// A failed refresh also clears both cookies so the client stops retrying.
///
/// # Route
///
/// `POST /api/auth/refresh`
#[instrument(skip_all)]
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let secure = state.config().secure_cookies();

    let Some(refresh_token) = cookie_value(&headers, REFRESH_COOKIE) else {
        return AppError::Unauthorized("missing refresh token".to_string()).into_response();
    };

    let auth = AuthService::new(state.pool(), state.tokens());
    match auth.refresh(&refresh_token, user_agent(&headers)).await {
        Ok((user, tokens)) => signed_in(StatusCode::OK, user, &tokens, secure),
        Err(e) => {
            let mut response = AppError::from(e).into_response();
            if response.status() == StatusCode::UNAUTHORIZED {
                append_cookies(&mut response, &clear_auth_cookies(secure));
            }
            response
        }
    }
}

/// End the current session and clear the cookies.
///
/// # Route
///
/// `POST /api/auth/logout`
///
/// # Errors
///
/// 500 if the session row can't be deleted.
#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    let refresh_token = cookie_value(&headers, REFRESH_COOKIE);

    AuthService::new(state.pool(), state.tokens())
        .logout(refresh_token.as_deref())
        .await?;
    clear_sentry_user();

    let mut response = StatusCode::NO_CONTENT.into_response();
    append_cookies(
        &mut response,
        &clear_auth_cookies(state.config().secure_cookies()),
    );
    Ok(response)
}

/// The signed-in user.
///
/// # Route
///
/// `GET /api/auth/me`
///
/// # Errors
///
/// 401 if the account no longer exists.
pub async fn me(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
) -> Result<Json<AuthResponse>> {
    let user = UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("account no longer exists".to_string()))?;

    Ok(Json(AuthResponse { user }))
}

// =============================================================================
// Helpers
// =============================================================================

pub(crate) fn user_agent(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|ua| ua.get(..512).unwrap_or(ua))
}

fn signed_in(status: StatusCode, user: User, tokens: &IssuedTokens, secure: bool) -> Response {
    let mut response = (status, Json(AuthResponse { user })).into_response();
    append_cookies(&mut response, &auth_cookies(tokens, secure));
    response
}

pub(crate) fn append_cookies(response: &mut Response, cookies: &[String]) {
    for cookie in cookies {
        if let Ok(value) = HeaderValue::from_str(cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let request: RegisterRequest = serde_json::from_value(serde_json::json!({
            "email": "not-an-email",
            "password": "short",
            "name": ""
        }))
        .unwrap();
        let errors =
            threadline_core::validation::FieldErrors::from(request.validate().unwrap_err());
        assert!(errors.get("email").is_some());
        assert!(errors.get("password").is_some());
        assert!(errors.get("name").is_some());
    }

    #[test]
    fn test_user_agent_truncated() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_str(&"a".repeat(600)).unwrap(),
        );
        assert_eq!(user_agent(&headers).map(str::len), Some(512));
    }

    #[test]
    fn test_append_cookies_keeps_both() {
        let mut response = StatusCode::OK.into_response();
        append_cookies(
            &mut response,
            &["a=1; Path=/".to_string(), "b=2; Path=/api/auth".to_string()],
        );
        assert_eq!(response.headers().get_all(header::SET_COOKIE).iter().count(), 2);
    }
}
