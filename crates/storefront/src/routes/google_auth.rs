//! Google OAuth route handlers.
//!
//! - Start: stores CSRF state, PKCE verifier and the return path in the
//!   server session, then redirects to Google
//! - Callback: checks state, exchanges the code, signs the user in and
//!   redirects back to the stored return path with auth cookies set

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::{AppError, set_sentry_user};
use crate::middleware::auth::auth_cookies;
use crate::models::session_keys;
use crate::routes::auth::{append_cookies, user_agent};
use crate::services::auth::AuthService;
use crate::services::google::{generate_pkce, generate_state};
use crate::state::AppState;

const CALLBACK_PATH: &str = "/api/auth/google/callback";
const SIGN_IN_PATH: &str = "/sign-in";

/// Query parameters for starting the flow.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartQuery {
    /// Relative path to return to after sign-in.
    pub callback_url: Option<String>,
}

/// Query parameters from the Google OAuth callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Redirect to Google's consent screen.
///
/// # Route
///
/// `GET /api/auth/google`
///
/// # Errors
///
/// 404 when Google sign-in isn't configured.
pub async fn start(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<StartQuery>,
) -> Result<Response, AppError> {
    let google = state
        .google()
        .ok_or_else(|| AppError::NotFound("Google sign-in is not enabled".to_string()))?;

    let oauth_state = generate_state();
    let (verifier, challenge) = generate_pkce();
    let callback_url = safe_callback_url(query.callback_url.as_deref());

    let stored = async {
        session
            .insert(session_keys::GOOGLE_OAUTH_STATE, &oauth_state)
            .await?;
        session
            .insert(session_keys::GOOGLE_PKCE_VERIFIER, &verifier)
            .await?;
        session
            .insert(session_keys::GOOGLE_CALLBACK_URL, &callback_url)
            .await
    };
    if let Err(e) = stored.await {
        tracing::error!("Failed to store OAuth state in session: {}", e);
        return Ok(sign_in_error("session"));
    }

    let redirect_uri = redirect_uri(&state);
    Ok(Redirect::to(&google.authorization_url(&redirect_uri, &oauth_state, &challenge)).into_response())
}

/// Finish the Google sign-in.
///
/// Failures redirect to the sign-in page with an `error` query parameter.
///
/// # Route
///
/// `GET /api/auth/google/callback`
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Some(google) = state.google() else {
        return AppError::NotFound("Google sign-in is not enabled".to_string()).into_response();
    };

    if let Some(error) = query.error {
        let description = query.error_description.unwrap_or_default();
        tracing::warn!("Google OAuth error: {} - {}", error, description);
        return sign_in_error("google_denied");
    }

    let Some(code) = query.code else {
        tracing::warn!("Google OAuth callback missing code");
        return sign_in_error("missing_code");
    };

    let Some(returned_state) = query.state else {
        tracing::warn!("Google OAuth callback missing state");
        return sign_in_error("missing_state");
    };

    let stored_state: Option<String> = session
        .remove(session_keys::GOOGLE_OAUTH_STATE)
        .await
        .ok()
        .flatten();
    let verifier: Option<String> = session
        .remove(session_keys::GOOGLE_PKCE_VERIFIER)
        .await
        .ok()
        .flatten();
    let callback_url: Option<String> = session
        .remove(session_keys::GOOGLE_CALLBACK_URL)
        .await
        .ok()
        .flatten();

    let (Some(stored_state), Some(verifier)) = (stored_state, verifier) else {
        tracing::warn!("Google OAuth callback without a pending sign-in");
        return sign_in_error("session_expired");
    };

    if stored_state != returned_state {
        tracing::warn!("Google OAuth state mismatch");
        return sign_in_error("invalid_state");
    }

    let profile = match google
        .exchange_code(&code, &redirect_uri(&state), &verifier)
        .await
    {
        Ok(access_token) => google.fetch_profile(&access_token).await,
        Err(e) => Err(e),
    };
    let profile = match profile {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!("Google OAuth exchange failed: {}", e);
            return sign_in_error("google_failed");
        }
    };

    let auth = AuthService::new(state.pool(), state.tokens());
    match auth
        .sign_in_with_google(&profile, user_agent(&headers))
        .await
    {
        Ok((user, tokens)) => {
            set_sentry_user(&user.id, Some(user.email.as_str()));
            let target = safe_callback_url(callback_url.as_deref());
            let mut response = Redirect::to(&target).into_response();
            append_cookies(
                &mut response,
                &auth_cookies(&tokens, state.config().secure_cookies()),
            );
            response
        }
        Err(crate::services::auth::AuthError::EmailNotVerified) => {
            sign_in_error("email_not_verified")
        }
        Err(e) => {
            tracing::error!("Google sign-in failed: {}", e);
            sign_in_error("google_failed")
        }
    }
}

fn redirect_uri(state: &AppState) -> String {
    format!("{}{CALLBACK_PATH}", state.config().base_url)
}

fn sign_in_error(code: &str) -> Response {
    Redirect::to(&format!("{SIGN_IN_PATH}?error={code}")).into_response()
}

/// Accept only same-origin relative paths as a return target.
fn safe_callback_url(raw: Option<&str>) -> String {
    match raw {
        Some(url)
            if url.starts_with('/')
                && !url.starts_with("//")
                && !url.contains('\\')
                && !url.chars().any(char::is_control) =>
        {
            url.to_string()
        }
        _ => "/".to_string(),
    }
}
