//! Authentication gate, extractors and auth cookies.
//!
//! The gate runs on every request. It strips identity headers a client may
//! have forged, verifies the `access_token` cookie, and on success injects
//! `x-user-id` and `x-user-email` for downstream handlers. Requests to
//! protected paths without a valid token never reach a handler.

use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Utc};
use tower_sessions::cookie::{Cookie, SameSite, time};
use tracing::Span;

use threadline_core::{Email, UserId};

use crate::error::set_sentry_user;
use crate::models::CurrentUser;
use crate::services::auth::IssuedTokens;
use crate::services::auth::tokens::ACCESS_TOKEN_TTL;
use crate::state::AppState;

/// Header carrying the authenticated user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the authenticated user's email.
pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// Access token cookie, sent on every path.
pub const ACCESS_COOKIE: &str = "access_token";

/// Refresh token cookie, only sent to the auth endpoints.
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Path scope of the refresh cookie.
pub const REFRESH_COOKIE_PATH: &str = "/api/auth";

/// Path prefixes that require a signed-in user.
///
/// `/account` and `/checkout` are front-end pages served behind the same
/// host; browsers hitting them signed out are redirected to sign in.
const PROTECTED_PREFIXES: &[&str] = &[
    "/api/account",
    "/api/cart",
    "/api/orders",
    "/api/auth/me",
    "/account",
    "/checkout",
];

/// Where browsers are sent when a protected page needs a sign-in.
const SIGN_IN_PATH: &str = "/sign-in";

/// Middleware that authenticates requests from the access token cookie.
pub async fn auth_gate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let headers = request.headers_mut();
    headers.remove(USER_ID_HEADER);
    headers.remove(USER_EMAIL_HEADER);

    let user = cookie_value(request.headers(), ACCESS_COOKIE)
        .and_then(|token| state.tokens().verify_access(&token).ok());

    match user {
        Some(user) => {
            Span::current().record("user_id", user.id.as_i32());
            set_sentry_user(&user.id, Some(user.email.as_str()));

            let headers = request.headers_mut();
            if let Ok(value) = HeaderValue::from_str(&user.id.to_string()) {
                headers.insert(USER_ID_HEADER, value);
            }
            if let Ok(value) = HeaderValue::from_str(user.email.as_str()) {
                headers.insert(USER_EMAIL_HEADER, value);
            }
        }
        None => {
            let path = request.uri().path();
            if is_protected(path) {
                let target = request
                    .uri()
                    .path_and_query()
                    .map_or(path, |pq| pq.as_str());
                return reject(path, target);
            }
        }
    }

    next.run(request).await
}

fn is_protected(path: &str) -> bool {
    PROTECTED_PREFIXES.iter().any(|prefix| {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

fn reject(path: &str, target: &str) -> Response {
    if path.starts_with("/api/") {
        unauthorized()
    } else {
        Redirect::to(&format!(
            "{SIGN_IN_PATH}?callbackUrl={}",
            urlencoding::encode(target)
        ))
        .into_response()
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": "Authentication required" })),
    )
        .into_response()
}

/// Extractor for the user injected by [`auth_gate`].
///
/// # Example
///
/// ```rust,ignore
/// async fn profile(RequireUser(user): RequireUser) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireUser(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<UserId>().ok());
        let email = parts
            .headers
            .get(USER_EMAIL_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Email::parse(s).ok());

        match (id, email) {
            (Some(id), Some(email)) => Ok(Self(CurrentUser { id, email })),
            _ => Err(unauthorized()),
        }
    }
}

// =============================================================================
// Cookies
// =============================================================================

/// Read a cookie from the request headers.
#[must_use]
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| Cookie::split_parse(s))
        .filter_map(Result::ok)
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
}

/// `Set-Cookie` values for a freshly issued token pair.
#[must_use]
pub fn auth_cookies(tokens: &IssuedTokens, secure: bool) -> [String; 2] {
    let access = Cookie::build((ACCESS_COOKIE, tokens.access_token.clone()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(ACCESS_TOKEN_TTL.num_seconds()))
        .build();

    let refresh = Cookie::build((REFRESH_COOKIE, tokens.refresh_token.clone()))
        .path(REFRESH_COOKIE_PATH)
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(seconds_until(tokens.refresh_expires_at)))
        .build();

    [access.to_string(), refresh.to_string()]
}

/// `Set-Cookie` values that remove both auth cookies.
#[must_use]
pub fn clear_auth_cookies(secure: bool) -> [String; 2] {
    let expired = |name: &'static str, path: &'static str| {
        Cookie::build((name, ""))
            .path(path)
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::ZERO)
            .build()
            .to_string()
    };
    [
        expired(ACCESS_COOKIE, "/"),
        expired(REFRESH_COOKIE, REFRESH_COOKIE_PATH),
    ]
}

fn seconds_until(at: DateTime<Utc>) -> i64 {
    (at - Utc::now()).num_seconds().max(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn issued() -> IssuedTokens {
        IssuedTokens {
            access_token: "acc".to_string(),
            refresh_token: "ref".to_string(),
            refresh_expires_at: Utc::now() + chrono::Duration::days(30),
        }
    }

    #[test]
    fn test_protected_prefixes() {
        assert!(is_protected("/api/account/profile"));
        assert!(is_protected("/api/cart"));
        assert!(is_protected("/api/orders/12"));
        assert!(is_protected("/api/auth/me"));
        assert!(!is_protected("/api/auth/login"));
        assert!(!is_protected("/api/cartography"));
        assert!(!is_protected("/api/catalog/home"));
        assert!(is_protected("/account"));
        assert!(is_protected("/checkout/review"));
        assert!(!is_protected("/accounting"));
    }

    #[test]
    fn test_reject_api_is_401() {
        let response = reject("/api/cart", "/api/cart");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_reject_page_redirects_with_callback() {
        let response = reject("/account", "/account?tab=orders");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/sign-in?callbackUrl=%2Faccount%3Ftab%3Dorders"
        );
    }

    #[test]
    fn test_cookie_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; access_token=abc.def.ghi"),
        );
        assert_eq!(
            cookie_value(&headers, ACCESS_COOKIE).as_deref(),
            Some("abc.def.ghi")
        );
        assert_eq!(cookie_value(&headers, REFRESH_COOKIE), None);
    }

    #[test]
    fn test_auth_cookie_attributes() {
        let [access, refresh] = auth_cookies(&issued(), true);
        assert!(access.starts_with("access_token=acc"));
        assert!(access.contains("Path=/"));
        assert!(access.contains("HttpOnly"));
        assert!(access.contains("SameSite=Lax"));
        assert!(access.contains("Secure"));
        assert!(access.contains("Max-Age=900"));

        assert!(refresh.starts_with("refresh_token=ref"));
        assert!(refresh.contains("Path=/api/auth"));
        assert!(refresh.contains("HttpOnly"));
    }

    #[test]
    fn test_insecure_cookies_for_http() {
        let [access, _] = auth_cookies(&issued(), false);
        assert!(!access.contains("Secure"));
    }

    #[test]
    fn test_clear_cookies_expire_immediately() {
        let [access, refresh] = clear_auth_cookies(false);
        assert!(access.contains("Max-Age=0"));
        assert!(refresh.contains("Path=/api/auth"));
    }

    #[tokio::test]
    async fn test_require_user_rejects_missing_headers() {
        let (mut parts, ()) = axum::http::Request::new(()).into_parts();
        let result = RequireUser::from_request_parts(&mut parts, &()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_require_user_reads_headers() {
        let request = axum::http::Request::builder()
            .header(USER_ID_HEADER, "42")
            .header(USER_EMAIL_HEADER, "ada@example.com")
            .body(())
            .unwrap();
        let (mut parts, ()) = request.into_parts();
        let RequireUser(user) = RequireUser::from_request_parts(&mut parts, &())
            .await
            .ok()
            .unwrap();
        assert_eq!(user.id, UserId::new(42));
        assert_eq!(user.email.as_str(), "ada@example.com");
    }
}
