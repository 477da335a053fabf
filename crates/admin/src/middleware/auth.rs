//! Bearer-token authentication for the back-office API.
//!
//! Every request except the health checks must carry
//! `Authorization: Bearer <ADMIN_API_TOKEN>`. Tokens are compared by HMAC
//! under a per-process random key, so the comparison runs in constant time
//! and the configured token is never compared byte by byte.

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use sha2::Sha256;

use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Paths reachable without a token.
const PUBLIC_PATHS: &[&str] = &["/health", "/health/ready"];

/// Verifies presented bearer tokens against the configured one.
#[derive(Clone)]
pub struct ApiTokenVerifier {
    key: [u8; 32],
    expected: Option<Vec<u8>>,
}

impl std::fmt::Debug for ApiTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiTokenVerifier").finish_non_exhaustive()
    }
}

impl ApiTokenVerifier {
    #[must_use]
    pub fn new(token: &SecretString) -> Self {
        let key: [u8; 32] = rand::random();
        let expected = mac(&key, token.expose_secret().as_bytes())
            .map(|mac| mac.finalize().into_bytes().to_vec());
        Self { key, expected }
    }

    /// Whether `presented` equals the configured token.
    #[must_use]
    pub fn verify(&self, presented: &str) -> bool {
        let (Some(expected), Some(mac)) = (&self.expected, mac(&self.key, presented.as_bytes()))
        else {
            return false;
        };
        mac.verify_slice(expected).is_ok()
    }
}

fn mac(key: &[u8], data: &[u8]) -> Option<HmacSha256> {
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return None;
    };
    mac.update(data);
    Some(mac)
}

fn bearer_token(request: &Request) -> Option<&str> {
    let value = request.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|token| !token.is_empty())
}

/// Middleware that rejects requests without a valid API token.
pub async fn require_api_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if PUBLIC_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    match bearer_token(&request) {
        Some(token) if state.api_token().verify(token) => next.run(request).await,
        presented => {
            tracing::warn!(
                path = %request.uri().path(),
                token_present = presented.is_some(),
                "Rejected admin request"
            );
            unauthorized()
        }
    }
}

fn unauthorized() -> Response {
    let mut response = (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "Unauthorized" })),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}
