//! Google OAuth 2.0 client (authorization code flow with PKCE).
//!
//! # Flow
//!
//! 1. Generate `state` and a PKCE pair, store both in the server session
//! 2. Redirect to [`GoogleClient::authorization_url`]
//! 3. Google redirects back with `code` and `state`
//! 4. [`GoogleClient::exchange_code`] with the stored verifier
//! 5. [`GoogleClient::fetch_profile`] with the access token

use std::sync::Arc;

use base64::Engine;
use rand::Rng;
use rand::distr::Alphanumeric;
use secrecy::ExposeSecret;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::GoogleConfig;
use crate::services::auth::AuthError;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const SCOPES: &str = "openid email profile";

/// Errors talking to Google.
#[derive(Debug, Error)]
pub enum GoogleError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    OAuth(String),
}

impl From<GoogleError> for AuthError {
    fn from(err: GoogleError) -> Self {
        Self::OAuth(err.to_string())
    }
}

/// The subset of the `OpenID` userinfo response we use.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    /// Stable Google account id.
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Client for Google's OAuth endpoints.
#[derive(Clone)]
pub struct GoogleClient {
    inner: Arc<GoogleClientInner>,
}

struct GoogleClientInner {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    auth_url: String,
    token_url: String,
    userinfo_url: String,
}

impl GoogleClient {
    #[must_use]
    pub fn new(config: &GoogleConfig) -> Self {
        Self::with_endpoints(config, AUTH_URL, TOKEN_URL, USERINFO_URL)
    }

    /// Create a client against non-default endpoints.
    #[must_use]
    pub fn with_endpoints(
        config: &GoogleConfig,
        auth_url: &str,
        token_url: &str,
        userinfo_url: &str,
    ) -> Self {
        Self {
            inner: Arc::new(GoogleClientInner {
                client: reqwest::Client::new(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.expose_secret().to_string(),
                auth_url: auth_url.to_string(),
                token_url: token_url.to_string(),
                userinfo_url: userinfo_url.to_string(),
            }),
        }
    }

    /// Build the URL to send the browser to.
    #[must_use]
    pub fn authorization_url(&self, redirect_uri: &str, state: &str, code_challenge: &str) -> String {
        format!(
            "{}?\
            client_id={}&\
            response_type=code&\
            redirect_uri={}&\
            scope={}&\
            state={}&\
            code_challenge={}&\
            code_challenge_method=S256&\
            prompt=select_account",
            self.inner.auth_url,
            urlencoding::encode(&self.inner.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(SCOPES),
            urlencoding::encode(state),
            urlencoding::encode(code_challenge),
        )
    }

    /// Exchange an authorization code for an access token.
    ///
    /// # Errors
    ///
    /// Returns an error if Google rejects the exchange.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> Result<String, GoogleError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", &self.inner.client_id),
            ("client_secret", &self.inner.client_secret),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("code_verifier", code_verifier),
        ];

        let response = self
            .inner
            .client
            .post(&self.inner.token_url)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(GoogleError::OAuth(format!(
                "Token exchange failed ({status}): {}",
                text.chars().take(200).collect::<String>()
            )));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    /// Fetch the signed-in user's profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn fetch_profile(&self, access_token: &str) -> Result<GoogleProfile, GoogleError> {
        let response = self
            .inner
            .client
            .get(&self.inner.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(GoogleError::OAuth(format!("Userinfo request failed ({status})")));
        }

        Ok(response.json().await?)
    }
}

/// Random URL-safe string for the OAuth `state` parameter.
#[must_use]
pub fn generate_state() -> String {
    random_alphanumeric(32)
}

/// Generate a PKCE `(verifier, S256 challenge)` pair.
#[must_use]
pub fn generate_pkce() -> (String, String) {
    let verifier = random_alphanumeric(43);
    let challenge = pkce_challenge(&verifier);
    (verifier, challenge)
}

fn pkce_challenge(verifier: &str) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn random_alphanumeric(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn client() -> GoogleClient {
        GoogleClient::new(&GoogleConfig {
            client_id: "client 1".to_string(),
            client_secret: SecretString::from("unused"),
        })
    }

    #[test]
    fn test_pkce_challenge_matches_rfc7636_example() {
        // Appendix B of RFC 7636
        assert_eq!(
            pkce_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_generate_pkce_shape() {
        let (verifier, challenge) = generate_pkce();
        assert_eq!(verifier.len(), 43);
        assert_eq!(challenge, pkce_challenge(&verifier));
        assert!(!challenge.contains('='));
    }

    #[test]
    fn test_authorization_url_encodes_parameters() {
        let url = client().authorization_url(
            "https://shop.test/api/auth/google/callback",
            "st&ate",
            "challenge",
        );
        assert!(url.starts_with(AUTH_URL));
        assert!(url.contains("client_id=client%201"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fshop.test%2Fapi%2Fauth%2Fgoogle%2Fcallback"));
        assert!(url.contains("state=st%26ate"));
        assert!(url.contains("code_challenge=challenge"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("scope=openid%20email%20profile"));
    }

    #[test]
    fn test_profile_defaults_unverified() {
        let profile: GoogleProfile = serde_json::from_value(serde_json::json!({
            "sub": "1234",
            "email": "a@b.co"
        }))
        .unwrap();
        assert!(!profile.email_verified);
        assert!(profile.name.is_none());
    }
}
