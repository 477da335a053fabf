//! Signed access and refresh tokens.
//!
//! Both are HS256 JWTs signed with separate keys. Access tokens are
//! short-lived and verified statelessly by the auth gate. Refresh tokens carry
//! a random `jti` and are only honoured while a session row with the SHA-256
//! of the token exists.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use rand::distr::Alphanumeric;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use threadline_core::{Email, UserId};

use crate::config::JwtConfig;
use crate::models::CurrentUser;

/// Lifetime of an access token.
pub const ACCESS_TOKEN_TTL: Duration = Duration::minutes(15);

/// Lifetime of a refresh token and its session row.
pub const REFRESH_TOKEN_TTL: Duration = Duration::days(30);

const ACCESS_TYPE: &str = "access";
const REFRESH_TYPE: &str = "refresh";

/// Token verification failure.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token rejected: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("wrong token type")]
    WrongType,

    #[error("malformed claims")]
    MalformedClaims,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    sub: String,
    email: String,
    typ: String,
    iat: i64,
    exp: i64,
}

/// Claims of a verified refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub jti: String,
    typ: String,
    pub iat: i64,
    pub exp: i64,
}

impl RefreshClaims {
    /// The user the token was issued to.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::MalformedClaims` if `sub` isn't a user id.
    pub fn user_id(&self) -> Result<UserId, TokenError> {
        self.sub.parse().map_err(|_| TokenError::MalformedClaims)
    }
}

/// A freshly signed refresh token.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub token: String,
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Tokens handed to the client after sign-in or refresh.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Signing and verification keys.
#[derive(Clone)]
pub struct TokenKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys").finish_non_exhaustive()
    }
}

impl TokenKeys {
    #[must_use]
    pub fn new(config: &JwtConfig) -> Self {
        let access = config.access_secret.expose_secret().as_bytes();
        let refresh = config.refresh_secret.expose_secret().as_bytes();
        Self {
            access_encoding: EncodingKey::from_secret(access),
            access_decoding: DecodingKey::from_secret(access),
            refresh_encoding: EncodingKey::from_secret(refresh),
            refresh_decoding: DecodingKey::from_secret(refresh),
        }
    }

    /// Sign an access token for the user.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Jwt` if signing fails.
    pub fn issue_access(&self, user_id: UserId, email: &Email) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            typ: ACCESS_TYPE.to_string(),
            iat: now.timestamp(),
            exp: (now + ACCESS_TOKEN_TTL).timestamp(),
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.access_encoding,
        )?)
    }

    /// Sign a refresh token with a random `jti`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Jwt` if signing fails.
    pub fn issue_refresh(&self, user_id: UserId) -> Result<RefreshToken, TokenError> {
        let now = Utc::now();
        let expires_at = now + REFRESH_TOKEN_TTL;
        let jti: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();

        let claims = RefreshClaims {
            sub: user_id.to_string(),
            jti,
            typ: REFRESH_TYPE.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.refresh_encoding,
        )?;

        Ok(RefreshToken {
            hash: hash_token(&token),
            token,
            expires_at,
        })
    }

    /// Sign both tokens for a user.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Jwt` if signing fails.
    pub fn issue_pair(
        &self,
        user_id: UserId,
        email: &Email,
    ) -> Result<(String, RefreshToken), TokenError> {
        Ok((self.issue_access(user_id, email)?, self.issue_refresh(user_id)?))
    }

    /// Verify an access token and return the identity it carries.
    ///
    /// # Errors
    ///
    /// Returns `TokenError` if the signature, expiry, type or claims are bad.
    pub fn verify_access(&self, token: &str) -> Result<CurrentUser, TokenError> {
        let data = jsonwebtoken::decode::<AccessClaims>(
            token,
            &self.access_decoding,
            &validation(),
        )?;
        let claims = data.claims;
        if claims.typ != ACCESS_TYPE {
            return Err(TokenError::WrongType);
        }
        Ok(CurrentUser {
            id: claims.sub.parse().map_err(|_| TokenError::MalformedClaims)?,
            email: Email::parse(&claims.email).map_err(|_| TokenError::MalformedClaims)?,
        })
    }

    /// Verify a refresh token's signature and expiry.
    ///
    /// This does not check the session table.
    ///
    /// # Errors
    ///
    /// Returns `TokenError` if the signature, expiry or type are bad.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let data = jsonwebtoken::decode::<RefreshClaims>(
            token,
            &self.refresh_decoding,
            &validation(),
        )?;
        if data.claims.typ != REFRESH_TYPE {
            return Err(TokenError::WrongType);
        }
        Ok(data.claims)
    }
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 5;
    validation.set_required_spec_claims(&["exp", "sub"]);
    validation
}

/// SHA-256 hex digest of a token, as stored in the session table.
#[must_use]
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
