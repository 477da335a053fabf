//! Authentication error types.

use thiserror::Error;

use super::tokens::TokenError;
use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] threadline_core::EmailError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Missing, expired or tampered token.
    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    /// A refresh token with a valid signature but no session was presented.
    #[error("refresh token reuse detected")]
    TokenReuse,

    /// Session state missing or invalid (OAuth state mismatch).
    #[error("invalid session state")]
    InvalidSessionState,

    /// The identity provider didn't vouch for the email address.
    #[error("email address not verified by provider")]
    EmailNotVerified,

    /// Identity provider request failed.
    #[error("oauth error: {0}")]
    OAuth(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
