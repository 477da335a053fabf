//! Authentication service.
//!
//! Provides password sign-up and sign-in, refresh-token rotation with reuse
//! detection, and account linking for Google sign-in.

mod error;
pub mod tokens;

pub use error::AuthError;
pub use tokens::{IssuedTokens, TokenKeys};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use threadline_core::{AuthProvider, Email};

use crate::db::{RepositoryError, SessionRepository, UserRepository};
use crate::models::User;
use crate::services::google::GoogleProfile;
use tokens::hash_token;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length (Argon2 input is bounded to keep hashing cheap).
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    sessions: SessionRepository<'a>,
    keys: &'a TokenKeys,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, keys: &'a TokenKeys) -> Self {
        Self {
            users: UserRepository::new(pool),
            sessions: SessionRepository::new(pool),
            keys,
        }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a new user with email and password and start a session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip(self, password, user_agent))]
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
        user_agent: Option<&str>,
    ) -> Result<(User, IssuedTokens), AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let user = self
            .users
            .create_with_password(&email, name.trim(), &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        info!(user_id = %user.id, "User registered");
        let tokens = self.start_session(&user, user_agent).await?;
        Ok((user, tokens))
    }

    /// Login with email and password and start a session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    #[instrument(skip(self, password, user_agent))]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        user_agent: Option<&str>,
    ) -> Result<(User, IssuedTokens), AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        let tokens = self.start_session(&user, user_agent).await?;
        Ok((user, tokens))
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Exchange a refresh token for a new token pair.
    ///
    /// The presented session is deleted and replaced. A token whose signature
    /// verifies but whose session no longer exists has been used before;
    /// every session of that user is revoked.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for bad tokens, `AuthError::TokenReuse`
    /// when reuse is detected.
    #[instrument(skip_all)]
    pub async fn refresh(
        &self,
        refresh_token: &str,
        user_agent: Option<&str>,
    ) -> Result<(User, IssuedTokens), AuthError> {
        let claims = self.keys.verify_refresh(refresh_token)?;
        let user_id = claims.user_id()?;

        let Some(session) = self.sessions.find_active(&hash_token(refresh_token)).await? else {
            return Err(self.revoke_after_reuse(user_id).await);
        };

        if session.user_id != user_id {
            return Err(self.revoke_after_reuse(user_id).await);
        }

        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let (access_token, refresh) = self.keys.issue_pair(user.id, &user.email)?;
        let rotated = self
            .sessions
            .rotate(
                session.id,
                user.id,
                &refresh.hash,
                user_agent,
                refresh.expires_at,
            )
            .await?;

        if rotated.is_none() {
            // Another request rotated this session between lookup and delete.
            return Err(self.revoke_after_reuse(user_id).await);
        }

        Ok((
            user,
            IssuedTokens {
                access_token,
                refresh_token: refresh.token,
                refresh_expires_at: refresh.expires_at,
            },
        ))
    }

    /// End the session belonging to a refresh token.
    ///
    /// Unknown or malformed tokens are ignored.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the delete fails.
    #[instrument(skip_all)]
    pub async fn logout(&self, refresh_token: Option<&str>) -> Result<(), AuthError> {
        if let Some(token) = refresh_token {
            self.sessions.delete_by_hash(&hash_token(token)).await?;
        }
        Ok(())
    }

    async fn start_session(
        &self,
        user: &User,
        user_agent: Option<&str>,
    ) -> Result<IssuedTokens, AuthError> {
        let (access_token, refresh) = self.keys.issue_pair(user.id, &user.email)?;
        self.sessions
            .create(user.id, &refresh.hash, user_agent, refresh.expires_at)
            .await?;
        Ok(IssuedTokens {
            access_token,
            refresh_token: refresh.token,
            refresh_expires_at: refresh.expires_at,
        })
    }

    async fn revoke_after_reuse(&self, user_id: threadline_core::UserId) -> AuthError {
        match self.sessions.delete_all_for_user(user_id).await {
            Ok(revoked) => {
                warn!(%user_id, revoked, "Refresh token reuse detected, sessions revoked");
                AuthError::TokenReuse
            }
            Err(e) => AuthError::Repository(e),
        }
    }

    // =========================================================================
    // Google
    // =========================================================================

    /// Sign in with a Google profile, linking or creating the user.
    ///
    /// Resolution order: an existing Google link, then an existing user with
    /// the same email (linked now), then a new user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::EmailNotVerified` if Google hasn't verified the email.
    #[instrument(skip(self, profile, user_agent), fields(sub = %profile.sub))]
    pub async fn sign_in_with_google(
        &self,
        profile: &GoogleProfile,
        user_agent: Option<&str>,
    ) -> Result<(User, IssuedTokens), AuthError> {
        if !profile.email_verified {
            return Err(AuthError::EmailNotVerified);
        }
        let email = Email::parse(&profile.email)?;

        let user = if let Some(user) = self
            .users
            .get_by_provider(AuthProvider::Google, &profile.sub)
            .await?
        {
            user
        } else if let Some(user) = self.users.get_by_email(&email).await? {
            self.users
                .link_provider(user.id, AuthProvider::Google, &profile.sub)
                .await?;
            info!(user_id = %user.id, "Linked Google account to existing user");
            user
        } else {
            let user = self
                .users
                .create_with_provider(
                    &email,
                    profile.name.as_deref().unwrap_or_default(),
                    profile.picture.as_deref(),
                    AuthProvider::Google,
                    &profile.sub,
                )
                .await?;
            info!(user_id = %user.id, "User registered with Google");
            user
        };

        let tokens = self.start_session(&user, user_agent).await?;
        Ok((user, tokens))
    }
}

/// Validate password meets requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` describing the failed rule.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse battery", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_validate_password_length() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("longenough").is_ok());
        assert!(validate_password(&"x".repeat(MAX_PASSWORD_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_password_counts_characters() {
        // 8 characters, 16 bytes
        assert!(validate_password("éééééééé").is_ok());
        assert!(validate_password("éééé").is_err());
    }
}
