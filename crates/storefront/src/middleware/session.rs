//! Session middleware configuration.
//!
//! Server sessions only hold the Google OAuth handshake (state, PKCE
//! verifier, callback URL); signed-in identity lives in the token cookies.

use secrecy::ExposeSecret;
use sha2::{Digest, Sha512};
use sqlx::PgPool;
use tower_sessions::cookie::Key;
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "tl_session";

/// Session expiry time in seconds (10 minutes, enough to finish sign-in).
const SESSION_EXPIRY_SECONDS: i64 = 10 * 60;

/// Create the session layer with `PostgreSQL` store.
///
/// The session cookie is signed with a key derived from
/// `STOREFRONT_SESSION_SECRET`.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore, SignedCookie> {
    // Note: The sessions table must be created via migration
    let store = PostgresStore::new(pool.clone());

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.secure_cookies())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/api/auth")
        .with_signed(signing_key(config.session_secret.expose_secret()))
}

/// 64-byte cookie signing key from the configured secret.
fn signing_key(secret: &str) -> Key {
    Key::from(Sha512::digest(secret.as_bytes()).as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_key_is_deterministic() {
        let a = signing_key("a-session-secret-that-is-long-enough");
        let b = signing_key("a-session-secret-that-is-long-enough");
        let c = signing_key("another-session-secret-long-enough!!");
        assert_eq!(a.master(), b.master());
        assert_ne!(a.master(), c.master());
    }
}
