//! Session-related types.
//!
//! Two kinds of session exist: refresh-token sessions in
//! `storefront.session` (one per signed-in device), and short-lived server
//! sessions from tower-sessions that only carry OAuth handshake state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use threadline_core::{Email, SessionId, UserId};

/// Identity injected by the auth gate for downstream handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
}

/// A refresh-token session row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshSession {
    pub id: SessionId,
    pub user_id: UserId,
    pub token_hash: String,
    pub user_agent: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Session keys for OAuth handshake state.
pub mod session_keys {
    /// CSRF state for the Google OAuth redirect.
    pub const GOOGLE_OAUTH_STATE: &str = "google_oauth_state";

    /// PKCE code verifier paired with the state above.
    pub const GOOGLE_PKCE_VERIFIER: &str = "google_pkce_verifier";

    /// Where to send the user after the OAuth callback.
    pub const GOOGLE_CALLBACK_URL: &str = "google_callback_url";
}
