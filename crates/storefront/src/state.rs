//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::cms::CmsClient;
use crate::config::StorefrontConfig;
use crate::services::auth::TokenKeys;
use crate::services::google::GoogleClient;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    cms: CmsClient,
    tokens: TokenKeys,
    google: Option<GoogleClient>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool
    #[must_use]
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Self {
        let cms = CmsClient::new(&config.cms);
        let tokens = TokenKeys::new(&config.jwt);
        let google = config.google.as_ref().map(GoogleClient::new);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                cms,
                tokens,
                google,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the CMS client.
    #[must_use]
    pub fn cms(&self) -> &CmsClient {
        &self.inner.cms
    }

    /// Get the token signing keys.
    #[must_use]
    pub fn tokens(&self) -> &TokenKeys {
        &self.inner.tokens
    }

    /// Get the Google OAuth client, if configured.
    #[must_use]
    pub fn google(&self) -> Option<&GoogleClient> {
        self.inner.google.as_ref()
    }
}
