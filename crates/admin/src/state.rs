//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::cms::CmsClient;
use crate::config::AdminConfig;
use crate::middleware::ApiTokenVerifier;
use crate::rpc::{self, Registry};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    pool: PgPool,
    cms: CmsClient,
    procedures: Registry,
    api_token: ApiTokenVerifier,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Admin configuration
    /// * `pool` - `PostgreSQL` connection pool
    #[must_use]
    pub fn new(config: AdminConfig, pool: PgPool) -> Self {
        let cms = CmsClient::new(&config.cms);
        let api_token = ApiTokenVerifier::new(&config.api_token);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                cms,
                procedures: rpc::registry(),
                api_token,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the CMS client (holds the write token).
    #[must_use]
    pub fn cms(&self) -> &CmsClient {
        &self.inner.cms
    }

    /// Get the RPC procedure table.
    #[must_use]
    pub fn procedures(&self) -> &Registry {
        &self.inner.procedures
    }

    #[must_use]
    pub fn api_token(&self) -> &ApiTokenVerifier {
        &self.inner.api_token
    }
}
