//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `STOREFRONT_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `JWT_ACCESS_SECRET` - HS256 key for access tokens (min 32 chars, high entropy)
//! - `JWT_REFRESH_SECRET` - HS256 key for refresh tokens (min 32 chars, high entropy)
//! - `CMS_PROJECT_ID` - Content platform project
//! - `CMS_DATASET` - Content platform dataset
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET` - Google sign-in (disabled if unset)
//! - `CMS_API_VERSION` - Content API version (default: v2024-06-01)
//! - `CMS_API_URL` - Override the content API origin (default: `https://{project}.api.sanity.io`)
//! - `CMS_READ_TOKEN` - Token for private datasets
//! - `DELIVERY_FEE` - Flat delivery charge (default: 10.00)
//! - `FREE_DELIVERY_THRESHOLD` - Subtotal at which delivery is free (default: 150.00, `none` disables)
//! - `CURRENCY` - ISO 4217 code for new orders (default: USD)
//! - `LOG_FORMAT` - `json` for structured logs, anything else for text
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` / `SENTRY_TRACES_SAMPLE_RATE` - Sampling (default: 1.0 / 0.1)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use threadline_core::CurrencyCode;
use threadline_core::checkout::ShippingPolicy;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Server session signing secret
    pub session_secret: SecretString,
    /// Token signing keys
    pub jwt: JwtConfig,
    /// Google OAuth client, if sign-in with Google is enabled
    pub google: Option<GoogleConfig>,
    /// Content platform access
    pub cms: CmsConfig,
    /// Delivery pricing
    pub shipping: ShippingPolicy,
    /// Currency recorded on new orders
    pub currency: CurrencyCode,
    /// Emit JSON logs
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. "production")
    pub sentry_environment: Option<String>,
    /// Error event sample rate
    pub sentry_sample_rate: f32,
    /// Performance trace sample rate
    pub sentry_traces_sample_rate: f32,
}

/// HS256 signing keys for access and refresh tokens.
#[derive(Clone)]
pub struct JwtConfig {
    pub access_secret: SecretString,
    pub refresh_secret: SecretString,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_secret", &"[REDACTED]")
            .field("refresh_secret", &"[REDACTED]")
            .finish()
    }
}

/// Google OAuth client credentials.
#[derive(Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl std::fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Content platform configuration.
#[derive(Clone)]
pub struct CmsConfig {
    pub project_id: String,
    pub dataset: String,
    pub api_version: String,
    /// API origin, without trailing slash.
    pub api_url: String,
    pub read_token: Option<SecretString>,
}

impl std::fmt::Debug for CmsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmsConfig")
            .field("project_id", &self.project_id)
            .field("dataset", &self.dataset)
            .field("api_version", &self.api_version)
            .field("api_url", &self.api_url)
            .field("read_token", &self.read_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl CmsConfig {
    /// GraphQL endpoint for the configured dataset.
    #[must_use]
    pub fn graphql_endpoint(&self) -> String {
        format!(
            "{}/{}/graphql/{}/default",
            self.api_url, self.api_version, self.dataset
        )
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFRONT_PORT", "3000")?;
        let base_url = parse_base_url("STOREFRONT_BASE_URL")?;
        let session_secret = get_validated_secret("STOREFRONT_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "STOREFRONT_SESSION_SECRET")?;

        let jwt = JwtConfig::from_env()?;
        let google = GoogleConfig::from_env()?;
        let cms = CmsConfig::from_env()?;
        let shipping = shipping_from_env()?;
        let currency = parse_env("CURRENCY", "USD")?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            jwt,
            google,
            cms,
            shipping,
            currency,
            log_json: get_optional_env("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl JwtConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let access_secret = get_validated_secret("JWT_ACCESS_SECRET")?;
        validate_session_secret(&access_secret, "JWT_ACCESS_SECRET")?;
        let refresh_secret = get_validated_secret("JWT_REFRESH_SECRET")?;
        validate_session_secret(&refresh_secret, "JWT_REFRESH_SECRET")?;

        if access_secret.expose_secret() == refresh_secret.expose_secret() {
            return Err(ConfigError::InsecureSecret(
                "JWT_REFRESH_SECRET".to_string(),
                "must differ from JWT_ACCESS_SECRET".to_string(),
            ));
        }

        Ok(Self {
            access_secret,
            refresh_secret,
        })
    }
}

impl GoogleConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(client_id) = get_optional_env("GOOGLE_CLIENT_ID") else {
            return Ok(None);
        };
        Ok(Some(Self {
            client_id,
            client_secret: get_validated_secret("GOOGLE_CLIENT_SECRET")?,
        }))
    }
}

impl CmsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let project_id = get_required_env("CMS_PROJECT_ID")?;
        let api_url = get_optional_env("CMS_API_URL").map_or_else(
            || format!("https://{project_id}.api.sanity.io"),
            |url| url.trim_end_matches('/').to_string(),
        );
        Ok(Self {
            dataset: get_required_env("CMS_DATASET")?,
            api_version: get_env_or_default("CMS_API_VERSION", "v2024-06-01"),
            read_token: get_optional_env("CMS_READ_TOKEN").map(SecretString::from),
            project_id,
            api_url,
        })
    }
}

fn shipping_from_env() -> Result<ShippingPolicy, ConfigError> {
    let defaults = ShippingPolicy::default();

    let delivery_fee = match get_optional_env("DELIVERY_FEE") {
        Some(value) => parse_decimal("DELIVERY_FEE", &value)?,
        None => defaults.delivery_fee,
    };

    let free_delivery_threshold = match get_optional_env("FREE_DELIVERY_THRESHOLD") {
        Some(value) if value.eq_ignore_ascii_case("none") => None,
        Some(value) => Some(parse_decimal("FREE_DELIVERY_THRESHOLD", &value)?),
        None => defaults.free_delivery_threshold,
    };

    Ok(ShippingPolicy {
        delivery_fee,
        free_delivery_threshold,
    })
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Read an absolute `http(s)` origin, without trailing slash.
fn parse_base_url(key: &str) -> Result<String, ConfigError> {
    let raw = get_required_env(key)?;
    validate_base_url(key, &raw)
}

fn validate_base_url(key: &str, raw: &str) -> Result<String, ConfigError> {
    let url = url::Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "expected an http(s) URL".to_string(),
        ));
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable (or its default) with `FromStr`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    let amount = Decimal::from_str(value.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if amount.is_sign_negative() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must not be negative".to_string(),
        ));
    }
    Ok(amount)
}

/// Validate that a secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
