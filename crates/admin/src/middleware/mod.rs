//! HTTP middleware stack for admin.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request span with `request_id`)
//! 3. Request ID
//! 4. API token check (everything but the health checks)

pub mod auth;
pub mod request_id;

pub use auth::{ApiTokenVerifier, require_api_token};
pub use request_id::request_id_middleware;
