//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request span with `request_id` and `user_id` fields)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers
//! 5. Auth gate (verify access token, inject identity headers)
//! 6. Per-route: session layer on Google OAuth, rate limiting on auth and checkout

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{RequireUser, auth_gate};
pub use rate_limit::{auth_rate_limiter, checkout_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
