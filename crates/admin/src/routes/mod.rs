//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                              - Liveness
//! GET  /health/ready                        - Readiness (database)
//!
//! # RPC (typed procedures)
//! GET  /rpc/{name}?input=<json>             - Query procedure
//! POST /rpc/{name}                          - Mutation procedure (JSON body)
//!
//! # Form actions (form-encoded)
//! POST /actions/{resource}                  - Create
//! POST /actions/{resource}/{id}             - Update
//! POST /actions/{resource}/{id}/delete      - Delete
//!
//! # Media
//! POST /api/media                           - Multipart image upload
//! ```
//!
//! Every route except the health checks requires the API token.

pub mod actions;
pub mod media;
pub mod rpc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::state::AppState;

/// Multipart framing allowance on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the RPC routes router.
pub fn rpc_routes() -> Router<AppState> {
    Router::new().route(
        "/{name}",
        get(rpc::query)
            .post(rpc::mutation)
            .fallback(rpc::method_not_supported),
    )
}

/// Create the form action routes router.
pub fn action_routes() -> Router<AppState> {
    Router::new()
        .route("/{resource}", post(actions::create))
        .route("/{resource}/{id}", post(actions::update))
        .route("/{resource}/{id}/delete", post(actions::delete))
}

/// Create the media routes router.
pub fn media_routes(state: &AppState) -> Router<AppState> {
    let limit = state.config().media.max_upload_bytes + MULTIPART_OVERHEAD;
    Router::new()
        .route("/", post(media::upload))
        .layer(DefaultBodyLimit::max(limit))
}

/// Create all routes for admin.
pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .nest("/rpc", rpc_routes())
        .nest("/actions", action_routes())
        .nest("/api/media", media_routes(state))
}
