//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                               - Liveness
//! GET  /health/ready                         - Readiness (database)
//!
//! # Auth
//! POST /api/auth/register                    - Email + password sign-up
//! POST /api/auth/login                       - Email + password sign-in
//! POST /api/auth/refresh                     - Rotate the refresh token
//! POST /api/auth/logout                      - End the session
//! GET  /api/auth/me                          - Signed-in user (requires auth)
//! GET  /api/auth/google                      - Redirect to Google
//! GET  /api/auth/google/callback             - Google OAuth callback
//!
//! # Account (requires auth)
//! GET   /api/account/profile                 - Profile
//! PATCH /api/account/profile                 - Update name and phone
//! GET   /api/account/addresses               - Saved addresses
//! POST  /api/account/addresses               - Save an address
//! PATCH /api/account/addresses/{id}          - Edit an address
//! DELETE /api/account/addresses/{id}         - Delete an address
//! POST  /api/account/addresses/{id}/primary  - Make an address primary
//!
//! # Cart (requires auth)
//! GET    /api/cart                           - Server cart
//! PUT    /api/cart                           - Push the local cart
//! DELETE /api/cart                           - Clear
//!
//! # Orders (requires auth)
//! POST /api/orders                           - Place an order
//! GET  /api/orders                           - Order history
//! GET  /api/orders/{id}                      - Order detail
//!
//! # Catalog (public)
//! GET  /api/catalog/home                     - Banners, grid and categories
//! GET  /api/catalog/categories               - All categories
//! GET  /api/catalog/categories/{slug}        - Category with subcategories
//! GET  /api/catalog/subcategories/{slug}/products
//! GET  /api/catalog/products?featured=       - Products
//! GET  /api/catalog/products/{slug}          - Product detail
//! GET  /api/catalog/colors                   - Colors
//! GET  /api/catalog/sizes                    - Sizes
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod google_auth;
pub mod orders;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::{auth_rate_limiter, checkout_rate_limiter, create_session_layer};
use crate::state::AppState;

/// Create the auth routes router.
///
/// The Google routes carry the server session that holds the OAuth
/// handshake state.
pub fn auth_routes(state: &AppState) -> Router<AppState> {
    let credentials = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .layer(auth_rate_limiter());

    let google = Router::new()
        .route("/google", get(google_auth::start))
        .route("/google/callback", get(google_auth::callback))
        .layer(create_session_layer(state.pool(), state.config()));

    Router::new()
        .merge(credentials)
        .merge(google)
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/profile",
            get(account::profile).patch(account::update_profile),
        )
        .route(
            "/addresses",
            get(account::list_addresses).post(account::create_address),
        )
        .route(
            "/addresses/{id}",
            axum::routing::patch(account::update_address).delete(account::delete_address),
        )
        .route(
            "/addresses/{id}/primary",
            post(account::set_primary_address),
        )
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new().route(
        "/",
        get(cart::get_cart)
            .put(cart::sync_cart)
            .delete(cart::clear_cart),
    )
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(orders::place_order)
                .layer(checkout_rate_limiter())
                .get(orders::list_orders),
        )
        .route("/{id}", get(orders::get_order))
}

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/home", get(catalog::home))
        .route("/categories", get(catalog::categories))
        .route("/categories/{slug}", get(catalog::category))
        .route(
            "/subcategories/{slug}/products",
            get(catalog::subcategory_products),
        )
        .route("/products", get(catalog::products))
        .route("/products/{slug}", get(catalog::product))
        .route("/colors", get(catalog::colors))
        .route("/sizes", get(catalog::sizes))
}

/// Create all routes for the storefront.
pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .nest("/api/auth", auth_routes(state))
        .nest("/api/account", account_routes())
        .nest("/api/cart", cart_routes())
        .nest("/api/orders", order_routes())
        .nest("/api/catalog", catalog_routes())
}
