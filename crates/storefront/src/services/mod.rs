//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Password sign-up/sign-in, refresh rotation, Google linking
//! - `google` - Google OAuth client (authorization code + PKCE)
//! - `cart` - Reconcile, re-price and store the server cart
//! - `checkout` - Price the cart and write the order

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod google;
