//! Threadline Core - Shared types library.
//!
//! This crate provides common types used across all Threadline components:
//! - `storefront` - Customer-facing JSON API (auth, cart, checkout, catalog)
//! - `admin` - Back-office RPC and form actions over the CMS and orders
//! - `cli` - Command-line tools for migrations, seeding and maintenance
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows the cart and
//! checkout rules to be tested without any infrastructure.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, emails, and statuses
//! - [`cart`] - Local/server cart reconciliation
//! - [`checkout`] - Server-side price recomputation and total verification
//! - [`cms`] - Content document types and the schema descriptor
//! - [`slug`] - URL slug generation
//! - [`validation`] - Field-error maps built from `validator` errors

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod cms;
pub mod slug;
pub mod types;
pub mod validation;

pub use types::*;
