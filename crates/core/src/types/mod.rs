//! Core types for Threadline.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{CurrencyCode, Money, ROUNDING_TOLERANCE, approx_eq, round_amount};
pub use status::*;
