//! Domain and row types for the storefront database.
//!
//! Row types derive `sqlx::FromRow` and double as API response bodies where
//! the shapes line up; request bodies live next to their handlers.

pub mod address;
pub mod cart;
pub mod order;
pub mod session;
pub mod user;

pub use address::{Address, AddressInput, AddressSnapshot};
pub use cart::{Cart, CartView};
pub use order::{Delivery, Order, OrderDetail, OrderItem, Pickup};
pub use session::{CurrentUser, RefreshSession, session_keys};
pub use user::User;
