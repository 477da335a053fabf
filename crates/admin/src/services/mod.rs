//! Business logic shared by the RPC procedures, form actions and CLI.

pub mod catalog;
pub mod media;
pub mod orders;

pub use catalog::{CatalogError, CatalogService};
pub use media::{MediaError, MediaService};
pub use orders::{OrderError, OrderService};
