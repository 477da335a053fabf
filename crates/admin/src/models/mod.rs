//! Row and view types for the back-office.

pub mod order;

pub use order::{
    Delivery, OrderDetail, OrderItem, OrderListQuery, OrderPage, OrderSummary, Pickup,
};
