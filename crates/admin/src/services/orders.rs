//! Order fulfilment workflow for the back-office.

use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument};
use validator::Validate;

use threadline_core::validation::FieldErrors;
use threadline_core::{OrderId, OrderStatus};

use crate::db::{OrderRepository, RepositoryError};
use crate::models::{OrderDetail, OrderListQuery, OrderPage};

/// Errors from order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Validation failed")]
    Validation(FieldErrors),

    #[error("order {0} not found")]
    NotFound(OrderId),

    /// The requested status does not follow from the current one.
    #[error("order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Another editor changed the order first.
    #[error("order {0} was changed by someone else, reload and try again")]
    Concurrent(OrderId),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

pub struct OrderService<'a> {
    orders: OrderRepository<'a>,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            orders: OrderRepository::new(pool),
        }
    }

    /// # Errors
    ///
    /// Returns `OrderError::Validation` for out-of-range paging.
    #[instrument(skip(self))]
    pub async fn list(&self, query: &OrderListQuery) -> Result<OrderPage, OrderError> {
        query
            .validate()
            .map_err(|e| OrderError::Validation(FieldErrors::from(e)))?;
        Ok(self.orders.list(query).await?)
    }

    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for an unknown id.
    #[instrument(skip(self))]
    pub async fn get(&self, id: OrderId) -> Result<OrderDetail, OrderError> {
        self.orders.get(id).await?.ok_or(OrderError::NotFound(id))
    }

    /// Move an order to `next`.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::InvalidTransition` when `next` does not follow the
    /// current status and `OrderError::Concurrent` when the status changed
    /// while this update was in flight.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<OrderDetail, OrderError> {
        let current = match self.orders.status(id).await {
            Ok(status) => status,
            Err(RepositoryError::NotFound) => return Err(OrderError::NotFound(id)),
            Err(e) => return Err(e.into()),
        };

        if !current.can_transition_to(next) {
            return Err(OrderError::InvalidTransition {
                from: current,
                to: next,
            });
        }

        let detail = self
            .orders
            .update_status(id, current, next)
            .await?
            .ok_or(OrderError::Concurrent(id))?;

        info!(order_id = %id, from = %current, to = %next, "Order status updated");
        Ok(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_error_message() {
        let err = OrderError::InvalidTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Pending,
        };
        assert_eq!(err.to_string(), "order cannot move from delivered to pending");
    }
}
