//! Create-order use case: the saga's entry point.
//!
//! Constructs the order, persists it, then publishes `OrderCreated` to start
//! the asynchronous workflow. The caller (HTTP ingress) maps
//! [`CreateOrderError::Order`] with an invalid amount to a client error and
//! everything else to a server error.

use orderflow_core::bus::{BusError, EventBus};
use orderflow_core::event::Event;
use orderflow_core::order::{Order, OrderError};
use orderflow_core::repository::{OrderRepository, RepositoryError};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Failure of the create-order use case.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CreateOrderError {
    /// The order could not be constructed (business-rule violation).
    #[error(transparent)]
    Order(#[from] OrderError),

    /// Persisting the new order failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Publishing `OrderCreated` failed.
    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Inputs of the create-order use case.
#[derive(Debug, Clone, Copy)]
pub struct NewOrder {
    /// User placing the order.
    pub user_id: Uuid,
    /// Product being ordered.
    pub product_id: Uuid,
    /// Order amount; must be strictly positive.
    pub amount: i64,
}

/// The create-order use case.
pub struct CreateOrder {
    repository: Arc<dyn OrderRepository>,
    bus: Arc<dyn EventBus>,
}

impl CreateOrder {
    /// Build the use case.
    #[must_use]
    pub const fn new(repository: Arc<dyn OrderRepository>, bus: Arc<dyn EventBus>) -> Self {
        Self { repository, bus }
    }

    /// Create the order and kick off the saga.
    ///
    /// Returns the id of the new order.
    ///
    /// # Errors
    ///
    /// Returns [`CreateOrderError::Order`] on an invalid amount (in that
    /// case nothing was persisted and no event was published), or the
    /// underlying persistence/bus error.
    pub async fn execute(
        &self,
        request: NewOrder,
        correlation_id: Option<Uuid>,
    ) -> Result<Uuid, CreateOrderError> {
        let order = Order::new(request.user_id, request.product_id, request.amount)?;
        self.repository.save(&order).await?;
        self.bus
            .publish(Event::order_created(&order).with_correlation(correlation_id))
            .await?;
        tracing::info!(order_id = %order.id, "order created");
        Ok(order.id)
    }
}
