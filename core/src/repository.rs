//! Persistence port for the order aggregate.

use crate::order::Order;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by an [`OrderRepository`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// No order with the given id exists.
    #[error("order {0} not found")]
    NotFound(Uuid),

    /// The underlying store failed.
    #[error("database error: {0}")]
    Database(String),
}

/// Upsert-by-id persistence for orders.
///
/// Implementations must be safe for concurrent use; workers never hold
/// per-aggregate locks, so two saves for the same order may race. The state
/// machine's refusal of illegal transitions is the serialization mechanism.
pub trait OrderRepository: Send + Sync {
    /// Load an order by id.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] on a lookup miss.
    fn find_by_id(
        &self,
        id: Uuid,
    ) -> Pin<Box<dyn Future<Output = Result<Order, RepositoryError>> + Send + '_>>;

    /// Insert the order, or update it in place if it already exists.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Database`] when the underlying store
    /// rejects the write.
    fn save<'a>(
        &'a self,
        order: &'a Order,
    ) -> Pin<Box<dyn Future<Output = Result<(), RepositoryError>> + Send + 'a>>;
}
