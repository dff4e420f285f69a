//! In-memory order repository.

use orderflow_core::order::Order;
use orderflow_core::repository::{OrderRepository, RepositoryError};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

/// Map-backed [`OrderRepository`] with the same upsert-by-id semantics as
/// the Postgres implementation.
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<Uuid, Order>>,
}

impl InMemoryOrderRepository {
    /// An empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct read access for assertions, bypassing the async port.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<Order> {
        self.orders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Number of stored orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the repository is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of every stored order, in no particular order.
    #[must_use]
    pub fn ids(&self) -> Vec<Uuid> {
        self.orders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }
}

impl OrderRepository for InMemoryOrderRepository {
    fn find_by_id(
        &self,
        id: Uuid,
    ) -> Pin<Box<dyn Future<Output = Result<Order, RepositoryError>> + Send + '_>> {
        Box::pin(async move {
            self.orders
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&id)
                .cloned()
                .ok_or(RepositoryError::NotFound(id))
        })
    }

    fn save<'a>(
        &'a self,
        order: &'a Order,
    ) -> Pin<Box<dyn Future<Output = Result<(), RepositoryError>> + Send + 'a>> {
        Box::pin(async move {
            self.orders
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(order.id, order.clone());
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_find_round_trips() {
        let repo = InMemoryOrderRepository::new();
        let order = Order::new(Uuid::new_v4(), Uuid::new_v4(), 50).unwrap();

        repo.save(&order).await.unwrap();
        let found = repo.find_by_id(order.id).await.unwrap();
        assert_eq!(found, order);
    }

    #[tokio::test]
    async fn save_is_an_upsert() {
        let repo = InMemoryOrderRepository::new();
        let mut order = Order::new(Uuid::new_v4(), Uuid::new_v4(), 50).unwrap();

        repo.save(&order).await.unwrap();
        order.mark_validated().unwrap();
        repo.save(&order).await.unwrap();

        assert_eq!(repo.len(), 1);
        assert_eq!(
            repo.find_by_id(order.id).await.unwrap().status,
            order.status
        );
    }

    #[tokio::test]
    async fn miss_is_not_found() {
        let repo = InMemoryOrderRepository::new();
        let id = Uuid::new_v4();
        assert_eq!(
            repo.find_by_id(id).await,
            Err(RepositoryError::NotFound(id))
        );
    }
}
