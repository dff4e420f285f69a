//! Upsert-by-id order persistence.

use chrono::{DateTime, Utc};
use orderflow_core::order::{Order, OrderStatus};
use orderflow_core::repository::{OrderRepository, RepositoryError};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::future::Future;
use std::pin::Pin;
use uuid::Uuid;

/// [`OrderRepository`] backed by the `orders` table.
///
/// Writes are upserts keyed on the order id: an insert for a fresh order, an
/// update for a mutated one, with `updated_at` stamped by the database on the
/// update path.
#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    /// Wrap a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn order_from_row(row: &PgRow) -> Result<Order, RepositoryError> {
    let id: Uuid = read(row, "id")?;
    let status_raw: String = read(row, "status")?;
    let status = OrderStatus::parse(&status_raw).ok_or_else(|| {
        RepositoryError::Database(format!("order {id} has unknown status '{status_raw}'"))
    })?;

    Ok(Order {
        id,
        user_id: read(row, "user_id")?,
        product_id: read(row, "product_id")?,
        amount: read(row, "amount")?,
        status,
        created_at: read::<DateTime<Utc>>(row, "created_at")?,
        updated_at: read::<DateTime<Utc>>(row, "updated_at")?,
    })
}

fn read<'r, T>(row: &'r PgRow, column: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|err| RepositoryError::Database(err.to_string()))
}

impl OrderRepository for PostgresOrderRepository {
    fn find_by_id(
        &self,
        id: Uuid,
    ) -> Pin<Box<dyn Future<Output = Result<Order, RepositoryError>> + Send + '_>> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT id, user_id, product_id, amount, status, created_at, updated_at \
                 FROM orders WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| RepositoryError::Database(err.to_string()))?;

            match row {
                Some(row) => order_from_row(&row),
                None => Err(RepositoryError::NotFound(id)),
            }
        })
    }

    fn save<'a>(
        &'a self,
        order: &'a Order,
    ) -> Pin<Box<dyn Future<Output = Result<(), RepositoryError>> + Send + 'a>> {
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO orders (id, user_id, product_id, amount, status, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 ON CONFLICT (id) DO UPDATE SET \
                     user_id = EXCLUDED.user_id, \
                     product_id = EXCLUDED.product_id, \
                     amount = EXCLUDED.amount, \
                     status = EXCLUDED.status, \
                     updated_at = now()",
            )
            .bind(order.id)
            .bind(order.user_id)
            .bind(order.product_id)
            .bind(order.amount)
            .bind(order.status.as_str())
            .bind(order.created_at)
            .bind(order.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|err| RepositoryError::Database(err.to_string()))?;
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use orderflow_core::order::OrderStatus;

    #[test]
    fn status_column_values_round_trip() {
        // The column stores the display form; every variant must come back.
        for status in [
            OrderStatus::Created,
            OrderStatus::Validated,
            OrderStatus::ValidationFailed,
            OrderStatus::PaymentPending,
            OrderStatus::Paid,
            OrderStatus::PaymentFailed,
            OrderStatus::Cancelled,
            OrderStatus::Confirmed,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
    }
}
