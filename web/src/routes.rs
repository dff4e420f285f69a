//! HTTP route handlers.

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::{Extension, Json};
use orderflow_runtime::NewOrder;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `POST /api/v1/orders`.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    /// User placing the order.
    pub user_id: Uuid,
    /// Product being ordered.
    pub product_id: Uuid,
    /// Order amount; must be strictly positive.
    pub amount: i64,
}

/// Body of a successful order creation.
#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    /// Human-readable confirmation.
    pub message: &'static str,
}

/// `POST /api/v1/orders`: accept an order and start its saga.
///
/// Returns `201` once the order is persisted and `OrderCreated` published;
/// the rest of the workflow is asynchronous.
///
/// # Errors
///
/// `400` on malformed bodies or a non-positive amount, `500` on
/// persistence/bus failures.
pub async fn create_order(
    State(state): State<AppState>,
    Extension(correlation_id): Extension<Uuid>,
    body: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), AppError> {
    let Json(request) = body.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

    state
        .create_order
        .execute(
            NewOrder {
                user_id: request.user_id,
                product_id: request.product_id,
                amount: request.amount,
            },
            Some(correlation_id),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            message: "Order created successfully",
        }),
    ))
}
