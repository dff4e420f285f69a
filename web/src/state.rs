//! Application state shared across HTTP handlers.

use orderflow_runtime::CreateOrder;
use std::sync::Arc;

/// State handed to every handler by Axum.
#[derive(Clone)]
pub struct AppState {
    /// The create-order use case.
    pub create_order: Arc<CreateOrder>,
}

impl AppState {
    /// Bundle the use cases the ingress exposes.
    #[must_use]
    pub const fn new(create_order: Arc<CreateOrder>) -> Self {
        Self { create_order }
    }
}
