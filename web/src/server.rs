//! Router assembly and HTTP serving with graceful shutdown.

use crate::middleware::correlation_id_layer;
use crate::routes;
use crate::state::AppState;
use axum::Router;
use axum::routing::post;
use std::net::{Ipv4Addr, SocketAddr};
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;

/// Build the application router with its middleware stack.
///
/// Layer order (outermost first): correlation/logging, CORS, panic recovery.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/orders", post(routes::create_order))
        .with_state(state)
        .layer(CatchPanicLayer::new())
        .layer(CorsLayer::permissive())
        .layer(correlation_id_layer())
}

/// Serve `app` on `port` until `shutdown` is cancelled, then drain open
/// connections.
///
/// # Errors
///
/// Returns an error when the listener cannot bind or the server fails.
pub async fn serve(app: Router, port: u16, shutdown: CancellationToken) -> std::io::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}
