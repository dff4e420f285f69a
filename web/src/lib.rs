//! # Orderflow Web
//!
//! Axum HTTP ingress for the Orderflow saga engine: the create-order route,
//! correlation-id middleware, error → status mapping and the server loop with
//! graceful shutdown. The `orderflow` binary in this crate wires the whole
//! service together.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::AppError;
pub use state::AppState;
