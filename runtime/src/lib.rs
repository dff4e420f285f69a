//! # Orderflow Runtime
//!
//! The asynchronous orchestration layer of the Orderflow saga engine:
//!
//! - [`bus::InMemoryBus`]: in-process publish/subscribe with bounded intake,
//!   per-event deadlines and graceful close
//! - [`resilience`]: retry with jittered exponential backoff and a circuit
//!   breaker, composed by [`resilience::with_resilience`]
//! - [`workers`]: the four stage workers (validation, payment, cancellation,
//!   confirmation)
//! - [`create_order::CreateOrder`]: the use case that starts a saga
//!
//! The saga terminates at `OrderConfirmed` or `OrderCancelled`:
//!
//! ```text
//! OrderCreated ──► validation ──► OrderValidated ──► payment ──► PaymentSucceeded ──► confirmation ──► OrderConfirmed
//!                      │                                │
//!                      ▼                                ▼
//!               ValidationFailed                  PaymentFailed
//!                      └──────────► cancellation ◄──────┘
//!                                       │
//!                                       ▼
//!                                 OrderCancelled
//! ```

pub mod bus;
pub mod config;
pub mod create_order;
pub mod resilience;
pub mod workers;

pub use bus::InMemoryBus;
pub use config::{ConfigError, WorkerConfig};
pub use create_order::{CreateOrder, CreateOrderError, NewOrder};
