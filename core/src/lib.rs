//! # Orderflow Core
//!
//! Domain model and port traits for the Orderflow saga engine.
//!
//! This crate is I/O-free. It defines:
//!
//! - The [`order::Order`] aggregate and its status state machine
//! - The typed [`event::Event`] envelope and payload variants
//! - The [`bus::EventBus`] and [`bus::Subscriber`] traits
//! - The [`repository::OrderRepository`] persistence port
//! - The collaborator service contracts in [`services`]
//!
//! Implementations live in the sibling crates: `orderflow-runtime` (bus,
//! resilience, workers), `orderflow-postgres` (repository) and
//! `orderflow-testing` (fakes).

pub mod bus;
pub mod event;
pub mod order;
pub mod repository;
pub mod services;
pub mod worker;

pub use bus::{BusError, EventBus, Subscriber};
pub use event::{Event, EventPayload, EventType};
pub use order::{Order, OrderError, OrderStatus};
pub use repository::{OrderRepository, RepositoryError};
pub use services::{
    AntiFraudService, OrderCheck, PaymentService, ServiceError, UserService, WarehouseService,
};
pub use worker::WorkerError;
