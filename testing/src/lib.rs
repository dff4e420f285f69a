//! # Orderflow Testing
//!
//! Test doubles for the Orderflow saga engine:
//!
//! - [`fakes`]: scripted collaborator stubs with call counting, for
//!   deterministic retry/breaker assertions
//! - [`simulation`]: randomized collaborator simulations with configurable
//!   latency and failure rates, wired by the demo service binary
//! - [`memory_repository::InMemoryOrderRepository`]: map-backed repository
//! - [`recorder::EventRecorder`]: subscriber that records emissions and
//!   lets tests await a particular event

pub mod fakes;
pub mod memory_repository;
pub mod recorder;
pub mod simulation;

pub use fakes::{Script, StubAntiFraud, StubPayment, StubUser, StubWarehouse};
pub use memory_repository::InMemoryOrderRepository;
pub use recorder::{ALL_EVENT_TYPES, EventRecorder};
pub use simulation::{
    SimulatedAntiFraud, SimulatedPayment, SimulatedUser, SimulatedWarehouse, SimulationProfile,
};
