//! Error type at the worker (event handler) boundary.

use crate::bus::BusError;
use crate::event::EventType;
use crate::order::OrderError;
use crate::repository::RepositoryError;
use thiserror::Error;

/// Failure of a stage worker while handling an event.
///
/// Worker errors surface to the bus, which logs them and drops the event;
/// there is no automatic redelivery. Collaborator failures do not appear
/// here: workers convert them into saga-level failure events instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// The worker received an event variant it does not handle.
    #[error("unexpected event type {0}")]
    UnexpectedEvent(EventType),

    /// The per-event deadline expired before the worker finished.
    #[error("event handling cancelled or timed out")]
    Cancelled,

    /// The state machine refused a transition; indicates an ordering or
    /// idempotence violation upstream.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// Loading or persisting the order failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Publishing the follow-up event failed.
    #[error(transparent)]
    Bus(#[from] BusError),
}
