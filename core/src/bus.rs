//! Event bus abstraction for saga-stage communication.
//!
//! The [`EventBus`] trait provides publish/subscribe keyed by [`EventType`].
//! Events flow from the stage that produced them to every subscriber of their
//! type; subscribers run concurrently, so they must tolerate concurrent
//! invocations for different orders.
//!
//! # Delivery semantics
//!
//! - Events published from a single publisher are dispatched in publication
//!   order.
//! - Delivery is at-most-once: a subscriber error is logged and swallowed by
//!   the bus. There is no redelivery and no dead-letter queue; this is a
//!   documented limitation of the in-memory transport.
//!
//! # Dyn compatibility
//!
//! `publish` uses an explicit `Pin<Box<dyn Future>>` return instead of
//! `async fn` so the trait stays usable as a trait object
//! (`Arc<dyn EventBus>`) shared between workers and the ingress use case.

use crate::event::{Event, EventType};
use crate::worker::WorkerError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The bus has been closed; no further publishes or subscriptions are
    /// accepted.
    #[error("event bus is closed")]
    Closed,

    /// The publish was abandoned before the bus accepted the event.
    #[error("publish cancelled before the event was accepted")]
    Cancelled,
}

/// A stage worker that reacts to one or more event types.
///
/// Implementations load the order the event refers to, call their
/// collaborators, advance the state machine, persist and publish the next
/// event. Returning an error tells the bus the event was not processed; the
/// bus logs the error and drops the event.
pub trait Subscriber: Send + Sync {
    /// Short name of the worker, used in log fields.
    fn name(&self) -> &'static str;

    /// React to one event.
    ///
    /// The future is awaited under the bus's per-event deadline; exceeding it
    /// cancels the future.
    fn handle(
        &self,
        event: Event,
    ) -> Pin<Box<dyn Future<Output = Result<(), WorkerError>> + Send + '_>>;
}

/// Publish/subscribe transport keyed by [`EventType`].
pub trait EventBus: Send + Sync {
    /// Enqueue an event for dispatch.
    ///
    /// Blocks (asynchronously) until the bus worker accepts the event, so
    /// publishers observe backpressure by waiting rather than by rejection.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Closed`] if the bus has been closed.
    fn publish(
        &self,
        event: Event,
    ) -> Pin<Box<dyn Future<Output = Result<(), BusError>> + Send + '_>>;

    /// Append a subscriber to the list for `event_type`.
    ///
    /// Subscribing is expected at initialization; concurrent
    /// subscribe/publish is permitted but ordering between them is
    /// unspecified. Removal is not supported.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Closed`] if the bus has been closed.
    fn subscribe(
        &self,
        event_type: EventType,
        subscriber: Arc<dyn Subscriber>,
    ) -> Result<(), BusError>;
}
