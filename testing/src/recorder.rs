//! Event-recording subscriber for saga assertions.

use orderflow_core::bus::{BusError, EventBus, Subscriber};
use orderflow_core::event::{Event, EventType};
use orderflow_core::worker::WorkerError;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

/// Every event type a saga can emit.
pub const ALL_EVENT_TYPES: [EventType; 7] = [
    EventType::OrderCreated,
    EventType::OrderValidated,
    EventType::ValidationFailed,
    EventType::PaymentSucceeded,
    EventType::PaymentFailed,
    EventType::OrderConfirmed,
    EventType::OrderCancelled,
];

/// Subscriber that records every event it sees and lets tests await a
/// particular emission.
#[derive(Default)]
pub struct EventRecorder {
    events: Mutex<Vec<Event>>,
    notify: Notify,
}

impl EventRecorder {
    /// An empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `recorder` to every event type on `bus`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Closed`] if the bus is already closed.
    pub fn subscribe_all(recorder: &Arc<Self>, bus: &dyn EventBus) -> Result<(), BusError> {
        for event_type in ALL_EVENT_TYPES {
            bus.subscribe(event_type, Arc::clone(recorder) as Arc<dyn Subscriber>)?;
        }
        Ok(())
    }

    /// Snapshot of everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.lock().clone()
    }

    /// Recorded events for one order, in arrival order.
    #[must_use]
    pub fn events_for(&self, order_id: Uuid) -> Vec<Event> {
        self.lock()
            .iter()
            .filter(|event| event.order_id() == order_id)
            .cloned()
            .collect()
    }

    /// Event types recorded for one order, in arrival order.
    #[must_use]
    pub fn event_types_for(&self, order_id: Uuid) -> Vec<EventType> {
        self.events_for(order_id)
            .iter()
            .map(Event::event_type)
            .collect()
    }

    /// Wait until an event of `event_type` for `order_id` has been recorded.
    ///
    /// Returns `None` when `deadline` expires first.
    pub async fn wait_for(
        &self,
        event_type: EventType,
        order_id: Uuid,
        deadline: Duration,
    ) -> Option<Event> {
        let result = tokio::time::timeout(deadline, async {
            loop {
                let notified = self.notify.notified();
                if let Some(event) = self.find(event_type, order_id) {
                    return event;
                }
                notified.await;
            }
        })
        .await;
        result.ok()
    }

    fn find(&self, event_type: EventType, order_id: Uuid) -> Option<Event> {
        self.lock()
            .iter()
            .find(|event| event.event_type() == event_type && event.order_id() == order_id)
            .cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Event>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Subscriber for EventRecorder {
    fn name(&self) -> &'static str {
        "recorder"
    }

    fn handle(
        &self,
        event: Event,
    ) -> Pin<Box<dyn Future<Output = Result<(), WorkerError>> + Send + '_>> {
        Box::pin(async move {
            self.lock().push(event);
            self.notify.notify_waiters();
            Ok(())
        })
    }
}
