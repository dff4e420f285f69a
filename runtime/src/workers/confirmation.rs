//! Confirmation worker: the saga's success sink.
//!
//! Consumes `PaymentSucceeded`, marks the order confirmed and publishes
//! `OrderConfirmed`.

use crate::workers::EventLog;
use orderflow_core::bus::{EventBus, Subscriber};
use orderflow_core::event::{Event, EventPayload};
use orderflow_core::repository::OrderRepository;
use orderflow_core::worker::WorkerError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::Instrument;

/// Subscriber for `PaymentSucceeded`.
pub struct ConfirmationWorker {
    bus: Arc<dyn EventBus>,
    repository: Arc<dyn OrderRepository>,
}

impl ConfirmationWorker {
    /// Build the worker.
    #[must_use]
    pub const fn new(bus: Arc<dyn EventBus>, repository: Arc<dyn OrderRepository>) -> Self {
        Self { bus, repository }
    }

    async fn process(&self, event: Event) -> Result<(), WorkerError> {
        let event_type = event.event_type();
        let correlation_id = event.correlation_id;
        let EventPayload::PaymentSucceeded { order_id, .. } = event.payload else {
            return Err(WorkerError::UnexpectedEvent(event_type));
        };

        let mut order = self.repository.find_by_id(order_id).await?;
        order.mark_confirmed()?;
        self.repository.save(&order).await?;

        self.bus
            .publish(
                Event::new(EventPayload::OrderConfirmed { order_id: order.id })
                    .with_correlation(correlation_id),
            )
            .await?;
        Ok(())
    }
}

impl Subscriber for ConfirmationWorker {
    fn name(&self) -> &'static str {
        "confirmation"
    }

    fn handle(
        &self,
        event: Event,
    ) -> Pin<Box<dyn Future<Output = Result<(), WorkerError>> + Send + '_>> {
        Box::pin(async move {
            let log = EventLog::start(self.name(), &event);
            let result = self.process(event).instrument(log.span()).await;
            match &result {
                Ok(()) => log.success(),
                Err(err) => log.failure(err),
            }
            result
        })
    }
}
