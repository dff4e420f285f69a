//! Cancellation worker: the saga's failure sink.
//!
//! Consumes both `ValidationFailed` and `PaymentFailed`, cancels the order
//! and publishes `OrderCancelled` with the reason propagated unchanged.

use crate::workers::EventLog;
use orderflow_core::bus::{EventBus, Subscriber};
use orderflow_core::event::{Event, EventPayload};
use orderflow_core::repository::OrderRepository;
use orderflow_core::worker::WorkerError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::Instrument;

/// Subscriber for `ValidationFailed` and `PaymentFailed`.
pub struct CancellationWorker {
    bus: Arc<dyn EventBus>,
    repository: Arc<dyn OrderRepository>,
}

impl CancellationWorker {
    /// Build the worker.
    #[must_use]
    pub const fn new(bus: Arc<dyn EventBus>, repository: Arc<dyn OrderRepository>) -> Self {
        Self { bus, repository }
    }

    async fn process(&self, event: Event) -> Result<(), WorkerError> {
        let event_type = event.event_type();
        let correlation_id = event.correlation_id;
        let (order_id, reason) = match event.payload {
            EventPayload::ValidationFailed { order_id, reason }
            | EventPayload::PaymentFailed { order_id, reason } => (order_id, reason),
            _ => return Err(WorkerError::UnexpectedEvent(event_type)),
        };

        let mut order = self.repository.find_by_id(order_id).await?;
        order.cancel()?;
        self.repository.save(&order).await?;

        self.bus
            .publish(
                Event::new(EventPayload::OrderCancelled {
                    order_id: order.id,
                    reason,
                })
                .with_correlation(correlation_id),
            )
            .await?;
        Ok(())
    }
}

impl Subscriber for CancellationWorker {
    fn name(&self) -> &'static str {
        "cancellation"
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
