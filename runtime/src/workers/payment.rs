//! Payment worker: charges a validated order.
//!
//! The order is persisted as `payment_pending` *before* the external payment
//! call so a crash mid-payment leaves a recoverable state. The call itself
//! runs under this worker's dedicated circuit breaker.

use crate::config::WorkerConfig;
use crate::resilience::{CircuitBreaker, with_resilience};
use crate::workers::EventLog;
use chrono::Utc;
use orderflow_core::bus::{EventBus, Subscriber};
use orderflow_core::event::{Event, EventPayload};
use orderflow_core::order::Order;
use orderflow_core::repository::OrderRepository;
use orderflow_core::services::{PaymentService, ServiceError};
use orderflow_core::worker::WorkerError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::Instrument;
use uuid::Uuid;

/// Subscriber for `OrderValidated`.
pub struct PaymentWorker {
    config: WorkerConfig,
    breaker: CircuitBreaker,
    bus: Arc<dyn EventBus>,
    repository: Arc<dyn OrderRepository>,
    payment: Arc<dyn PaymentService>,
}

impl PaymentWorker {
    /// Build the worker with its own breaker from `config`.
    #[must_use]
    pub fn new(
        config: WorkerConfig,
        bus: Arc<dyn EventBus>,
        repository: Arc<dyn OrderRepository>,
        payment: Arc<dyn PaymentService>,
    ) -> Self {
        let breaker = CircuitBreaker::new(config.circuit_breaker.clone());
        Self {
            config,
            breaker,
            bus,
            repository,
            payment,
        }
    }

    async fn process(&self, event: Event) -> Result<(), WorkerError> {
        let event_type = event.event_type();
        let correlation_id = event.correlation_id;
        let EventPayload::OrderValidated { order_id } = event.payload else {
            return Err(WorkerError::UnexpectedEvent(event_type));
        };

        timeout(
            self.config.external_service_timeout,
            self.run(order_id, correlation_id),
        )
        .await
        .map_err(|_| WorkerError::Cancelled)?
    }

    async fn run(&self, order_id: Uuid, correlation_id: Option<Uuid>) -> Result<(), WorkerError> {
        let mut order = self.repository.find_by_id(order_id).await?;

        order.mark_payment_pending()?;
        self.repository.save(&order).await?;

        let charge = {
            let payment = Arc::clone(&self.payment);
            let order = order.clone();
            move || {
                let payment = Arc::clone(&payment);
                let order = order.clone();
                async move { payment.process_payment(&order).await }
            }
        };

        let outcome = with_resilience(
            &self.breaker,
            &self.config.retry,
            ServiceError::is_retryable,
            charge,
        )
        .await;

        match outcome {
            Ok(()) => self.handle_success(&mut order, correlation_id).await,
            Err(err) => {
                self.handle_failure(&mut order, err.to_string(), correlation_id)
                    .await
            }
        }
    }

    async fn handle_success(
        &self,
        order: &mut Order,
        correlation_id: Option<Uuid>,
    ) -> Result<(), WorkerError> {
        order.mark_paid()?;
        self.repository.save(order).await?;
        self.bus
            .publish(
                Event::new(EventPayload::PaymentSucceeded {
                    order_id: order.id,
                    payment_id: Uuid::new_v4(),
                    amount: order.amount,
                    processed_at: Utc::now(),
                })
                .with_correlation(correlation_id),
            )
            .await?;
        Ok(())
    }

    async fn handle_failure(
        &self,
        order: &mut Order,
        reason: String,
        correlation_id: Option<Uuid>,
    ) -> Result<(), WorkerError> {
        tracing::warn!(order_id = %order.id, reason = %reason, "payment failed");
        order.mark_payment_failed()?;
        self.repository.save(order).await?;
        self.bus
            .publish(
                Event::new(EventPayload::PaymentFailed {
                    order_id: order.id,
                    reason,
                })
                .with_correlation(correlation_id),
            )
            .await?;
        Ok(())
    }
}

impl Subscriber for PaymentWorker {
    fn name(&self) -> &'static str {
        "payment"
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
