//! Validation worker: fan-out of four independent checks with first-failure
//! short-circuit.
//!
//! On `OrderCreated` the worker launches the warehouse, anti-fraud (credit
//! limit and whole-order) and user checks concurrently, each wrapped in the
//! shared resilience layer. Results are read as they arrive; the first
//! failing check decides the outcome and cancels the stragglers. All four
//! checks share one circuit breaker, so a quorum of collaborator failures
//! opens the circuit for subsequent validations as a whole.
//!
//! On failure the worker publishes `ValidationFailed` and leaves the order in
//! `created`; the cancellation worker performs the state change downstream.

use crate::config::WorkerConfig;
use crate::resilience::{CircuitBreaker, CircuitBreakerError, RetryConfig, with_resilience};
use crate::workers::EventLog;
use orderflow_core::bus::{EventBus, Subscriber};
use orderflow_core::event::{Event, EventPayload};
use orderflow_core::order::Order;
use orderflow_core::repository::OrderRepository;
use orderflow_core::services::{AntiFraudService, ServiceError, UserService, WarehouseService};
use orderflow_core::worker::WorkerError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

const CHECK_COUNT: usize = 4;

/// The collaborators consulted during validation.
#[derive(Clone)]
pub struct ValidationServices {
    /// Stock availability.
    pub warehouse: Arc<dyn WarehouseService>,
    /// Fraud screening.
    pub anti_fraud: Arc<dyn AntiFraudService>,
    /// User account status.
    pub user: Arc<dyn UserService>,
}

/// Outcome of one validation check.
struct CheckOutcome {
    name: &'static str,
    passed: bool,
    detail: Option<String>,
    error: Option<CircuitBreakerError<ServiceError>>,
}

impl CheckOutcome {
    fn passing(name: &'static str) -> Self {
        Self {
            name,
            passed: true,
            detail: None,
            error: None,
        }
    }

    fn from_flag(name: &'static str, result: Result<bool, CircuitBreakerError<ServiceError>>) -> Self {
        match result {
            Ok(passed) => Self {
                name,
                passed,
                detail: None,
                error: None,
            },
            Err(error) => Self {
                name,
                passed: false,
                detail: None,
                error: Some(error),
            },
        }
    }

    /// `None` when the check passed, otherwise the reason to report.
    fn failure_reason(&self) -> Option<String> {
        if self.error.is_none() && self.passed {
            return None;
        }
        let reason = match (&self.error, &self.detail) {
            (Some(error), _) => format!("{}: {error}", self.name),
            (None, Some(detail)) => format!("{}: {detail}", self.name),
            (None, None) => format!("{} failed", self.name),
        };
        Some(reason)
    }
}

/// Subscriber for `OrderCreated`; runs the parallel validation protocol.
pub struct ValidationWorker {
    config: WorkerConfig,
    breaker: Arc<CircuitBreaker>,
    bus: Arc<dyn EventBus>,
    repository: Arc<dyn OrderRepository>,
    services: ValidationServices,
}

impl ValidationWorker {
    /// Build the worker; the breaker is created from `config` and shared by
    /// all four checks.
    #[must_use]
    pub fn new(
        config: WorkerConfig,
        bus: Arc<dyn EventBus>,
        repository: Arc<dyn OrderRepository>,
        services: ValidationServices,
    ) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(config.circuit_breaker.clone()));
        Self {
            config,
            breaker,
            bus,
            repository,
            services,
        }
    }

    /// The breaker shared by this worker's checks (exposed for observation).
    #[must_use]
    pub fn breaker(&self) -> Arc<CircuitBreaker> {
        Arc::clone(&self.breaker)
    }

    async fn process(&self, event: Event) -> Result<(), WorkerError> {
        let event_type = event.event_type();
        let correlation_id = event.correlation_id;
        let EventPayload::OrderCreated { order_id, .. } = event.payload else {
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

        match self.validate(&order).await {
            None => self.handle_success(&mut order, correlation_id).await,
            Some(reason) => self.handle_failure(&order, reason, correlation_id).await,
        }
    }

    /// Run the four checks concurrently. Returns `None` when every check
    /// passed, or the first failure reason otherwise. On the first failure
    /// the remaining checks are cancelled and their results discarded.
    async fn validate(&self, order: &Order) -> Option<String> {
        let stop = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel::<CheckOutcome>(CHECK_COUNT);

        self.spawn_warehouse_check(order, &stop, &tx);
        self.spawn_credit_limit_check(order, &stop, &tx);
        self.spawn_order_check(order, &stop, &tx);
        self.spawn_user_check(order, &stop, &tx);
        drop(tx);

        let mut remaining = CHECK_COUNT;
        while let Some(outcome) = rx.recv().await {
            if let Some(reason) = outcome.failure_reason() {
                stop.cancel();
                return Some(reason);
            }
            remaining -= 1;
            if remaining == 0 {
                break;
            }
        }
        None
    }

    fn spawn_warehouse_check(
        &self,
        order: &Order,
        stop: &CancellationToken,
        tx: &mpsc::Sender<CheckOutcome>,
    ) {
        let warehouse = Arc::clone(&self.services.warehouse);
        let product_id = order.product_id;
        let amount = order.amount;
        self.spawn_check("warehouse availability check", stop, tx, move |name, guard| {
            let result = guard.run(move || {
                let warehouse = Arc::clone(&warehouse);
                async move { warehouse.check_product_availability(product_id, amount).await }
            });
            async move { CheckOutcome::from_flag(name, result.await) }
        });
    }

    fn spawn_credit_limit_check(
        &self,
        order: &Order,
        stop: &CancellationToken,
        tx: &mpsc::Sender<CheckOutcome>,
    ) {
        let anti_fraud = Arc::clone(&self.services.anti_fraud);
        let user_id = order.user_id;
        self.spawn_check("anti-fraud credit limit check", stop, tx, move |name, guard| {
            let result = guard.run(move || {
                let anti_fraud = Arc::clone(&anti_fraud);
                async move { anti_fraud.check_user_credit_limit(user_id).await }
            });
            async move { CheckOutcome::from_flag(name, result.await) }
        });
    }

    fn spawn_order_check(
        &self,
        order: &Order,
        stop: &CancellationToken,
        tx: &mpsc::Sender<CheckOutcome>,
    ) {
        let anti_fraud = Arc::clone(&self.services.anti_fraud);
        let order = order.clone();
        self.spawn_check("anti-fraud order check", stop, tx, move |name, guard| {
            let result = guard.run(move || {
                let anti_fraud = Arc::clone(&anti_fraud);
                let order = order.clone();
                async move { anti_fraud.check_order(&order).await }
            });
            async move {
                match result.await {
                    Ok(check) if check.passed => CheckOutcome::passing(name),
                    Ok(check) => CheckOutcome {
                        name,
                        passed: false,
                        detail: check.reason,
                        error: None,
                    },
                    Err(error) => CheckOutcome {
                        name,
                        passed: false,
                        detail: None,
                        error: Some(error),
                    },
                }
            }
        });
    }

    fn spawn_user_check(
        &self,
        order: &Order,
        stop: &CancellationToken,
        tx: &mpsc::Sender<CheckOutcome>,
    ) {
        let user = Arc::clone(&self.services.user);
        let user_id = order.user_id;
        self.spawn_check("user status check", stop, tx, move |name, guard| {
            let result = guard.run(move || {
                let user = Arc::clone(&user);
                async move { user.check_user_status(user_id).await }
            });
            async move { CheckOutcome::from_flag(name, result.await) }
        });
    }

    /// Spawn one check task: the closure builds the check future from the
    /// resilience guard, and the outcome is reported on the channel. A send
    /// failure means the coordinator already returned; the outcome is
    /// discarded.
    fn spawn_check<B, Fut>(
        &self,
        name: &'static str,
        stop: &CancellationToken,
        tx: &mpsc::Sender<CheckOutcome>,
        build: B,
    ) where
        B: FnOnce(&'static str, CheckGuard) -> Fut + Send + 'static,
        Fut: Future<Output = CheckOutcome> + Send + 'static,
    {
        let guard = CheckGuard {
            breaker: Arc::clone(&self.breaker),
            retry: self.config.retry.clone(),
            stop: stop.clone(),
        };
        let tx = tx.clone();
        tokio::spawn(async move {
            let outcome = build(name, guard).await;
            let _ = tx.send(outcome).await;
        });
    }

    async fn handle_success(
        &self,
        order: &mut Order,
        correlation_id: Option<Uuid>,
    ) -> Result<(), WorkerError> {
        order.mark_validated()?;
        self.repository.save(order).await?;
        self.bus
            .publish(
                Event::new(EventPayload::OrderValidated { order_id: order.id })
                    .with_correlation(correlation_id),
            )
            .await?;
        Ok(())
    }

    async fn handle_failure(
        &self,
        order: &Order,
        reason: String,
        correlation_id: Option<Uuid>,
    ) -> Result<(), WorkerError> {
        tracing::warn!(order_id = %order.id, reason = %reason, "order validation failed");
        self.bus
            .publish(
                Event::new(EventPayload::ValidationFailed {
                    order_id: order.id,
                    reason,
                })
                .with_correlation(correlation_id),
            )
            .await?;
        Ok(())
    }
}

/// Bundle of the per-check resilience pieces handed to a spawned check task.
struct CheckGuard {
    breaker: Arc<CircuitBreaker>,
    retry: RetryConfig,
    stop: CancellationToken,
}

impl CheckGuard {
    /// Run `operation` under retry + breaker, aborting promptly once the
    /// coordinator has observed a failure elsewhere.
    async fn run<F, Fut, T>(self, operation: F) -> Result<T, CircuitBreakerError<ServiceError>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        tokio::select! {
            () = self.stop.cancelled() => Err(CircuitBreakerError::Inner(ServiceError::Cancelled)),
            result = with_resilience(
                &self.breaker,
                &self.retry,
                ServiceError::is_retryable,
                operation,
            ) => result,
        }
    }
}

impl Subscriber for ValidationWorker {
    fn name(&self) -> &'static str {
        "validation"
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
