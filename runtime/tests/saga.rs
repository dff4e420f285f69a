//! End-to-end saga scenarios over the in-memory bus with scripted
//! collaborators.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect

use orderflow_core::bus::{EventBus, Subscriber};
use orderflow_core::event::{Event, EventPayload, EventType};
use orderflow_core::order::OrderStatus;
use orderflow_core::services::ServiceError;
use orderflow_runtime::resilience::{CircuitBreakerConfig, RetryConfig};
use orderflow_runtime::workers::{
    CancellationWorker, ConfirmationWorker, PaymentWorker, ValidationServices, ValidationWorker,
};
use orderflow_runtime::{CreateOrder, InMemoryBus, NewOrder, WorkerConfig};
use orderflow_testing::{
    EventRecorder, InMemoryOrderRepository, StubAntiFraud, StubPayment, StubUser, StubWarehouse,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const WAIT: Duration = Duration::from_secs(2);

fn fast_config() -> WorkerConfig {
    WorkerConfig {
        external_service_timeout: Duration::from_secs(2),
        retry: RetryConfig {
            attempts: 3,
            delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        },
        circuit_breaker: CircuitBreakerConfig {
            max_failures: 3,
            open_timeout: Duration::from_secs(30),
        },
    }
}

struct Collaborators {
    warehouse: Arc<StubWarehouse>,
    anti_fraud: Arc<StubAntiFraud>,
    user: Arc<StubUser>,
    payment: Arc<StubPayment>,
}

impl Collaborators {
    fn all_passing() -> Self {
        Self {
            warehouse: Arc::new(StubWarehouse::in_stock()),
            anti_fraud: Arc::new(StubAntiFraud::passing()),
            user: Arc::new(StubUser::active()),
            payment: Arc::new(StubPayment::settling()),
        }
    }

    fn validation_calls(&self) -> usize {
        self.warehouse.script.calls()
            + self.anti_fraud.credit_limit.calls()
            + self.anti_fraud.order_check.calls()
            + self.user.script.calls()
    }
}

struct Harness {
    bus: Arc<InMemoryBus>,
    repository: Arc<InMemoryOrderRepository>,
    recorder: Arc<EventRecorder>,
    create_order: CreateOrder,
}

impl Harness {
    fn start(config: WorkerConfig, collaborators: &Collaborators) -> Self {
        let bus = Arc::new(InMemoryBus::new());
        let event_bus: Arc<dyn EventBus> = bus.clone();
        let repository = Arc::new(InMemoryOrderRepository::new());
        let repo: Arc<dyn orderflow_core::repository::OrderRepository> = repository.clone();

        let validation = Arc::new(ValidationWorker::new(
            config.clone(),
            Arc::clone(&event_bus),
            Arc::clone(&repo),
            ValidationServices {
                warehouse: Arc::clone(&collaborators.warehouse) as _,
                anti_fraud: Arc::clone(&collaborators.anti_fraud) as _,
                user: Arc::clone(&collaborators.user) as _,
            },
        ));
        let payment = Arc::new(PaymentWorker::new(
            config,
            Arc::clone(&event_bus),
            Arc::clone(&repo),
            Arc::clone(&collaborators.payment) as _,
        ));
        let cancellation = Arc::new(CancellationWorker::new(
            Arc::clone(&event_bus),
            Arc::clone(&repo),
        ));
        let confirmation = Arc::new(ConfirmationWorker::new(
            Arc::clone(&event_bus),
            Arc::clone(&repo),
        ));

        bus.subscribe(EventType::OrderCreated, validation).unwrap();
        bus.subscribe(EventType::OrderValidated, payment).unwrap();
        bus.subscribe(
            EventType::ValidationFailed,
            Arc::clone(&cancellation) as Arc<dyn Subscriber>,
        )
        .unwrap();
        bus.subscribe(EventType::PaymentFailed, cancellation)
            .unwrap();
        bus.subscribe(EventType::PaymentSucceeded, confirmation)
            .unwrap();

        let recorder = Arc::new(EventRecorder::new());
        EventRecorder::subscribe_all(&recorder, bus.as_ref()).unwrap();

        let create_order = CreateOrder::new(repo, event_bus);

        Self {
            bus,
            repository,
            recorder,
            create_order,
        }
    }

    async fn place_order(&self, amount: i64) -> Uuid {
        self.create_order
            .execute(
                NewOrder {
                    user_id: Uuid::new_v4(),
                    product_id: Uuid::new_v4(),
                    amount,
                },
                None,
            )
            .await
            .unwrap()
    }

    fn status(&self, order_id: Uuid) -> OrderStatus {
        self.repository.get(order_id).unwrap().status
    }
}

#[tokio::test]
async fn happy_path_ends_confirmed() {
    let collaborators = Collaborators::all_passing();
    let harness = Harness::start(fast_config(), &collaborators);

    let order_id = harness.place_order(100).await;
    harness
        .recorder
        .wait_for(EventType::OrderConfirmed, order_id, WAIT)
        .await
        .expect("saga should confirm the order");

    assert_eq!(harness.status(order_id), OrderStatus::Confirmed);
    assert_eq!(
        harness.recorder.event_types_for(order_id),
        vec![
            EventType::OrderCreated,
            EventType::OrderValidated,
            EventType::PaymentSucceeded,
            EventType::OrderConfirmed,
        ]
    );

    harness.bus.close().await;
}

#[tokio::test]
async fn correlation_id_flows_through_every_stage() {
    let collaborators = Collaborators::all_passing();
    let harness = Harness::start(fast_config(), &collaborators);
    let correlation_id = Uuid::new_v4();

    let order_id = harness
        .create_order
        .execute(
            NewOrder {
                user_id: Uuid::new_v4(),
                product_id: Uuid::new_v4(),
                amount: 100,
            },
            Some(correlation_id),
        )
        .await
        .unwrap();

    let confirmed = harness
        .recorder
        .wait_for(EventType::OrderConfirmed, order_id, WAIT)
        .await
        .expect("saga should confirm the order");
    assert_eq!(confirmed.correlation_id, Some(correlation_id));

    for event in harness.recorder.events_for(order_id) {
        assert_eq!(event.correlation_id, Some(correlation_id));
    }

    harness.bus.close().await;
}

#[tokio::test]
async fn warehouse_failure_cancels_the_order() {
    let collaborators = Collaborators {
        warehouse: Arc::new(StubWarehouse::out_of_stock()),
        ..Collaborators::all_passing()
    };
    let harness = Harness::start(fast_config(), &collaborators);

    let order_id = harness.place_order(100).await;
    let cancelled = harness
        .recorder
        .wait_for(EventType::OrderCancelled, order_id, WAIT)
        .await
        .expect("saga should cancel the order");

    assert_eq!(harness.status(order_id), OrderStatus::Cancelled);

    let EventPayload::OrderCancelled { reason, .. } = cancelled.payload else {
        panic!("expected OrderCancelled payload");
    };
    assert!(
        reason.contains("warehouse availability check"),
        "unexpected reason: {reason}"
    );

    // The failure branch never reaches the payment stage.
    assert_eq!(collaborators.payment.script.calls(), 0);
    let types = harness.recorder.event_types_for(order_id);
    assert!(types.contains(&EventType::ValidationFailed));
    assert!(!types.contains(&EventType::OrderValidated));

    harness.bus.close().await;
}

#[tokio::test]
async fn structured_rejection_reason_is_propagated() {
    let collaborators = Collaborators {
        anti_fraud: Arc::new(StubAntiFraud::rejecting_order("suspicious order amount")),
        ..Collaborators::all_passing()
    };
    let harness = Harness::start(fast_config(), &collaborators);

    let order_id = harness.place_order(50_000).await;
    let cancelled = harness
        .recorder
        .wait_for(EventType::OrderCancelled, order_id, WAIT)
        .await
        .expect("saga should cancel the order");

    let EventPayload::OrderCancelled { reason, .. } = cancelled.payload else {
        panic!("expected OrderCancelled payload");
    };
    assert!(reason.contains("anti-fraud order check"));
    assert!(reason.contains("suspicious order amount"));

    harness.bus.close().await;
}

#[tokio::test]
async fn payment_rejection_cancels_with_the_gateway_reason() {
    let collaborators = Collaborators {
        payment: Arc::new(StubPayment::failing(ServiceError::Rejected(
            "insufficient funds".to_string(),
        ))),
        ..Collaborators::all_passing()
    };
    let harness = Harness::start(fast_config(), &collaborators);

    let order_id = harness.place_order(100).await;
    let cancelled = harness
        .recorder
        .wait_for(EventType::OrderCancelled, order_id, WAIT)
        .await
        .expect("saga should cancel the order");

    assert_eq!(harness.status(order_id), OrderStatus::Cancelled);
    assert_eq!(
        harness.recorder.event_types_for(order_id),
        vec![
            EventType::OrderCreated,
            EventType::OrderValidated,
            EventType::PaymentFailed,
            EventType::OrderCancelled,
        ]
    );

    let EventPayload::OrderCancelled { reason, .. } = cancelled.payload else {
        panic!("expected OrderCancelled payload");
    };
    assert_eq!(reason, "insufficient funds");

    // A business rejection is not retried.
    assert_eq!(collaborators.payment.script.calls(), 1);

    harness.bus.close().await;
}

#[tokio::test]
async fn transient_payment_timeouts_are_retried_to_success() {
    let collaborators = Collaborators::all_passing();
    collaborators
        .payment
        .script
        .push(Err(ServiceError::Timeout("gateway timeout".to_string())));
    collaborators
        .payment
        .script
        .push(Err(ServiceError::Timeout("gateway timeout".to_string())));
    let harness = Harness::start(fast_config(), &collaborators);

    let order_id = harness.place_order(100).await;
    harness
        .recorder
        .wait_for(EventType::OrderConfirmed, order_id, WAIT)
        .await
        .expect("saga should confirm after retries");

    assert_eq!(harness.status(order_id), OrderStatus::Confirmed);
    assert_eq!(collaborators.payment.script.calls(), 3);

    harness.bus.close().await;
}

#[tokio::test]
async fn sustained_validation_failures_open_the_breaker() {
    let down = ServiceError::Unavailable("service is not available".to_string());
    let collaborators = Collaborators {
        warehouse: Arc::new(StubWarehouse::failing(down.clone())),
        anti_fraud: Arc::new(StubAntiFraud::failing(down.clone())),
        user: Arc::new(StubUser::failing(down)),
        payment: Arc::new(StubPayment::settling()),
    };
    let harness = Harness::start(fast_config(), &collaborators);

    // Three consecutive failing validations accumulate breaker failures.
    for _ in 0..3 {
        let order_id = harness.place_order(100).await;
        harness
            .recorder
            .wait_for(EventType::OrderCancelled, order_id, WAIT)
            .await
            .expect("failing validation should cancel the order");
    }

    // Let cancelled straggler checks wind down before snapshotting.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let calls_before = collaborators.validation_calls();

    let order_id = harness.place_order(100).await;
    let cancelled = harness
        .recorder
        .wait_for(EventType::OrderCancelled, order_id, WAIT)
        .await
        .expect("breaker-open validation should cancel the order");

    let EventPayload::OrderCancelled { reason, .. } = cancelled.payload else {
        panic!("expected OrderCancelled payload");
    };
    assert!(
        reason.contains("circuit breaker is open"),
        "unexpected reason: {reason}"
    );
    // No collaborator was consulted for the fourth order.
    assert_eq!(collaborators.validation_calls(), calls_before);

    harness.bus.close().await;
}

#[tokio::test]
async fn invalid_amount_emits_nothing_and_persists_nothing() {
    let collaborators = Collaborators::all_passing();
    let harness = Harness::start(fast_config(), &collaborators);

    let result = harness
        .create_order
        .execute(
            NewOrder {
                user_id: Uuid::new_v4(),
                product_id: Uuid::new_v4(),
                amount: 0,
            },
            None,
        )
        .await;

    assert!(result.is_err());
    assert!(harness.repository.is_empty());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(harness.recorder.events().is_empty());

    harness.bus.close().await;
}

#[tokio::test]
async fn replayed_event_is_refused_by_the_state_machine() {
    let collaborators = Collaborators::all_passing();
    let harness = Harness::start(fast_config(), &collaborators);

    let order_id = harness.place_order(100).await;
    harness
        .recorder
        .wait_for(EventType::OrderConfirmed, order_id, WAIT)
        .await
        .expect("saga should confirm the order");

    // Replaying OrderValidated must not re-enter the payment stage: the
    // confirmed order refuses the payment-pending transition.
    harness
        .bus
        .publish(Event::new(EventPayload::OrderValidated { order_id }))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(harness.status(order_id), OrderStatus::Confirmed);
    let succeeded = harness
        .recorder
        .events_for(order_id)
        .iter()
        .filter(|event| event.event_type() == EventType::PaymentSucceeded)
        .count();
    assert_eq!(succeeded, 1);

    harness.bus.close().await;
}

#[tokio::test]
async fn event_for_unknown_order_is_dropped() {
    let collaborators = Collaborators::all_passing();
    let harness = Harness::start(fast_config(), &collaborators);

    let ghost = Uuid::new_v4();
    harness
        .bus
        .publish(Event::new(EventPayload::OrderCreated {
            order_id: ghost,
            user_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            amount: 10,
        }))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The load failure surfaces as a worker error: no follow-up event.
    let types = harness.recorder.event_types_for(ghost);
    assert_eq!(types, vec![EventType::OrderCreated]);

    harness.bus.close().await;
}
