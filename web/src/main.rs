//! Orderflow service binary.
//!
//! Wires the saga engine together: Postgres repository, in-memory event bus,
//! the four stage workers (against simulated collaborators), the create-order
//! use case and the Axum ingress. Shuts down on SIGINT/SIGTERM: cancel the
//! worker-root token, drain the HTTP server under a deadline, then close the
//! bus and wait for in-flight dispatches.

use anyhow::Context;
use orderflow_core::bus::{EventBus, Subscriber};
use orderflow_core::event::EventType;
use orderflow_core::repository::OrderRepository;
use orderflow_postgres::{PostgresConfig, PostgresOrderRepository};
use orderflow_runtime::workers::{
    CancellationWorker, ConfirmationWorker, PaymentWorker, ValidationServices, ValidationWorker,
};
use orderflow_runtime::{CreateOrder, InMemoryBus, WorkerConfig};
use orderflow_testing::{
    SimulatedAntiFraud, SimulatedPayment, SimulatedUser, SimulatedWarehouse,
};
use orderflow_web::{AppState, ServerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let server_cfg = ServerConfig::from_env()?;
    init_tracing(server_cfg.dev_logging);

    let worker_cfg = WorkerConfig::from_env()?;
    let pg_cfg = PostgresConfig::from_env()?;

    let pool = orderflow_postgres::connect(&pg_cfg)
        .await
        .context("failed to connect to postgres")?;
    orderflow_postgres::ensure_schema(&pool)
        .await
        .context("failed to prepare the orders table")?;

    let repository: Arc<dyn OrderRepository> = Arc::new(PostgresOrderRepository::new(pool));
    let bus = Arc::new(InMemoryBus::new());
    let event_bus: Arc<dyn EventBus> = bus.clone();

    let validation = Arc::new(ValidationWorker::new(
        worker_cfg.clone(),
        Arc::clone(&event_bus),
        Arc::clone(&repository),
        ValidationServices {
            warehouse: Arc::new(SimulatedWarehouse::default()),
            anti_fraud: Arc::new(SimulatedAntiFraud::default()),
            user: Arc::new(SimulatedUser::default()),
        },
    ));
    let payment = Arc::new(PaymentWorker::new(
        worker_cfg,
        Arc::clone(&event_bus),
        Arc::clone(&repository),
        Arc::new(SimulatedPayment::default()),
    ));
    let cancellation = Arc::new(CancellationWorker::new(
        Arc::clone(&event_bus),
        Arc::clone(&repository),
    ));
    let confirmation = Arc::new(ConfirmationWorker::new(
        Arc::clone(&event_bus),
        Arc::clone(&repository),
    ));

    bus.subscribe(EventType::OrderCreated, validation)?;
    bus.subscribe(EventType::OrderValidated, payment)?;
    bus.subscribe(
        EventType::ValidationFailed,
        Arc::clone(&cancellation) as Arc<dyn Subscriber>,
    )?;
    bus.subscribe(EventType::PaymentFailed, cancellation)?;
    bus.subscribe(EventType::PaymentSucceeded, confirmation)?;
    tracing::info!("all workers subscribed");

    let create_order = Arc::new(CreateOrder::new(
        Arc::clone(&repository),
        Arc::clone(&event_bus),
    ));
    let app = orderflow_web::server::router(AppState::new(create_order));

    let shutdown = CancellationToken::new();
    let server = tokio::spawn(orderflow_web::server::serve(
        app,
        server_cfg.port,
        shutdown.clone(),
    ));

    wait_for_signal().await;
    tracing::info!("shutdown signal received");
    shutdown.cancel();

    match tokio::time::timeout(SHUTDOWN_DEADLINE, server).await {
        Ok(join_result) => join_result.context("http server task failed")??,
        Err(_) => tracing::warn!("http server did not drain within the shutdown deadline"),
    }

    bus.close().await;
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for sigterm");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

fn init_tracing(dev: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if dev {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .pretty()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    }
}
