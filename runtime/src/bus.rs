//! In-memory event bus with bounded intake and graceful close.
//!
//! A single dispatcher task drains a bounded intake channel. For every event
//! it snapshots the subscriber list for the event's type under a short read
//! lock and spawns one task per subscriber, each bounded by a per-event
//! deadline. Publishers therefore observe backpressure by waiting on the
//! intake channel rather than by rejection.
//!
//! Subscriber errors and timeouts are logged and swallowed: there is no
//! redelivery and no dead-letter queue. On process crash, in-flight events
//! are lost; durable brokering is out of scope for this transport.
//!
//! [`InMemoryBus::close`] flips the closed flag, stops the dispatcher and
//! waits for every in-flight subscriber task before returning. Close is
//! idempotent.

use orderflow_core::bus::{BusError, EventBus, Subscriber};
use orderflow_core::event::{Event, EventType};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

/// Deadline granted to each subscriber invocation.
const HANDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Capacity of the intake channel. One slot keeps publishers close to the
/// dispatcher: a publisher parks as soon as the dispatcher falls behind.
const INTAKE_CAPACITY: usize = 1;

type SubscriberMap = HashMap<EventType, Vec<Arc<dyn Subscriber>>>;

/// In-process publish/subscribe transport keyed by [`EventType`].
pub struct InMemoryBus {
    subscribers: Arc<RwLock<SubscriberMap>>,
    intake: mpsc::Sender<Event>,
    closed: AtomicBool,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl InMemoryBus {
    /// Create a bus and start its dispatcher task.
    #[must_use]
    pub fn new() -> Self {
        let (intake, rx) = mpsc::channel(INTAKE_CAPACITY);
        let subscribers: Arc<RwLock<SubscriberMap>> = Arc::new(RwLock::new(HashMap::new()));
        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();

        let _dispatcher = tracker.spawn(dispatcher(
            rx,
            Arc::clone(&subscribers),
            tracker.clone(),
            shutdown.clone(),
        ));

        Self {
            subscribers,
            intake,
            closed: AtomicBool::new(false),
            shutdown,
            tracker,
        }
    }

    /// Close the bus: stop accepting events, stop the dispatcher and wait
    /// for the dispatcher plus every in-flight subscriber task to finish.
    ///
    /// Subsequent calls return immediately.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("closing event bus");
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        tracing::info!("event bus closed");
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for InMemoryBus {
    fn publish(
        &self,
        event: Event,
    ) -> Pin<Box<dyn Future<Output = Result<(), BusError>> + Send + '_>> {
        Box::pin(async move {
            if self.closed.load(Ordering::SeqCst) {
                return Err(BusError::Closed);
            }
            // Shutdown first: an event must never be accepted after the bus
            // has started closing, or it would be silently dropped.
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => Err(BusError::Closed),
                sent = self.intake.send(event) => sent.map_err(|_| BusError::Closed),
            }
        })
    }

    fn subscribe(
        &self,
        event_type: EventType,
        subscriber: Arc<dyn Subscriber>,
    ) -> Result<(), BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        let mut map = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        map.entry(event_type).or_default().push(subscriber);
        Ok(())
    }
}

/// Drain the intake channel until shutdown, fanning each event out to its
/// subscribers on fresh tasks.
async fn dispatcher(
    mut intake: mpsc::Receiver<Event>,
    subscribers: Arc<RwLock<SubscriberMap>>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
) {
    loop {
        // Biased towards the intake: an event the bus already accepted is
        // dispatched even when shutdown has been signalled in the meantime.
        tokio::select! {
            biased;
            received = intake.recv() => {
                let Some(event) = received else { break };
                dispatch(&subscribers, &tracker, event);
            }
            () = shutdown.cancelled() => break,
        }
    }
    tracing::debug!("event bus dispatcher stopped");
}

fn dispatch(subscribers: &Arc<RwLock<SubscriberMap>>, tracker: &TaskTracker, event: Event) {
    // Short-held read lock: snapshot the list, then release before spawning.
    let snapshot: Vec<Arc<dyn Subscriber>> = {
        let map = subscribers.read().unwrap_or_else(PoisonError::into_inner);
        map.get(&event.event_type()).cloned().unwrap_or_default()
    };

    for subscriber in snapshot {
        let event = event.clone();
        let span = tracing::info_span!(
            "dispatch_event",
            subscriber = subscriber.name(),
            event_type = %event.event_type(),
            event_id = %event.id,
            order_id = %event.order_id(),
        );
        let _handler = tracker.spawn(
            async move {
                match timeout(HANDLE_TIMEOUT, subscriber.handle(event)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        tracing::error!(error = %err, "subscriber failed to handle event");
                    }
                    Err(_) => {
                        tracing::error!(
                            timeout_s = HANDLE_TIMEOUT.as_secs(),
                            "subscriber exceeded the per-event deadline"
                        );
                    }
                }
            }
            .instrument(span),
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use orderflow_core::event::EventPayload;
    use orderflow_core::worker::WorkerError;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct Recording {
        order_ids: Mutex<Vec<Uuid>>,
        delay: Duration,
    }

    impl Recording {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                order_ids: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                order_ids: Mutex::new(Vec::new()),
                delay,
            })
        }

        fn seen(&self) -> Vec<Uuid> {
            self.order_ids.lock().unwrap().clone()
        }
    }

    impl Subscriber for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn handle(
            &self,
            event: Event,
        ) -> Pin<Box<dyn Future<Output = Result<(), WorkerError>> + Send + '_>> {
            Box::pin(async move {
                if self.delay > Duration::ZERO {
                    tokio::time::sleep(self.delay).await;
                }
                self.order_ids.lock().unwrap().push(event.order_id());
                Ok(())
            })
        }
    }

    fn validated(order_id: Uuid) -> Event {
        Event::new(EventPayload::OrderValidated { order_id })
    }

    #[tokio::test]
    async fn delivers_to_matching_subscribers_only() {
        let bus = InMemoryBus::new();
        let on_validated = Recording::new();
        let on_confirmed = Recording::new();
        bus.subscribe(EventType::OrderValidated, on_validated.clone())
            .unwrap();
        bus.subscribe(EventType::OrderConfirmed, on_confirmed.clone())
            .unwrap();

        let order_id = Uuid::new_v4();
        bus.publish(validated(order_id)).await.unwrap();
        bus.close().await;

        assert_eq!(on_validated.seen(), vec![order_id]);
        assert!(on_confirmed.seen().is_empty());
    }

    #[tokio::test]
    async fn delivers_every_published_event() {
        let bus = InMemoryBus::new();
        let recorder = Recording::new();
        bus.subscribe(EventType::OrderValidated, recorder.clone())
            .unwrap();

        let ids: Vec<Uuid> = (0..16).map(|_| Uuid::new_v4()).collect();
        for &id in &ids {
            bus.publish(validated(id)).await.unwrap();
        }
        bus.close().await;

        // Handlers run concurrently, so completion order is not asserted.
        let mut seen = recorder.seen();
        seen.sort_unstable();
        let mut expected = ids;
        expected.sort_unstable();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn close_waits_for_in_flight_handlers() {
        let bus = InMemoryBus::new();
        let recorder = Recording::slow(Duration::from_millis(50));
        bus.subscribe(EventType::OrderValidated, recorder.clone())
            .unwrap();

        let order_id = Uuid::new_v4();
        bus.publish(validated(order_id)).await.unwrap();
        // An accepted event is dispatched even when close follows at once,
        // and close waits for the slow handler to finish.
        bus.close().await;

        assert_eq!(recorder.seen(), vec![order_id]);
    }

    #[tokio::test]
    async fn publish_after_close_fails() {
        let bus = InMemoryBus::new();
        bus.close().await;
        let result = bus.publish(validated(Uuid::new_v4())).await;
        assert_eq!(result, Err(BusError::Closed));
    }

    #[tokio::test]
    async fn subscribe_after_close_fails() {
        let bus = InMemoryBus::new();
        bus.close().await;
        let result = bus.subscribe(EventType::OrderValidated, Recording::new());
        assert_eq!(result, Err(BusError::Closed));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let bus = InMemoryBus::new();
        bus.close().await;
        bus.close().await;
    }

    #[tokio::test]
    async fn handler_errors_are_swallowed() {
        struct Failing;
        impl Subscriber for Failing {
            fn name(&self) -> &'static str {
                "failing"
            }
            fn handle(
                &self,
                event: Event,
            ) -> Pin<Box<dyn Future<Output = Result<(), WorkerError>> + Send + '_>> {
                Box::pin(async move {
                    Err(WorkerError::UnexpectedEvent(event.event_type()))
                })
            }
        }

        let bus = InMemoryBus::new();
        let recorder = Recording::new();
        bus.subscribe(EventType::OrderValidated, Arc::new(Failing))
            .unwrap();
        bus.subscribe(EventType::OrderValidated, recorder.clone())
            .unwrap();

        let order_id = Uuid::new_v4();
        bus.publish(validated(order_id)).await.unwrap();
        bus.close().await;

        // The failing subscriber does not affect its peers.
        assert_eq!(recorder.seen(), vec![order_id]);
    }
}
