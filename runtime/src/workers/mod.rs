//! Stage workers advancing the order saga.
//!
//! Each worker subscribes to one or two event types, loads the order the
//! event refers to, calls its collaborators under the resilience layer,
//! advances the state machine, persists and publishes the next event:
//!
//! | Worker | Consumes | Emits |
//! |--------|----------|-------|
//! | [`ValidationWorker`] | `OrderCreated` | `OrderValidated` / `ValidationFailed` |
//! | [`PaymentWorker`] | `OrderValidated` | `PaymentSucceeded` / `PaymentFailed` |
//! | [`CancellationWorker`] | `ValidationFailed`, `PaymentFailed` | `OrderCancelled` |
//! | [`ConfirmationWorker`] | `PaymentSucceeded` | `OrderConfirmed` |

mod cancellation;
mod confirmation;
mod payment;
mod validation;

pub use cancellation::CancellationWorker;
pub use confirmation::ConfirmationWorker;
pub use payment::PaymentWorker;
pub use validation::{ValidationServices, ValidationWorker};

use orderflow_core::event::Event;
use std::time::Instant;
use tracing::Span;

/// Per-event log context: a span carrying the event coordinates plus the
/// start instant for duration fields on the completion log line.
pub(crate) struct EventLog {
    span: Span,
    started: Instant,
}

impl EventLog {
    /// Open the span and emit the start line.
    pub(crate) fn start(worker: &'static str, event: &Event) -> Self {
        let span = tracing::info_span!(
            "handle_event",
            worker,
            event_type = %event.event_type(),
            event_id = %event.id,
            order_id = %event.order_id(),
            correlation_id = tracing::field::Empty,
        );
        if let Some(correlation_id) = event.correlation_id {
            span.record("correlation_id", tracing::field::display(correlation_id));
        }
        span.in_scope(|| tracing::info!("processing event"));
        Self {
            span,
            started: Instant::now(),
        }
    }

    pub(crate) fn span(&self) -> Span {
        self.span.clone()
    }

    pub(crate) fn success(&self) {
        let duration_ms = self.elapsed_ms();
        self.span
            .in_scope(|| tracing::info!(duration_ms, "event processed"));
    }

    pub(crate) fn failure(&self, err: &dyn std::fmt::Display) {
        let duration_ms = self.elapsed_ms();
        self.span
            .in_scope(|| tracing::error!(duration_ms, error = %err, "event processing failed"));
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}
