//! Typed domain events exchanged between saga stages.
//!
//! Each event is an immutable envelope: a freshly generated id, an optional
//! correlation id threaded from the originating request, and a tagged
//! [`EventPayload`] variant. Modelling the payload as a tagged variant makes
//! payload extraction exhaustive: a subscriber pattern-matches and rejects
//! irrelevant variants instead of downcasting an untyped value.
//!
//! Event ids are generated per emission and never reused; re-publishing the
//! "same" logical event produces a distinct envelope.

use crate::order::Order;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Discriminant of an event, used as the subscription key on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// An order was accepted by the ingress.
    OrderCreated,
    /// All validation checks passed.
    OrderValidated,
    /// A validation check failed.
    ValidationFailed,
    /// Payment settled.
    PaymentSucceeded,
    /// Payment was rejected.
    PaymentFailed,
    /// The saga completed successfully.
    OrderConfirmed,
    /// The saga terminated on the failure path.
    OrderCancelled,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OrderCreated => "OrderCreated",
            Self::OrderValidated => "OrderValidated",
            Self::ValidationFailed => "ValidationFailed",
            Self::PaymentSucceeded => "PaymentSucceeded",
            Self::PaymentFailed => "PaymentFailed",
            Self::OrderConfirmed => "OrderConfirmed",
            Self::OrderCancelled => "OrderCancelled",
        };
        f.write_str(name)
    }
}

/// Payload of a domain event, one variant per [`EventType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    /// An order was accepted by the ingress.
    OrderCreated {
        /// The new order.
        order_id: Uuid,
        /// User who placed it.
        user_id: Uuid,
        /// Product ordered.
        product_id: Uuid,
        /// Order amount.
        amount: i64,
    },
    /// All validation checks passed.
    OrderValidated {
        /// The validated order.
        order_id: Uuid,
    },
    /// A validation check failed.
    ValidationFailed {
        /// The order that failed validation.
        order_id: Uuid,
        /// Name of the failing check plus any detail it supplied.
        reason: String,
    },
    /// Payment settled.
    PaymentSucceeded {
        /// The paid order.
        order_id: Uuid,
        /// Fresh identifier of the settled payment.
        payment_id: Uuid,
        /// Amount charged.
        amount: i64,
        /// When the payment settled.
        processed_at: DateTime<Utc>,
    },
    /// Payment was rejected.
    PaymentFailed {
        /// The order whose payment failed.
        order_id: Uuid,
        /// Collaborator-supplied failure message.
        reason: String,
    },
    /// The saga completed successfully.
    OrderConfirmed {
        /// The confirmed order.
        order_id: Uuid,
    },
    /// The saga terminated on the failure path.
    OrderCancelled {
        /// The cancelled order.
        order_id: Uuid,
        /// Reason propagated from the failure event.
        reason: String,
    },
}

impl EventPayload {
    /// The [`EventType`] this payload belongs to.
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        match self {
            Self::OrderCreated { .. } => EventType::OrderCreated,
            Self::OrderValidated { .. } => EventType::OrderValidated,
            Self::ValidationFailed { .. } => EventType::ValidationFailed,
            Self::PaymentSucceeded { .. } => EventType::PaymentSucceeded,
            Self::PaymentFailed { .. } => EventType::PaymentFailed,
            Self::OrderConfirmed { .. } => EventType::OrderConfirmed,
            Self::OrderCancelled { .. } => EventType::OrderCancelled,
        }
    }

    /// The order id every variant carries.
    #[must_use]
    pub const fn order_id(&self) -> Uuid {
        match self {
            Self::OrderCreated { order_id, .. }
            | Self::OrderValidated { order_id }
            | Self::ValidationFailed { order_id, .. }
            | Self::PaymentSucceeded { order_id, .. }
            | Self::PaymentFailed { order_id, .. }
            | Self::OrderConfirmed { order_id }
            | Self::OrderCancelled { order_id, .. } => *order_id,
        }
    }
}

/// An immutable domain event envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique id of this emission.
    pub id: Uuid,
    /// Correlation id of the request that started the saga, when known.
    pub correlation_id: Option<Uuid>,
    /// The typed payload.
    pub payload: EventPayload,
}

impl Event {
    /// Wrap a payload in a fresh envelope.
    #[must_use]
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            correlation_id: None,
            payload,
        }
    }

    /// Attach the correlation id of the originating request.
    #[must_use]
    pub const fn with_correlation(mut self, correlation_id: Option<Uuid>) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    /// Convenience constructor for the `OrderCreated` payload.
    #[must_use]
    pub fn order_created(order: &Order) -> Self {
        Self::new(EventPayload::OrderCreated {
            order_id: order.id,
            user_id: order.user_id,
            product_id: order.product_id,
            amount: order.amount,
        })
    }

    /// The [`EventType`] of this event.
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    /// The order this event refers to.
    #[must_use]
    pub const fn order_id(&self) -> Uuid {
        self.payload.order_id()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[test]
    fn event_ids_are_fresh_per_emission() {
        let a = Event::new(EventPayload::OrderValidated {
            order_id: Uuid::new_v4(),
        });
        let b = Event::new(EventPayload::OrderValidated {
            order_id: a.order_id(),
        });
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn payload_maps_to_event_type() {
        let order_id = Uuid::new_v4();
        let cases = [
            (
                EventPayload::OrderValidated { order_id },
                EventType::OrderValidated,
            ),
            (
                EventPayload::ValidationFailed {
                    order_id,
                    reason: "out of stock".to_string(),
                },
                EventType::ValidationFailed,
            ),
            (
                EventPayload::OrderCancelled {
                    order_id,
                    reason: "out of stock".to_string(),
                },
                EventType::OrderCancelled,
            ),
        ];
        for (payload, expected) in cases {
            assert_eq!(payload.event_type(), expected);
            assert_eq!(payload.order_id(), order_id);
        }
    }

    #[test]
    fn correlation_id_is_carried() {
        let correlation = Uuid::new_v4();
        let event = Event::new(EventPayload::OrderConfirmed {
            order_id: Uuid::new_v4(),
        })
        .with_correlation(Some(correlation));
        assert_eq!(event.correlation_id, Some(correlation));
    }

    #[test]
    fn order_created_copies_order_fields() {
        let order = Order::new(Uuid::new_v4(), Uuid::new_v4(), 42).unwrap();
        let event = Event::order_created(&order);
        match event.payload {
            EventPayload::OrderCreated {
                order_id,
                user_id,
                product_id,
                amount,
            } => {
                assert_eq!(order_id, order.id);
                assert_eq!(user_id, order.user_id);
                assert_eq!(product_id, order.product_id);
                assert_eq!(amount, order.amount);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }
}
