//! The order aggregate and its status state machine.
//!
//! An [`Order`] is the aggregate under orchestration. It is created by the
//! ingress use case, advanced exclusively through the transition methods
//! below, and persisted after every mutation. The transition methods are pure
//! in-memory operations; persistence is a separate concern.
//!
//! # State machine
//!
//! ```text
//! created ──► validated ──► payment_pending ──► paid ──► confirmed
//!    │             │               │
//!    │             │               ├──► payment_failed ──► cancelled
//!    │             └──► cancelled  │
//!    ├──► validation_failed ──► cancelled
//!    └──► cancelled
//! ```
//!
//! Any transition outside this graph fails with
//! [`OrderError::InvalidTransition`]. Concurrent events for the same order are
//! serialized by exactly this refusal: a worker that observes an order in an
//! incompatible state fails loudly instead of silently misadvancing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the order aggregate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// The order amount must be strictly positive.
    #[error("order amount must be greater than zero")]
    InvalidAmount,

    /// The requested status transition is not permitted from the current
    /// status.
    #[error("invalid status transition from '{from}' to '{to}'")]
    InvalidTransition {
        /// Status the order was in.
        from: OrderStatus,
        /// Status that was requested.
        to: OrderStatus,
    },
}

/// Lifecycle status of an order.
///
/// The wire representation (database column, log fields) uses the
/// human-readable forms produced by [`fmt::Display`], e.g.
/// `"validation failed"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order accepted by the ingress, not yet validated.
    Created,
    /// All validation checks passed.
    Validated,
    /// At least one validation check failed.
    ValidationFailed,
    /// Payment has been initiated but not yet settled.
    PaymentPending,
    /// Payment settled successfully.
    Paid,
    /// Payment was rejected.
    PaymentFailed,
    /// Saga terminated on the failure path.
    Cancelled,
    /// Saga terminated successfully.
    Confirmed,
}

impl OrderStatus {
    /// String form used in the database and in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Validated => "validated",
            Self::ValidationFailed => "validation failed",
            Self::PaymentPending => "payment pending",
            Self::Paid => "paid",
            Self::PaymentFailed => "payment failed",
            Self::Cancelled => "cancelled",
            Self::Confirmed => "confirmed",
        }
    }

    /// Parse the database string form back into a status.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Self::Created),
            "validated" => Some(Self::Validated),
            "validation failed" => Some(Self::ValidationFailed),
            "payment pending" => Some(Self::PaymentPending),
            "paid" => Some(Self::Paid),
            "payment failed" => Some(Self::PaymentFailed),
            "cancelled" => Some(Self::Cancelled),
            "confirmed" => Some(Self::Confirmed),
            _ => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The order aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier.
    pub id: Uuid,
    /// User who placed the order.
    pub user_id: Uuid,
    /// Product being ordered.
    pub product_id: Uuid,
    /// Order amount; always strictly positive.
    pub amount: i64,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// When the order was created.
    pub created_at: DateTime<Utc>,
    /// When the order was last mutated.
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a fresh order in the `created` status.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidAmount`] when `amount <= 0`.
    pub fn new(user_id: Uuid, product_id: Uuid, amount: i64) -> Result<Self, OrderError> {
        if amount <= 0 {
            return Err(OrderError::InvalidAmount);
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            product_id,
            amount,
            status: OrderStatus::Created,
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether the state machine permits a transition to `target`.
    #[must_use]
    pub const fn can_transition_to(&self, target: OrderStatus) -> bool {
        use OrderStatus::{
            Cancelled, Confirmed, Created, Paid, PaymentFailed, PaymentPending, Validated,
            ValidationFailed,
        };

        match target {
            Validated | ValidationFailed => matches!(self.status, Created),
            PaymentPending => matches!(self.status, Validated),
            Paid | PaymentFailed => matches!(self.status, PaymentPending),
            Confirmed => matches!(self.status, Paid),
            Cancelled => matches!(
                self.status,
                Created | Validated | PaymentPending | ValidationFailed | PaymentFailed
            ),
            Created => false,
        }
    }

    /// `created` → `validated`.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidTransition`] from any other status.
    pub fn mark_validated(&mut self) -> Result<(), OrderError> {
        self.transition_to(OrderStatus::Validated)
    }

    /// `created` → `validation_failed`.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidTransition`] from any other status.
    pub fn mark_validation_failed(&mut self) -> Result<(), OrderError> {
        self.transition_to(OrderStatus::ValidationFailed)
    }

    /// `validated` → `payment_pending`.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidTransition`] from any other status.
    pub fn mark_payment_pending(&mut self) -> Result<(), OrderError> {
        self.transition_to(OrderStatus::PaymentPending)
    }

    /// `payment_pending` → `paid`.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidTransition`] from any other status.
    pub fn mark_paid(&mut self) -> Result<(), OrderError> {
        self.transition_to(OrderStatus::Paid)
    }

    /// `payment_pending` → `payment_failed`.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidTransition`] from any other status.
    pub fn mark_payment_failed(&mut self) -> Result<(), OrderError> {
        self.transition_to(OrderStatus::PaymentFailed)
    }

    /// `paid` → `confirmed`.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidTransition`] from any other status.
    pub fn mark_confirmed(&mut self) -> Result<(), OrderError> {
        self.transition_to(OrderStatus::Confirmed)
    }

    /// Cancel the order.
    ///
    /// Legal from `created`, `validated`, `payment_pending`,
    /// `validation_failed` and `payment_failed`; terminal states refuse.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidTransition`] from `paid`, `confirmed` or
    /// `cancelled`.
    pub fn cancel(&mut self) -> Result<(), OrderError> {
        self.transition_to(OrderStatus::Cancelled)
    }

    fn transition_to(&mut self, target: OrderStatus) -> Result<(), OrderError> {
        if !self.can_transition_to(target) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }
}
