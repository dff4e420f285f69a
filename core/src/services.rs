//! Contracts of the external collaborator services.
//!
//! The saga core consumes four collaborators: warehouse, anti-fraud, user and
//! payment. They are specified here only at their interface; production
//! deployments plug in real clients, tests plug in controllable fakes.
//!
//! Every method returns [`ServiceError`] on failure. The error's
//! classification drives the retry layer: timeout-like and cancellation
//! errors are worth retrying, everything else short-circuits.

use crate::order::Order;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use uuid::Uuid;

/// Failure of an external collaborator call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The call was cancelled or its deadline expired.
    #[error("call cancelled or deadline exceeded")]
    Cancelled,

    /// Transport-layer timeout talking to the collaborator.
    #[error("transport timeout: {0}")]
    Timeout(String),

    /// The collaborator could not be reached for a non-timeout reason.
    #[error("{0}")]
    Unavailable(String),

    /// The collaborator answered with a business failure.
    #[error("{0}")]
    Rejected(String),
}

impl ServiceError {
    /// Whether the retry layer should attempt the call again.
    ///
    /// Mirrors the transport-level classification: deadline/cancellation and
    /// timeout-like errors are transient; unavailability and business
    /// rejections are not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Timeout(_))
    }
}

/// Result of the anti-fraud whole-order check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCheck {
    /// Whether the order passed the check.
    pub passed: bool,
    /// Structured reason when the check did not pass.
    pub reason: Option<String>,
}

impl OrderCheck {
    /// A passing check.
    #[must_use]
    pub const fn passed() -> Self {
        Self {
            passed: true,
            reason: None,
        }
    }

    /// A failing check with the given reason.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Stock availability checks.
pub trait WarehouseService: Send + Sync {
    /// Whether `amount` units of `product_id` are in stock.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the warehouse cannot answer.
    fn check_product_availability(
        &self,
        product_id: Uuid,
        amount: i64,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ServiceError>> + Send + '_>>;
}

/// Fraud screening checks.
pub trait AntiFraudService: Send + Sync {
    /// Whether the user is within their credit limit.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the screen cannot be performed.
    fn check_user_credit_limit(
        &self,
        user_id: Uuid,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ServiceError>> + Send + '_>>;

    /// Screen the whole order; a failing check carries a structured reason.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the screen cannot be performed.
    fn check_order<'a>(
        &'a self,
        order: &'a Order,
    ) -> Pin<Box<dyn Future<Output = Result<OrderCheck, ServiceError>> + Send + 'a>>;
}

/// User account checks.
pub trait UserService: Send + Sync {
    /// Whether the user account is active.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the lookup fails.
    fn check_user_status(
        &self,
        user_id: Uuid,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ServiceError>> + Send + '_>>;
}

/// Payment processing.
pub trait PaymentService: Send + Sync {
    /// Charge the order; `Ok(())` means the payment settled.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Rejected`] on a declined charge, or a
    /// transport-level variant when the gateway cannot be reached.
    fn process_payment<'a>(
        &'a self,
        order: &'a Order,
    ) -> Pin<Box<dyn Future<Output = Result<(), ServiceError>> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(ServiceError::Cancelled.is_retryable());
        assert!(ServiceError::Timeout("connect timeout".to_string()).is_retryable());
        assert!(!ServiceError::Unavailable("service down".to_string()).is_retryable());
        assert!(!ServiceError::Rejected("insufficient funds".to_string()).is_retryable());
    }
}
