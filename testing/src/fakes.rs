//! Scripted collaborator fakes with deterministic behaviour.
//!
//! Each stub returns queued responses in order and falls back to a configured
//! default once the queue is empty, while counting every invocation. This
//! makes retry and breaker behaviour directly assertable: script two
//! timeouts and a success, then check the call count.

use orderflow_core::order::Order;
use orderflow_core::services::{
    AntiFraudService, OrderCheck, PaymentService, ServiceError, UserService, WarehouseService,
};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// A queue of scripted responses with a default and an invocation counter.
pub struct Script<T> {
    queue: Mutex<VecDeque<T>>,
    default: T,
    calls: AtomicUsize,
}

impl<T: Clone> Script<T> {
    /// A script that always answers `default` (until responses are pushed).
    pub fn new(default: T) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            default,
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue one response to be returned before the default.
    pub fn push(&self, response: T) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
    }

    /// Number of times the script has been consumed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self) -> T {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| self.default.clone())
    }
}

/// Scripted [`WarehouseService`].
pub struct StubWarehouse {
    /// The availability script.
    pub script: Script<Result<bool, ServiceError>>,
}

impl StubWarehouse {
    /// Always reports stock available.
    #[must_use]
    pub fn in_stock() -> Self {
        Self {
            script: Script::new(Ok(true)),
        }
    }

    /// Always reports the product out of stock.
    #[must_use]
    pub fn out_of_stock() -> Self {
        Self {
            script: Script::new(Ok(false)),
        }
    }

    /// Always fails with the given error.
    #[must_use]
    pub fn failing(err: ServiceError) -> Self {
        Self {
            script: Script::new(Err(err)),
        }
    }
}

impl WarehouseService for StubWarehouse {
    fn check_product_availability(
        &self,
        _product_id: Uuid,
        _amount: i64,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ServiceError>> + Send + '_>> {
        Box::pin(async move { self.script.next() })
    }
}

/// Scripted [`AntiFraudService`].
pub struct StubAntiFraud {
    /// The credit-limit script.
    pub credit_limit: Script<Result<bool, ServiceError>>,
    /// The whole-order check script.
    pub order_check: Script<Result<OrderCheck, ServiceError>>,
}

impl StubAntiFraud {
    /// Passes both checks.
    #[must_use]
    pub fn passing() -> Self {
        Self {
            credit_limit: Script::new(Ok(true)),
            order_check: Script::new(Ok(OrderCheck::passed())),
        }
    }

    /// Fails the whole-order check with a structured reason.
    #[must_use]
    pub fn rejecting_order(reason: &str) -> Self {
        Self {
            credit_limit: Script::new(Ok(true)),
            order_check: Script::new(Ok(OrderCheck::failed(reason))),
        }
    }

    /// Fails both checks with the given error.
    #[must_use]
    pub fn failing(err: ServiceError) -> Self {
        Self {
            credit_limit: Script::new(Err(err.clone())),
            order_check: Script::new(Err(err)),
        }
    }
}

impl AntiFraudService for StubAntiFraud {
    fn check_user_credit_limit(
        &self,
        _user_id: Uuid,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ServiceError>> + Send + '_>> {
        Box::pin(async move { self.credit_limit.next() })
    }

    fn check_order<'a>(
        &'a self,
        _order: &'a Order,
    ) -> Pin<Box<dyn Future<Output = Result<OrderCheck, ServiceError>> + Send + 'a>> {
        Box::pin(async move { self.order_check.next() })
    }
}

/// Scripted [`UserService`].
pub struct StubUser {
    /// The status script.
    pub script: Script<Result<bool, ServiceError>>,
}

impl StubUser {
    /// Always reports the user active.
    #[must_use]
    pub fn active() -> Self {
        Self {
            script: Script::new(Ok(true)),
        }
    }

    /// Always reports the user inactive.
    #[must_use]
    pub fn inactive() -> Self {
        Self {
            script: Script::new(Ok(false)),
        }
    }

    /// Always fails with the given error.
    #[must_use]
    pub fn failing(err: ServiceError) -> Self {
        Self {
            script: Script::new(Err(err)),
        }
    }
}

impl UserService for StubUser {
    fn check_user_status(
        &self,
        _user_id: Uuid,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ServiceError>> + Send + '_>> {
        Box::pin(async move { self.script.next() })
    }
}

/// Scripted [`PaymentService`].
pub struct StubPayment {
    /// The charge script.
    pub script: Script<Result<(), ServiceError>>,
}

impl StubPayment {
    /// Always settles.
    #[must_use]
    pub fn settling() -> Self {
        Self {
            script: Script::new(Ok(())),
        }
    }

    /// Always fails with the given error.
    #[must_use]
    pub fn failing(err: ServiceError) -> Self {
        Self {
            script: Script::new(Err(err)),
        }
    }
}

impl PaymentService for StubPayment {
    fn process_payment<'a>(
        &'a self,
        _order: &'a Order,
    ) -> Pin<Box<dyn Future<Output = Result<(), ServiceError>> + Send + 'a>> {
        Box::pin(async move { self.script.next() })
    }
}
