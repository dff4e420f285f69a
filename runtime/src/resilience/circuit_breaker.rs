//! Circuit breaker guarding calls to a failing collaborator.
//!
//! The breaker watches consecutive failures and "opens" once they reach a
//! threshold, failing subsequent calls immediately so the collaborator gets
//! room to recover.
//!
//! # States
//!
//! - **Closed**: calls pass through; each failure increments a counter, any
//!   success resets it. Reaching `max_failures` opens the circuit.
//! - **Open**: calls fail with [`CircuitBreakerError::Open`] without invoking
//!   the operation, until `open_timeout` has elapsed since the last failure.
//! - **HalfOpen**: the first call after the timeout passes through as a
//!   probe. A successful probe closes the circuit; a failure reopens it.
//!
//! The breaker itself is non-generic: it only accounts for success versus
//! failure, and the caller threads the real result type through the closure.
//! State transitions happen under a single mutex; the wrapped operation never
//! executes while the lock is held.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Circuit breaker thresholds.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub max_failures: u32,
    /// How long the circuit stays open before a half-open probe is allowed.
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: 3,
            open_timeout: Duration::from_secs(10),
        }
    }
}

/// Observable state of a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation; calls pass through.
    Closed,
    /// Calls are rejected immediately.
    Open,
    /// Probing whether the collaborator recovered.
    HalfOpen,
}

/// Errors from a guarded call.
#[derive(Error, Debug)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the operation was not invoked.
    #[error("circuit breaker is open")]
    Open,
    /// The operation itself failed.
    #[error("{0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// The wrapped operation error, if the operation ran and failed.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Open => None,
            Self::Inner(err) => Some(err),
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failures: u32,
    last_failure: Option<Instant>,
}

/// Circuit breaker over async operations.
///
/// Cheap to share: workers own one breaker per collaborator concern and call
/// it from many concurrent tasks.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
    total_calls: AtomicU64,
    total_failures: AtomicU64,
    total_rejections: AtomicU64,
}

impl CircuitBreaker {
    /// Create a closed breaker with the given thresholds.
    #[must_use]
    pub const fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failures: 0,
                last_failure: None,
            }),
            total_calls: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            total_rejections: AtomicU64::new(0),
        }
    }

    /// Current state of the breaker.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Run `operation` through the breaker.
    ///
    /// # Errors
    ///
    /// Returns [`CircuitBreakerError::Open`] without invoking `operation`
    /// while the circuit is open, or [`CircuitBreakerError::Inner`] when the
    /// operation fails.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.total_calls.fetch_add(1, Ordering::Relaxed);

        if !self.try_acquire() {
            self.total_rejections.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("circuit breaker is open, rejecting call");
            return Err(CircuitBreakerError::Open);
        }

        match operation().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.total_failures.fetch_add(1, Ordering::Relaxed);
                self.on_failure();
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }

    /// Counters since construction: `(calls, failures, rejections)`.
    pub fn counters(&self) -> (u64, u64, u64) {
        (
            self.total_calls.load(Ordering::Relaxed),
            self.total_failures.load(Ordering::Relaxed),
            self.total_rejections.load(Ordering::Relaxed),
        )
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide whether a call may proceed, moving Open → HalfOpen once the
    /// open timeout has elapsed.
    fn try_acquire(&self) -> bool {
        let mut guard = self.lock();
        match guard.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let expired = guard
                    .last_failure
                    .is_some_and(|at| at.elapsed() > self.config.open_timeout);
                if expired {
                    tracing::info!("circuit breaker transitioning open -> half-open");
                    guard.state = CircuitState::HalfOpen;
                    guard.failures = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn on_success(&self) {
        let mut guard = self.lock();
        match guard.state {
            CircuitState::Closed => guard.failures = 0,
            CircuitState::HalfOpen => {
                tracing::info!("circuit breaker transitioning half-open -> closed");
                guard.state = CircuitState::Closed;
                guard.failures = 0;
                guard.last_failure = None;
            }
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self) {
        let mut guard = self.lock();
        match guard.state {
            CircuitState::Closed => {
                guard.failures += 1;
                if guard.failures >= self.config.max_failures {
                    tracing::warn!(
                        failures = guard.failures,
                        threshold = self.config.max_failures,
                        "circuit breaker transitioning closed -> open"
                    );
                    guard.state = CircuitState::Open;
                    guard.last_failure = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                tracing::warn!("circuit breaker transitioning half-open -> open (probe failed)");
                guard.state = CircuitState::Open;
                guard.failures = 1;
                guard.last_failure = Some(Instant::now());
            }
            CircuitState::Open => {
                guard.last_failure = Some(Instant::now());
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    fn breaker(max_failures: u32, open_timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            max_failures,
            open_timeout,
        })
    }

    #[tokio::test]
    async fn stays_closed_on_success() {
        let breaker = breaker(3, Duration::from_secs(10));
        let result = breaker.call(|| async { Ok::<_, String>(42) }).await;
        assert!(result.is_ok());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn opens_after_max_failures() {
        let breaker = breaker(3, Duration::from_secs(10));
        for _ in 0..3 {
            let _ = breaker.call(|| async { Err::<i32, _>("boom") }).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn success_resets_the_failure_counter() {
        let breaker = breaker(3, Duration::from_secs(10));
        for _ in 0..2 {
            let _ = breaker.call(|| async { Err::<i32, _>("boom") }).await;
        }
        let _ = breaker.call(|| async { Ok::<_, &str>(1) }).await;
        for _ in 0..2 {
            let _ = breaker.call(|| async { Err::<i32, _>("boom") }).await;
        }
        // Two failures after the reset are below the threshold of three.
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn open_rejects_without_invoking() {
        let breaker = breaker(2, Duration::from_secs(10));
        for _ in 0..2 {
            let _ = breaker.call(|| async { Err::<i32, _>("boom") }).await;
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let result = breaker
            .call(|| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(42)
            })
            .await;

        assert!(matches!(result, Err(CircuitBreakerError::Open)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn half_open_probe_after_timeout_closes_on_success() {
        let breaker = breaker(2, Duration::from_millis(20));
        for _ in 0..2 {
            let _ = breaker.call(|| async { Err::<i32, _>("boom") }).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(40)).await;

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let result = breaker
            .call(|| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(42)
            })
            .await;

        // Exactly one probe invocation, and the single success closes it.
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let breaker = breaker(2, Duration::from_millis(20));
        for _ in 0..2 {
            let _ = breaker.call(|| async { Err::<i32, _>("boom") }).await;
        }

        tokio::time::sleep(Duration::from_millis(40)).await;

        let _ = breaker.call(|| async { Err::<i32, _>("still down") }).await;
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn counters_track_calls_failures_rejections() {
        let breaker = breaker(2, Duration::from_secs(10));
        let _ = breaker.call(|| async { Ok::<_, String>(1) }).await;
        for _ in 0..2 {
            let _ = breaker.call(|| async { Err::<i32, _>("boom") }).await;
        }
        let _ = breaker.call(|| async { Ok::<_, String>(1) }).await;

        let (calls, failures, rejections) = breaker.counters();
        assert_eq!(calls, 4);
        assert_eq!(failures, 2);
        assert_eq!(rejections, 1);
    }
}
