//! Resilience primitives wrapped around every external collaborator call.
//!
//! Two composable pieces: [`retry`] (jittered exponential backoff over
//! transient failures) and [`CircuitBreaker`] (fail-fast once a collaborator
//! keeps failing). [`with_resilience`] composes them with the retry *inside*
//! the breaker's accounting, so one breaker "call" covers a whole retry
//! sequence and the breaker opens on sustained end-to-end failures rather
//! than on transient single attempts.

mod circuit_breaker;
mod retry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState,
};
pub use retry::{RetryConfig, retry};

/// Run `operation` under retry, inside one circuit-breaker accounting unit.
///
/// # Errors
///
/// Returns [`CircuitBreakerError::Open`] without invoking `operation` while
/// the breaker is open; otherwise the final error of the retry sequence,
/// wrapped in [`CircuitBreakerError::Inner`].
pub async fn with_resilience<F, Fut, T, E, P>(
    breaker: &CircuitBreaker,
    retry_cfg: &RetryConfig,
    is_retryable: P,
    operation: F,
) -> Result<T, CircuitBreakerError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    breaker
        .call(|| retry(retry_cfg, is_retryable, operation))
        .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn retry_cfg() -> RetryConfig {
        RetryConfig {
            attempts: 3,
            delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[tokio::test]
    async fn one_breaker_call_covers_a_whole_retry_sequence() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            max_failures: 2,
            open_timeout: Duration::from_secs(10),
        });
        let calls = Arc::new(AtomicUsize::new(0));

        // Three retryable attempts, all failing: one breaker failure.
        let counter = Arc::clone(&calls);
        let result = with_resilience(&breaker, &retry_cfg(), |_: &String| true, || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("timeout".to_string())
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.counters().1, 1);
    }

    #[tokio::test]
    async fn open_breaker_skips_the_retry_sequence_entirely() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            max_failures: 1,
            open_timeout: Duration::from_secs(10),
        });

        let result = with_resilience(&breaker, &retry_cfg(), |_: &String| false, || async {
            Err::<(), _>("down".to_string())
        })
        .await;
        assert!(matches!(result, Err(CircuitBreakerError::Inner(_))));
        assert_eq!(breaker.state(), CircuitState::Open);

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let result = with_resilience(&breaker, &retry_cfg(), |_: &String| true, || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(())
            }
        })
        .await;

        assert!(matches!(result, Err(CircuitBreakerError::Open)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
