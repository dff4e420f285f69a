//! Retry with jittered exponential backoff for transient failures.
//!
//! Only errors the caller classifies as retryable are attempted again;
//! anything else short-circuits and surfaces immediately. Between attempts
//! the delay doubles (capped at `max_delay`) and a uniform random jitter of
//! up to the whole delay is added on top, so a burst of failing calls does
//! not retry in lockstep.
//!
//! # Example
//!
//! ```rust
//! use orderflow_runtime::resilience::{RetryConfig, retry};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), String> {
//! let cfg = RetryConfig {
//!     attempts: 3,
//!     delay: Duration::from_millis(100),
//!     max_delay: Duration::from_secs(10),
//! };
//!
//! let value = retry(&cfg, |err: &String| err.contains("timeout"), || async {
//!     Ok::<_, String>(42)
//! })
//! .await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

/// Retry policy: attempt count and backoff bounds.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of invocations (including the first).
    pub attempts: u32,
    /// Base delay before the first retry.
    pub delay: Duration,
    /// Cap on the exponential component of the backoff.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Retry an async operation with jittered exponential backoff.
///
/// Runs `operation` up to `cfg.attempts` times (a zero attempt budget is
/// treated as one). An error for which `is_retryable` returns `false` is
/// returned immediately without further attempts.
///
/// # Errors
///
/// Returns the first non-retryable error, or the last error once the attempt
/// budget is spent.
pub async fn retry<F, Fut, T, E, P>(
    cfg: &RetryConfig,
    is_retryable: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let attempts = cfg.attempts.max(1);
    let mut backoff = cfg.delay;
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                if !is_retryable(&err) {
                    tracing::warn!(error = %err, "error is not retryable, failing immediately");
                    return Err(err);
                }

                attempt += 1;
                if attempt >= attempts {
                    tracing::error!(attempt, error = %err, "operation failed after max attempts");
                    return Err(err);
                }

                backoff = next_backoff(backoff, cfg.max_delay);
                tracing::warn!(
                    attempt,
                    delay_ms = backoff.as_millis(),
                    error = %err,
                    "operation failed, retrying"
                );
                sleep(backoff).await;
            }
        }
    }
}

/// Double the delay (capped), then add a uniform jitter of up to the capped
/// delay.
fn next_backoff(previous: Duration, max_delay: Duration) -> Duration {
    let doubled = (previous * 2).min(max_delay);
    let upper_ms = u64::try_from(doubled.as_millis()).unwrap_or(u64::MAX);
    if upper_ms == 0 {
        return doubled;
    }
    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..upper_ms));
    doubled + jitter
}
