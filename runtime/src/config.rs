//! Worker configuration loaded from the environment.
//!
//! All variables are optional; defaults match production-sensible values:
//!
//! | Variable | Default |
//! |----------|---------|
//! | `EXTERNAL_SERVICE_TIMEOUT` | `5s` |
//! | `RETRY_ATTEMPTS` | `3` |
//! | `RETRY_DELAY` | `1s` |
//! | `RETRY_MAX_DELAY` | `10s` |
//! | `CIRCUIT_BREAKER_MAX_FAILURES` | `3` |
//! | `CIRCUIT_BREAKER_OPEN_TIMEOUT` | `10s` |
//!
//! Durations use the `humantime` grammar (`5s`, `1500ms`, `2m`).

use crate::resilience::{CircuitBreakerConfig, RetryConfig};
use std::time::Duration;
use thiserror::Error;

/// A configuration variable could not be parsed.
#[derive(Error, Debug)]
#[error("invalid value for {var}: {message}")]
pub struct ConfigError {
    /// Name of the offending environment variable.
    pub var: String,
    /// Why parsing failed.
    pub message: String,
}

/// Settings shared by every stage worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Deadline for the collaborator work inside one event handling.
    pub external_service_timeout: Duration,
    /// Retry policy for collaborator calls.
    pub retry: RetryConfig,
    /// Breaker thresholds for collaborator calls.
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            external_service_timeout: Duration::from_secs(5),
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Load worker settings from the environment, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is present but unparsable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            external_service_timeout: env_duration(
                "EXTERNAL_SERVICE_TIMEOUT",
                Duration::from_secs(5),
            )?,
            retry: RetryConfig {
                attempts: env_u32("RETRY_ATTEMPTS", 3)?,
                delay: env_duration("RETRY_DELAY", Duration::from_secs(1))?,
                max_delay: env_duration("RETRY_MAX_DELAY", Duration::from_secs(10))?,
            },
            circuit_breaker: CircuitBreakerConfig {
                max_failures: env_u32("CIRCUIT_BREAKER_MAX_FAILURES", 3)?,
                open_timeout: env_duration("CIRCUIT_BREAKER_OPEN_TIMEOUT", Duration::from_secs(10))?,
            },
        })
    }
}

fn env_duration(var: &str, default: Duration) -> Result<Duration, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => humantime::parse_duration(&raw).map_err(|err| ConfigError {
            var: var.to_string(),
            message: err.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn env_u32(var: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw.parse().map_err(|err: std::num::ParseIntError| ConfigError {
            var: var.to_string(),
            message: err.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[test]
    fn defaults_without_environment() {
        let cfg = WorkerConfig::default();
        assert_eq!(cfg.external_service_timeout, Duration::from_secs(5));
        assert_eq!(cfg.retry.attempts, 3);
        assert_eq!(cfg.retry.delay, Duration::from_secs(1));
        assert_eq!(cfg.retry.max_delay, Duration::from_secs(10));
        assert_eq!(cfg.circuit_breaker.max_failures, 3);
        assert_eq!(cfg.circuit_breaker.open_timeout, Duration::from_secs(10));
    }

    #[test]
    fn duration_parsing_accepts_humantime_grammar() {
        assert_eq!(
            humantime::parse_duration("1500ms").unwrap(),
            Duration::from_millis(1500)
        );
    }
}
