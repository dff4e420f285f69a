//! # Orderflow Postgres
//!
//! Postgres-backed [`orderflow_core::repository::OrderRepository`]
//! implementation plus pool construction from environment configuration.
//!
//! Connection settings come from `PG_HOST`, `PG_PORT`, `PG_USER`,
//! `PG_PASSWORD`, `PG_DB_NAME` and `PG_SSL_MODE`, all optional with local
//! defaults.

mod order_repository;

pub use order_repository::PostgresOrderRepository;

use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use std::time::Duration;
use thiserror::Error;

/// A connection variable could not be parsed.
#[derive(Error, Debug)]
#[error("invalid value for {var}: {message}")]
pub struct ConfigError {
    /// Name of the offending environment variable.
    pub var: String,
    /// Why parsing failed.
    pub message: String,
}

/// Postgres connection settings.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Role to connect as.
    pub user: String,
    /// Role password.
    pub password: String,
    /// Database name.
    pub db_name: String,
    /// TLS mode (`disable`, `prefer`, `require`, ...).
    pub ssl_mode: PgSslMode,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            db_name: "orders".to_string(),
            ssl_mode: PgSslMode::Disable,
        }
    }
}

impl PostgresConfig {
    /// Load connection settings from the environment, falling back to local
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is present but unparsable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            host: env_string("PG_HOST", defaults.host),
            port: env_port("PG_PORT", defaults.port)?,
            user: env_string("PG_USER", defaults.user),
            password: env_string("PG_PASSWORD", defaults.password),
            db_name: env_string("PG_DB_NAME", defaults.db_name),
            ssl_mode: env_ssl_mode("PG_SSL_MODE", defaults.ssl_mode)?,
        })
    }

    fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.db_name)
            .ssl_mode(self.ssl_mode)
    }
}

/// Open a connection pool and verify it with a ping.
///
/// Pool sizing: 100 connections at most, recycled after five minutes, idle
/// connections dropped after one minute, five seconds to acquire.
///
/// # Errors
///
/// Returns the underlying [`sqlx::Error`] when the server is unreachable or
/// the credentials are rejected.
pub async fn connect(config: &PostgresConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(100)
        .max_lifetime(Duration::from_secs(5 * 60))
        .idle_timeout(Duration::from_secs(60))
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(config.connect_options())
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;
    tracing::info!(host = %config.host, db = %config.db_name, "connected to postgres");
    Ok(pool)
}

/// Create the `orders` table if it does not exist yet.
///
/// # Errors
///
/// Returns the underlying [`sqlx::Error`] on DDL failure.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS orders (
            id          UUID PRIMARY KEY,
            user_id     UUID NOT NULL,
            product_id  UUID NOT NULL,
            amount      BIGINT NOT NULL,
            status      TEXT NOT NULL,
            created_at  TIMESTAMPTZ NOT NULL,
            updated_at  TIMESTAMPTZ NOT NULL
        )
        ",
    )
    .execute(pool)
    .await?;
    Ok(())
}

fn env_string(var: &str, default: String) -> String {
    std::env::var(var).unwrap_or(default)
}

fn env_port(var: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw.parse().map_err(|err: std::num::ParseIntError| ConfigError {
            var: var.to_string(),
            message: err.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn env_ssl_mode(var: &str, default: PgSslMode) -> Result<PgSslMode, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw.parse().map_err(|err| ConfigError {
            var: var.to_string(),
            message: format!("{err}"),
        }),
        Err(_) => Ok(default),
    }
}
