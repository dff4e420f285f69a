//! HTTP server configuration from the environment.

use orderflow_runtime::ConfigError;

/// Server settings: `PORT` (default `8080`) and `ENV` (`dev` selects the
/// human-readable log encoder, anything else the JSON encoder).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port to bind.
    pub port: u16,
    /// Whether to use the human-readable log encoder.
    pub dev_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            dev_logging: false,
        }
    }
}

impl ServerConfig {
    /// Load server settings from the environment, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `PORT` is present but not a valid port.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse().map_err(|err: std::num::ParseIntError| ConfigError {
                var: "PORT".to_string(),
                message: err.to_string(),
            })?,
            Err(_) => 8080,
        };
        let dev_logging = std::env::var("ENV").is_ok_and(|env| env == "dev");
        Ok(Self { port, dev_logging })
    }
}
