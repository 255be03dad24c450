//! Configuration management

use serde::{Deserialize, Serialize};

use crate::service::DEFAULT_DATASET_CACHE_CAPACITY;
use crate::unreliability::DEFAULT_FAILURE_PROBABILITY;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "*";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub service: ServiceConfig,
    pub cors: CorsConfig,
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Data service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Probability that `/measurements/very-reliable` answers 500
    pub failure_probability: f64,
    /// Number of generated datasets kept in memory
    pub dataset_cache_capacity: usize,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from `.env`, the environment, and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: std::env::var("METER_HOST")
                    .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: env_or("METER_PORT", DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: env_or(
                    "METER_SHUTDOWN_TIMEOUT",
                    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                ),
            },
            service: ServiceConfig {
                failure_probability: env_or(
                    "METER_FAILURE_PROBABILITY",
                    DEFAULT_FAILURE_PROBABILITY,
                ),
                dataset_cache_capacity: env_or(
                    "METER_DATASET_CACHE_CAPACITY",
                    DEFAULT_DATASET_CACHE_CAPACITY,
                ),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_CORS_ALLOWED_ORIGIN.to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                allow_credentials: env_or("CORS_ALLOW_CREDENTIALS", false),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if !(0.0..=1.0).contains(&self.service.failure_probability) {
            anyhow::bail!(
                "Failure probability must be within [0, 1], got {}",
                self.service.failure_probability
            );
        }

        if self.service.dataset_cache_capacity == 0 {
            anyhow::bail!("Dataset cache capacity must be greater than 0");
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            service: ServiceConfig {
                failure_probability: DEFAULT_FAILURE_PROBABILITY,
                dataset_cache_capacity: DEFAULT_DATASET_CACHE_CAPACITY,
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.service.failure_probability = 1.2;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.service.dataset_cache_capacity = 0;
        assert!(config.validate().is_err());
    }
}
