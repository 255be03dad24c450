//! Ingestion configuration
//!
//! Values come from `.env`, then the process environment, then defaults.
//! The CLI overlays its flags on top of what [`IngestConfig::from_env`] returns.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::client::{
    HttpPageSource, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS, PAGE_ENDPOINT, UNRELIABLE_ENDPOINT,
};
use crate::error::{IngestError, Result};
use crate::retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_WAIT};
use crate::strategy::{
    FanOut, FetchPlan, FetchStrategy, Sequential, WorkerPool, DEFAULT_WORKERS, MAX_PAGE_SIZE,
    MAX_TOTAL,
};

// ============================================================================
// Ingestion Configuration Constants
// ============================================================================

/// Default dataset length requested from the service.
pub const DEFAULT_TOTAL: u32 = 100;

/// Default page size.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Default page limit per run.
pub const DEFAULT_MAX_PAGES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Sequential,
    WorkerPool,
    FanOut,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::Sequential,
        StrategyKind::WorkerPool,
        StrategyKind::FanOut,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Sequential => "sequential",
            StrategyKind::WorkerPool => "worker_pool",
            StrategyKind::FanOut => "fan_out",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "sequential" => Ok(StrategyKind::Sequential),
            "worker_pool" | "pool" => Ok(StrategyKind::WorkerPool),
            "fan_out" | "fanout" => Ok(StrategyKind::FanOut),
            other => Err(IngestError::config(format!("unknown strategy '{other}'"))),
        }
    }
}

/// Which retry policy shape to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RetryKind {
    /// Retry transient failures after a constant pause
    Fixed,
    /// Retry while the server sends a backoff hint
    Backoff,
    /// Single attempt per page
    None,
}

impl FromStr for RetryKind {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(RetryKind::Fixed),
            "backoff" => Ok(RetryKind::Backoff),
            "none" => Ok(RetryKind::None),
            other => Err(IngestError::config(format!("unknown retry policy '{other}'"))),
        }
    }
}

/// Which service endpoint to read pages from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    Reliable,
    Unreliable,
}

impl EndpointKind {
    pub fn path(&self) -> &'static str {
        match self {
            EndpointKind::Reliable => PAGE_ENDPOINT,
            EndpointKind::Unreliable => UNRELIABLE_ENDPOINT,
        }
    }
}

impl FromStr for EndpointKind {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "reliable" | "page" => Ok(EndpointKind::Reliable),
            "unreliable" | "very-reliable" | "very_reliable" => Ok(EndpointKind::Unreliable),
            other => Err(IngestError::config(format!("unknown endpoint '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub base_url: String,
    pub endpoint: EndpointKind,
    pub total: u32,
    pub page_size: u32,
    pub max_pages: u32,
    pub device_id: Option<String>,
    pub strategy: StrategyKind,
    pub workers: usize,
    /// In-flight limit for the fan-out strategy; unbounded when `None`
    pub fan_out_limit: Option<usize>,
    pub retry: RetryKind,
    pub max_attempts: u32,
    pub retry_wait_ms: u64,
    pub timeout_secs: u64,
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| IngestError::config(format!("{name}={raw}: {e}"))),
        _ => Ok(None),
    }
}

impl IngestConfig {
    /// Load configuration from `.env`, the environment, and defaults
    ///
    /// Values are only parsed here; call [`IngestConfig::validate`] once
    /// any command-line overrides are applied.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            base_url: std::env::var("METER_BASE_URL").unwrap_or(defaults.base_url),
            endpoint: env_parse("METER_ENDPOINT")?.unwrap_or(defaults.endpoint),
            total: env_parse("METER_TOTAL")?.unwrap_or(defaults.total),
            page_size: env_parse("METER_PAGE_SIZE")?.unwrap_or(defaults.page_size),
            max_pages: env_parse("METER_MAX_PAGES")?.unwrap_or(defaults.max_pages),
            device_id: std::env::var("METER_DEVICE_ID")
                .ok()
                .filter(|s| !s.is_empty()),
            strategy: env_parse("METER_STRATEGY")?.unwrap_or(defaults.strategy),
            workers: env_parse("METER_WORKERS")?.unwrap_or(defaults.workers),
            fan_out_limit: env_parse("METER_FAN_OUT_LIMIT")?,
            retry: env_parse("METER_RETRY")?.unwrap_or(defaults.retry),
            max_attempts: env_parse("METER_MAX_ATTEMPTS")?.unwrap_or(defaults.max_attempts),
            retry_wait_ms: env_parse("METER_RETRY_WAIT_MS")?.unwrap_or(defaults.retry_wait_ms),
            timeout_secs: env_parse("METER_TIMEOUT_SECS")?.unwrap_or(defaults.timeout_secs),
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(IngestError::config("base URL must not be empty"));
        }

        if self.total > MAX_TOTAL {
            return Err(IngestError::config(format!(
                "total must be at most {MAX_TOTAL}, got {}",
                self.total
            )));
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(IngestError::config(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }

        if self.max_pages == 0 {
            return Err(IngestError::config("max pages must be at least 1"));
        }

        if self.workers == 0 {
            return Err(IngestError::config("worker count must be at least 1"));
        }

        if self.fan_out_limit == Some(0) {
            return Err(IngestError::config("fan-out limit must be at least 1"));
        }

        if self.max_attempts == 0 {
            return Err(IngestError::config("max attempts must be at least 1"));
        }

        if self.timeout_secs == 0 {
            return Err(IngestError::config("request timeout must be at least 1 second"));
        }

        Ok(())
    }

    pub fn plan(&self) -> Result<FetchPlan> {
        let plan = FetchPlan::new(self.total, self.page_size, self.max_pages)?;
        Ok(match &self.device_id {
            Some(device) => plan.with_device(device.clone()),
            None => plan,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        match self.retry {
            RetryKind::Fixed => RetryPolicy::fixed_interval(
                self.max_attempts,
                Duration::from_millis(self.retry_wait_ms),
            ),
            RetryKind::Backoff => RetryPolicy::result_backoff(self.max_attempts),
            RetryKind::None => RetryPolicy::none(),
        }
    }

    pub fn build_strategy(&self, kind: StrategyKind) -> Box<dyn FetchStrategy> {
        match kind {
            StrategyKind::Sequential => Box::new(Sequential),
            StrategyKind::WorkerPool => Box::new(WorkerPool::new(self.workers)),
            StrategyKind::FanOut => match self.fan_out_limit {
                Some(limit) => Box::new(FanOut::with_limit(limit)),
                None => Box::new(FanOut::new()),
            },
        }
    }

    pub fn page_source(&self) -> Result<Arc<HttpPageSource>> {
        let source = HttpPageSource::new(
            &self.base_url,
            self.endpoint.path(),
            Duration::from_secs(self.timeout_secs),
        )?;
        Ok(Arc::new(source))
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            endpoint: EndpointKind::Reliable,
            total: DEFAULT_TOTAL,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            device_id: None,
            strategy: StrategyKind::WorkerPool,
            workers: DEFAULT_WORKERS,
            fan_out_limit: None,
            retry: RetryKind::Fixed,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_wait_ms: DEFAULT_RETRY_WAIT.as_millis() as u64,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::retry::WaitStrategy;

    #[test]
    fn test_default_config_is_valid() {
        let config = IngestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.workers, 5);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.retry_wait_ms, 500);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = IngestConfig::default();
        config.page_size = 0;
        assert!(config.validate().is_err());

        let mut config = IngestConfig::default();
        config.page_size = 101;
        assert!(config.validate().is_err());

        let mut config = IngestConfig::default();
        config.workers = 0;
        assert!(config.validate().is_err());

        let mut config = IngestConfig::default();
        config.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = IngestConfig::default();
        config.fan_out_limit = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_total_limited_to_service_maximum() {
        let mut config = IngestConfig::default();
        config.total = MAX_TOTAL + 1;
        assert!(matches!(config.validate(), Err(IngestError::Config(_))));

        config.total = MAX_TOTAL;
        assert!(config.validate().is_ok());

        config.total = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_env_defers_validation() {
        std::env::set_var("METER_PAGE_SIZE", "0");
        let loaded = IngestConfig::from_env();
        std::env::remove_var("METER_PAGE_SIZE");

        let mut config = loaded.unwrap();
        assert_eq!(config.page_size, 0);
        assert!(config.validate().is_err());

        config.page_size = 10;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_strategy_names_parse() {
        assert_eq!("worker-pool".parse::<StrategyKind>().unwrap(), StrategyKind::WorkerPool);
        assert_eq!("FAN_OUT".parse::<StrategyKind>().unwrap(), StrategyKind::FanOut);
        assert_eq!("sequential".parse::<StrategyKind>().unwrap(), StrategyKind::Sequential);
        assert!("threads".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn test_endpoint_paths() {
        assert_eq!("page".parse::<EndpointKind>().unwrap().path(), "/measurements/page");
        assert_eq!(
            "very-reliable".parse::<EndpointKind>().unwrap().path(),
            "/measurements/very-reliable"
        );
    }

    #[test]
    fn test_builds_matching_strategy_and_policy() {
        let mut config = IngestConfig::default();
        for kind in StrategyKind::ALL {
            assert_eq!(config.build_strategy(kind).name(), kind.as_str());
        }

        config.retry = RetryKind::Backoff;
        assert_eq!(config.retry_policy().wait_strategy(), WaitStrategy::FromHint);

        config.retry = RetryKind::None;
        assert_eq!(config.retry_policy().max_attempts(), 1);
    }

    #[test]
    fn test_plan_carries_device() {
        let mut config = IngestConfig::default();
        config.device_id = Some("device_4".into());
        let plan = config.plan().unwrap();
        assert_eq!(plan.query(2).device_id.as_deref(), Some("device_4"));
    }
}
