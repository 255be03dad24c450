//! Ingestion facade: source + strategy + retry policy
//!
//! ```no_run
//! use meter_ingest::{IngestConfig, Ingestor};
//!
//! # async fn example() -> meter_ingest::Result<()> {
//! let config = IngestConfig::from_env()?;
//! let ingestor = Ingestor::from_config(&config)?;
//! let result = ingestor.run(&config.plan()?).await;
//! println!("{} records", result.records.len());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::aggregator::{aggregate, IngestionResult};
use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::retry::RetryPolicy;
use crate::source::PageSource;
use crate::strategy::{FetchPlan, FetchStrategy};

pub struct Ingestor {
    source: Arc<dyn PageSource>,
    strategy: Box<dyn FetchStrategy>,
    policy: RetryPolicy,
}

impl Ingestor {
    pub fn new(
        source: Arc<dyn PageSource>,
        strategy: Box<dyn FetchStrategy>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            source,
            strategy,
            policy,
        }
    }

    /// Build an HTTP-backed ingestor using the configured strategy
    pub fn from_config(config: &IngestConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            config.page_source()?,
            config.build_strategy(config.strategy),
            config.retry_policy(),
        ))
    }

    /// Same source and policy, different strategy
    pub fn with_strategy(&self, strategy: Box<dyn FetchStrategy>) -> Self {
        Self {
            source: Arc::clone(&self.source),
            strategy,
            policy: self.policy,
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Fetch every page of `plan` and assemble the result
    ///
    /// Page failures make the result partial; they are never returned as
    /// errors. An empty plan completes without contacting the source.
    #[instrument(skip_all, fields(strategy = self.strategy.name(), max_pages = plan.max_pages))]
    pub async fn run(&self, plan: &FetchPlan) -> IngestionResult {
        if plan.total == 0 {
            info!("Nothing to ingest for an empty dataset");
            return IngestionResult {
                end_of_data: true,
                ..IngestionResult::default()
            };
        }

        let started = Instant::now();
        let results = self
            .strategy
            .fetch(Arc::clone(&self.source), &self.policy, plan)
            .await;
        let requested = results.len();
        let result = aggregate(results, plan.page_size, plan.max_pages);

        if let Some(failure) = &result.failure {
            warn!(
                page = failure.page,
                error = %failure.error,
                records = result.records.len(),
                "Ingestion finished with a partial result"
            );
        } else {
            info!(
                records = result.records.len(),
                pages = result.pages.len(),
                requested_pages = requested,
                discarded = result.discarded_pages.len(),
                reached_page_limit = result.reached_page_limit,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Ingestion complete"
            );
        }

        result
    }

    /// Like [`Ingestor::run`], abandoning in-flight work when `cancel` fires
    ///
    /// Spawned workers are aborted when the strategy future is dropped.
    pub async fn run_with_cancel(
        &self,
        plan: &FetchPlan,
        cancel: CancellationToken,
    ) -> Result<IngestionResult> {
        tokio::select! {
            result = self.run(plan) => Ok(result),
            _ = cancel.cancelled() => {
                warn!(strategy = self.strategy.name(), "Ingestion cancelled");
                Err(IngestError::Cancelled)
            }
        }
    }
}
