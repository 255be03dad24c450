//! Meter Ingest - pulls the measurement service into a CSV file

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use meter_common::logging::{init_logging, LogConfig, LogLevel};
use meter_ingest::{
    export, EndpointKind, IngestConfig, IngestionResult, Ingestor, RetryKind, StrategyKind,
};
use std::path::PathBuf;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "meter-ingest")]
#[command(author, version, about = "Measurement service ingestion tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    overrides: Overrides,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest with one strategy and export the records
    Run {
        /// Fetch strategy (defaults to METER_STRATEGY or worker-pool)
        #[arg(short, long, value_enum)]
        strategy: Option<StrategyKind>,

        /// Output CSV path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip the CSV export
        #[arg(long)]
        no_save: bool,

        /// Exit with an error when the result is partial
        #[arg(long)]
        strict: bool,
    },

    /// Run every strategy against the same endpoint and compare results
    Compare {
        /// Directory for one CSV per strategy
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

/// Per-invocation overrides of the environment configuration
#[derive(Args, Debug)]
struct Overrides {
    /// Service base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[arg(long, global = true, value_enum)]
    endpoint: Option<EndpointKind>,

    /// Dataset length to request
    #[arg(long, global = true)]
    total: Option<u32>,

    #[arg(long, global = true)]
    page_size: Option<u32>,

    #[arg(long, global = true)]
    max_pages: Option<u32>,

    /// Only fetch records of this device
    #[arg(long, global = true)]
    device_id: Option<String>,

    /// Worker-pool size
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Maximum pages in flight for fan-out
    #[arg(long, global = true)]
    fan_out_limit: Option<usize>,

    #[arg(long, global = true, value_enum)]
    retry: Option<RetryKind>,

    #[arg(long, global = true)]
    max_attempts: Option<u32>,

    #[arg(long, global = true)]
    retry_wait_ms: Option<u64>,

    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
}

impl Overrides {
    fn apply(self, config: &mut IngestConfig) {
        if let Some(v) = self.base_url {
            config.base_url = v;
        }
        if let Some(v) = self.endpoint {
            config.endpoint = v;
        }
        if let Some(v) = self.total {
            config.total = v;
        }
        if let Some(v) = self.page_size {
            config.page_size = v;
        }
        if let Some(v) = self.max_pages {
            config.max_pages = v;
        }
        if self.device_id.is_some() {
            config.device_id = self.device_id;
        }
        if let Some(v) = self.workers {
            config.workers = v;
        }
        if self.fan_out_limit.is_some() {
            config.fan_out_limit = self.fan_out_limit;
        }
        if let Some(v) = self.retry {
            config.retry = v;
        }
        if let Some(v) = self.max_attempts {
            config.max_attempts = v;
        }
        if let Some(v) = self.retry_wait_ms {
            config.retry_wait_ms = v;
        }
        if let Some(v) = self.timeout_secs {
            config.timeout_secs = v;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("meter-ingest")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    let mut config = IngestConfig::from_env()?;
    cli.overrides.apply(&mut config);
    config.validate()?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    match cli.command {
        Command::Run {
            strategy,
            output,
            no_save,
            strict,
        } => {
            if let Some(strategy) = strategy {
                config.strategy = strategy;
            }
            run(&config, output, no_save, strict, cancel).await
        },
        Command::Compare { output_dir } => compare(&config, output_dir, cancel).await,
    }
}

async fn run(
    config: &IngestConfig,
    output: Option<PathBuf>,
    no_save: bool,
    strict: bool,
    cancel: CancellationToken,
) -> Result<()> {
    let ingestor = Ingestor::from_config(config)?;
    let plan = config.plan()?;

    info!(
        strategy = %config.strategy,
        base_url = %config.base_url,
        endpoint = config.endpoint.path(),
        total = plan.total,
        page_size = plan.page_size,
        max_pages = plan.max_pages,
        "Starting ingestion"
    );

    let result = ingestor.run_with_cancel(&plan, cancel).await?;
    log_summary(config.strategy, &result);

    if !no_save {
        let path = output.unwrap_or_else(|| {
            PathBuf::from(export::default_file_name(
                config.strategy.as_str(),
                chrono::Local::now(),
            ))
        });
        export::export_csv(&result.records, &path)?;
    }

    if strict {
        result
            .into_complete()
            .context("Ingestion did not reach the end of the data")?;
    }

    Ok(())
}

async fn compare(
    config: &IngestConfig,
    output_dir: Option<PathBuf>,
    cancel: CancellationToken,
) -> Result<()> {
    let base = Ingestor::from_config(config)?;
    let plan = config.plan()?;
    let mut runs: Vec<(StrategyKind, IngestionResult)> = Vec::new();

    for kind in StrategyKind::ALL {
        let ingestor = base.with_strategy(config.build_strategy(kind));
        let started = Instant::now();
        let result = ingestor.run_with_cancel(&plan, cancel.clone()).await?;

        info!(
            strategy = %kind,
            records = result.records.len(),
            partial = result.is_partial(),
            attempts = result.total_attempts(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Strategy finished"
        );

        if let Some(dir) = &output_dir {
            let name = export::default_file_name(kind.as_str(), chrono::Local::now());
            export::export_csv(&result.records, &dir.join(name))?;
        }

        runs.push((kind, result));
    }

    let Some((first_kind, first)) = runs.first() else {
        return Ok(());
    };

    let mut identical = true;
    for (kind, result) in runs.iter().skip(1) {
        if result.records != first.records || result.is_partial() != first.is_partial() {
            identical = false;
            warn!(
                left = %first_kind,
                right = %kind,
                left_records = first.records.len(),
                right_records = result.records.len(),
                "Strategies disagree"
            );
        }
    }

    if identical {
        info!("All strategies produced identical results");
    } else if config.endpoint == EndpointKind::Unreliable {
        warn!("Results differ; the unreliable endpoint can exhaust retries on any run");
    } else {
        error!("Results differ on the reliable endpoint");
        anyhow::bail!("strategies produced different results");
    }

    Ok(())
}

fn log_summary(strategy: StrategyKind, result: &IngestionResult) {
    for page in &result.pages {
        info!(
            page = page.page,
            status = %page.status,
            items = page.item_count,
            attempts = page.attempts,
            "Page report"
        );
    }

    match &result.failure {
        Some(failure) => warn!(
            strategy = %strategy,
            records = result.records.len(),
            page = failure.page,
            error = %failure.error,
            "Partial result"
        ),
        None => info!(
            strategy = %strategy,
            records = result.records.len(),
            end_of_data = result.end_of_data,
            reached_page_limit = result.reached_page_limit,
            "Complete result"
        ),
    }
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, cancelling ingestion");
            cancel.cancel();
        },
        Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
    }
}
