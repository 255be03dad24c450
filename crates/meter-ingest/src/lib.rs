//! Meter Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
//!
//! Pulls every page of the measurement service into one ordered record
//! list, tolerating transient failures.
//!
//! # Overview
//!
//! - **source** / **client**: one request per call, classified as an [`Outcome`]
//! - **retry**: policies deciding whether and when to ask again
//! - **strategy**: sequential, worker-pool, and fan-out page scheduling
//! - **aggregator**: page-ordered assembly and the stop rule
//! - **ingestor**: the facade tying the above together
//! - **export**: flat CSV output

pub mod aggregator;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod ingestor;
pub mod retry;
pub mod source;
pub mod strategy;

pub use aggregator::{aggregate, IngestionResult, PageReport, PageStatus};
pub use client::HttpPageSource;
pub use config::{EndpointKind, IngestConfig, RetryKind, StrategyKind};
pub use error::{IngestError, Result};
pub use ingestor::Ingestor;
pub use retry::{fetch_with_retry, PageOutcome, RetryPolicy};
pub use source::{Outcome, PageSource};
pub use strategy::{FanOut, FetchPlan, FetchStrategy, Sequential, WorkerPool};
