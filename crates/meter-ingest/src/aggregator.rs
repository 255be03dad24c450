//! Turns per-page outcomes into one ordered result
//!
//! Strategies may finish pages in any order and may fetch pages past the end
//! of the data. The aggregator is the single place that decides where a run
//! stops: it walks pages from 1 upward and halts at the first page that is
//! missing, failed, short, or flagged as the last one.

use meter_common::types::Measurement;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

use crate::error::IngestError;
use crate::retry::PageOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Succeeded,
    RetriedThenSucceeded,
    ExhaustedRetries,
    Failed,
    /// Fetched, but past the point where the run stopped
    Skipped,
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PageStatus::Succeeded => "succeeded",
            PageStatus::RetriedThenSucceeded => "retried_then_succeeded",
            PageStatus::ExhaustedRetries => "exhausted_retries",
            PageStatus::Failed => "failed",
            PageStatus::Skipped => "skipped",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageReport {
    pub page: u32,
    pub status: PageStatus,
    pub item_count: usize,
    pub attempts: u32,
}

/// The page a partial run stopped at, and why
#[derive(Debug)]
pub struct PageFailure {
    pub page: u32,
    pub error: IngestError,
}

/// Outcomes keyed by page number, one entry per page
#[derive(Debug, Default)]
pub struct PageResults {
    slots: BTreeMap<u32, PageOutcome>,
}

impl PageResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a page outcome; a second outcome for the same page is dropped
    pub fn record(&mut self, outcome: PageOutcome) -> bool {
        if self.slots.contains_key(&outcome.page) {
            warn!(page = outcome.page, "Duplicate page outcome ignored");
            return false;
        }
        self.slots.insert(outcome.page, outcome);
        true
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, page: u32) -> Option<&PageOutcome> {
        self.slots.get(&page)
    }

    /// Total requests made across all recorded pages
    pub fn total_attempts(&self) -> u32 {
        self.slots.values().map(|o| o.attempts).sum()
    }
}

impl FromIterator<PageOutcome> for PageResults {
    fn from_iter<I: IntoIterator<Item = PageOutcome>>(iter: I) -> Self {
        let mut results = Self::new();
        for outcome in iter {
            results.record(outcome);
        }
        results
    }
}

/// Ordered records plus an account of how every page went
#[derive(Debug, Default)]
pub struct IngestionResult {
    pub records: Vec<Measurement>,
    /// Pages up to and including the stop point, in page order
    pub pages: Vec<PageReport>,
    /// Pages fetched beyond the stop point; their records are not included
    pub discarded_pages: Vec<PageReport>,
    pub failure: Option<PageFailure>,
    /// The last included page was short or flagged as final
    pub end_of_data: bool,
    /// The page limit was hit before the data ran out
    pub reached_page_limit: bool,
}

impl IngestionResult {
    pub fn is_partial(&self) -> bool {
        self.failure.is_some()
    }

    pub fn total_attempts(&self) -> u32 {
        self.pages
            .iter()
            .chain(self.discarded_pages.iter())
            .map(|r| r.attempts)
            .sum()
    }

    /// The records, or the failure that made the run partial
    pub fn into_complete(self) -> Result<Vec<Measurement>, IngestError> {
        match self.failure {
            None => Ok(self.records),
            Some(PageFailure { page, error }) => Err(IngestError::PartialIngestion {
                page,
                reason: error.to_string(),
            }),
        }
    }
}

/// Assemble page outcomes into a single result
///
/// `page_size` is the size that was requested, used to recognise a short
/// final page. `max_pages` bounds the walk.
pub fn aggregate(results: PageResults, page_size: u32, max_pages: u32) -> IngestionResult {
    let mut slots = results.slots;
    let mut result = IngestionResult::default();
    let mut stopped = false;

    for page in 1..=max_pages {
        let Some(outcome) = slots.remove(&page) else {
            warn!(page, "Page missing from results, stopping");
            result.failure = Some(PageFailure {
                page,
                error: IngestError::PartialIngestion {
                    page,
                    reason: "page was never returned".to_string(),
                },
            });
            stopped = true;
            break;
        };

        let ends_run = outcome.ends_run(page_size);
        result.pages.push(report(&outcome, outcome.status()));

        match outcome.result {
            Ok(envelope) => {
                result.records.extend(envelope.items);
                if ends_run {
                    debug!(page, "Reached end of data");
                    result.end_of_data = true;
                    stopped = true;
                    break;
                }
            },
            Err(error) => {
                warn!(page, error = %error, "Page failed, result is partial");
                result.failure = Some(PageFailure { page, error });
                stopped = true;
                break;
            },
        }
    }

    result.reached_page_limit = !stopped;
    result.discarded_pages = slots
        .values()
        .map(|outcome| report(outcome, PageStatus::Skipped))
        .collect();

    result
}

fn report(outcome: &PageOutcome, status: PageStatus) -> PageReport {
    PageReport {
        page: outcome.page,
        status,
        item_count: outcome.item_count(),
        attempts: outcome.attempts,
    }
}
