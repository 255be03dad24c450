//! Retry policies for page fetches
//!
//! A [`RetryPolicy`] is a small value: how many attempts a page gets, which
//! outcomes are worth another attempt, and how long to wait in between.
//! Two ready-made shapes cover the ingestion service:
//!
//! - [`RetryPolicy::fixed_interval`] retries transient failures after a
//!   constant pause.
//! - [`RetryPolicy::result_backoff`] retries successful responses that carry
//!   a server backoff hint, waiting as long as the hint asks.
//!
//! [`fetch_with_retry`] drives a [`PageSource`] under a policy and returns a
//! [`PageOutcome`] that remembers every attempt.

use meter_common::types::{Measurement, PageEnvelope, PageQuery};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::aggregator::PageStatus;
use crate::error::IngestError;
use crate::source::{Outcome, PageSource};

/// Default attempts per page, including the first
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default pause between fixed-interval attempts
pub const DEFAULT_RETRY_WAIT: Duration = Duration::from_millis(500);

/// How long to pause before the next attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    Fixed(Duration),
    /// Use the outcome's backoff hint in seconds, zero when absent
    FromHint,
}

/// What to do after an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The outcome is final; keep it
    Accept,
    Retry { wait: Duration },
    /// The outcome asked for a retry but no attempts are left
    Exhausted,
}

/// Predicate deciding whether an outcome deserves another attempt
pub type RetryPredicate = fn(&Outcome) -> bool;

/// Retries transient failures only
pub fn on_transient(outcome: &Outcome) -> bool {
    matches!(outcome, Outcome::TransientFailure(_))
}

/// Retries successful bodies that carry a backoff hint
pub fn on_backoff_hint(outcome: &Outcome) -> bool {
    outcome.backoff_hint().is_some()
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    wait: WaitStrategy,
    retry_if: RetryPredicate,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, wait: WaitStrategy, retry_if: RetryPredicate) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            wait,
            retry_if,
        }
    }

    /// Retry transient failures after a constant pause
    pub fn fixed_interval(max_attempts: u32, wait: Duration) -> Self {
        Self::new(max_attempts, WaitStrategy::Fixed(wait), on_transient)
    }

    /// Retry while the server answers with a backoff hint
    pub fn result_backoff(max_attempts: u32) -> Self {
        Self::new(max_attempts, WaitStrategy::FromHint, on_backoff_hint)
    }

    /// One attempt per page
    pub fn none() -> Self {
        Self::new(1, WaitStrategy::Fixed(Duration::ZERO), on_transient)
    }

    /// Replace the retry predicate
    pub fn retry_if(mut self, predicate: RetryPredicate) -> Self {
        self.retry_if = predicate;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn wait_strategy(&self) -> WaitStrategy {
        self.wait
    }

    pub fn should_retry(&self, outcome: &Outcome) -> bool {
        (self.retry_if)(outcome)
    }

    pub fn wait_for(&self, outcome: &Outcome) -> Duration {
        match self.wait {
            WaitStrategy::Fixed(wait) => wait,
            WaitStrategy::FromHint => {
                Duration::from_secs(outcome.backoff_hint().unwrap_or_default())
            },
        }
    }

    /// Decide what follows attempt number `attempt` (1-based)
    pub fn decide(&self, outcome: &Outcome, attempt: u32) -> Decision {
        if !self.should_retry(outcome) {
            Decision::Accept
        } else if attempt >= self.max_attempts {
            Decision::Exhausted
        } else {
            Decision::Retry {
                wait: self.wait_for(outcome),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed_interval(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_WAIT)
    }
}

/// A retry that happened: which attempt failed and how long we waited after
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryAttempt {
    pub attempt: u32,
    pub wait: Duration,
    pub reason: String,
}

/// Final state of one page after the retry policy is done with it
#[derive(Debug)]
pub struct PageOutcome {
    pub page: u32,
    /// Requests made for this page, including the first
    pub attempts: u32,
    pub retries: Vec<RetryAttempt>,
    pub result: Result<PageEnvelope<Measurement>, IngestError>,
}

impl PageOutcome {
    pub fn status(&self) -> PageStatus {
        match &self.result {
            Ok(_) if self.attempts > 1 => PageStatus::RetriedThenSucceeded,
            Ok(_) => PageStatus::Succeeded,
            Err(IngestError::RetryExhausted { .. }) => PageStatus::ExhaustedRetries,
            Err(_) => PageStatus::Failed,
        }
    }

    pub fn item_count(&self) -> usize {
        self.result.as_ref().map(|e| e.items.len()).unwrap_or(0)
    }

    /// Whether nothing after this page should be requested
    pub fn ends_run(&self, page_size: u32) -> bool {
        match &self.result {
            Ok(envelope) => envelope.is_last(page_size),
            Err(_) => true,
        }
    }
}

/// Fetch one page, retrying as the policy allows
///
/// Never fails: every way a page can end is captured in the returned
/// [`PageOutcome`].
#[instrument(skip_all, fields(page = query.page))]
pub async fn fetch_with_retry(
    source: &dyn PageSource,
    policy: &RetryPolicy,
    query: &PageQuery,
) -> PageOutcome {
    let page = query.page;
    let mut attempt = 1;
    let mut retries = Vec::new();

    loop {
        let outcome = source.fetch_page(query).await;

        match policy.decide(&outcome, attempt) {
            Decision::Accept => {
                let result = match outcome {
                    Outcome::Success(envelope) => {
                        if attempt > 1 {
                            info!(page, attempts = attempt, "Page succeeded after retry");
                        } else {
                            debug!(page, items = envelope.items.len(), "Page fetched");
                        }
                        Ok(envelope)
                    },
                    failed => {
                        let err = failed
                            .into_error()
                            .unwrap_or_else(|| IngestError::PermanentService("unknown".into()));
                        error!(page, attempts = attempt, error = %err, "Page failed without retry");
                        Err(err)
                    },
                };
                return PageOutcome {
                    page,
                    attempts: attempt,
                    retries,
                    result,
                };
            },
            Decision::Retry { wait } => {
                let reason = outcome.describe();
                warn!(
                    page,
                    attempt,
                    max_attempts = policy.max_attempts(),
                    wait_ms = wait.as_millis() as u64,
                    reason = %reason,
                    "Page attempt failed, retrying"
                );
                retries.push(RetryAttempt {
                    attempt,
                    wait,
                    reason,
                });
                tokio::time::sleep(wait).await;
                attempt += 1;
            },
            Decision::Exhausted => {
                let last_error = outcome.describe();
                error!(
                    page,
                    attempts = attempt,
                    error = %last_error,
                    "Page failed after all retry attempts exhausted"
                );
                return PageOutcome {
                    page,
                    attempts: attempt,
                    retries,
                    result: Err(IngestError::RetryExhausted {
                        page,
                        attempts: attempt,
                        last_error,
                    }),
                };
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn envelope(items: usize, backoff: Option<u64>) -> PageEnvelope<Measurement> {
        PageEnvelope {
            items: sample_items(items),
            total: 100,
            page: 1,
            size: 10,
            pages: 10,
            has_more: None,
            backoff,
        }
    }

    fn sample_items(n: usize) -> Vec<Measurement> {
        (0..n)
            .map(|i| Measurement {
                id: format!("m{i}"),
                device_id: "device_1".into(),
                timestamp: chrono::NaiveDateTime::default(),
                temperature: 20.0,
                humidity: 50.0,
                pressure: 1000.0,
                battery_level: 80.0,
            })
            .collect()
    }

    /// Plays back a fixed list of outcomes, repeating the last one
    struct Script {
        outcomes: Vec<Outcome>,
        calls: Mutex<usize>,
    }

    impl Script {
        fn new(outcomes: Vec<Outcome>) -> Self {
            Self {
                outcomes,
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl PageSource for Script {
        async fn fetch_page(&self, _query: &PageQuery) -> Outcome {
            let mut calls = self.calls.lock().unwrap();
            let idx = (*calls).min(self.outcomes.len() - 1);
            *calls += 1;
            self.outcomes[idx].clone()
        }
    }

    fn query() -> PageQuery {
        PageQuery {
            total: 100,
            page: 1,
            size: 10,
            device_id: None,
        }
    }

    #[test]
    fn test_fixed_interval_decisions() {
        let policy = RetryPolicy::fixed_interval(3, Duration::from_millis(200));
        let transient = Outcome::TransientFailure("HTTP 500".into());

        assert_eq!(
            policy.decide(&transient, 1),
            Decision::Retry {
                wait: Duration::from_millis(200)
            }
        );
        assert_eq!(policy.decide(&transient, 3), Decision::Exhausted);
        assert_eq!(
            policy.decide(&Outcome::PermanentFailure("HTTP 404".into()), 1),
            Decision::Accept
        );
        assert_eq!(
            policy.decide(&Outcome::Success(envelope(10, Some(3))), 1),
            Decision::Accept
        );
    }

    #[test]
    fn test_result_backoff_waits_for_hint() {
        let policy = RetryPolicy::result_backoff(5);
        let hinted = Outcome::Success(envelope(0, Some(2)));

        assert_eq!(
            policy.decide(&hinted, 1),
            Decision::Retry {
                wait: Duration::from_secs(2)
            }
        );
        assert_eq!(
            policy.decide(&Outcome::Success(envelope(10, None)), 1),
            Decision::Accept
        );
        assert_eq!(
            policy.decide(&Outcome::TransientFailure("boom".into()), 1),
            Decision::Accept
        );
    }

    #[test]
    fn test_zero_attempts_is_clamped_to_one() {
        assert_eq!(RetryPolicy::fixed_interval(0, Duration::ZERO).max_attempts(), 1);
    }

    #[test]
    fn test_custom_predicate() {
        let policy = RetryPolicy::fixed_interval(2, Duration::ZERO)
            .retry_if(|o| matches!(o, Outcome::PermanentFailure(_)));
        assert!(policy.should_retry(&Outcome::PermanentFailure("x".into())));
        assert!(!policy.should_retry(&Outcome::TransientFailure("x".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_counts_every_attempt() {
        let source = Script::new(vec![Outcome::TransientFailure("HTTP 500".into())]);
        let policy = RetryPolicy::fixed_interval(5, Duration::from_millis(500));

        let outcome = fetch_with_retry(&source, &policy, &query()).await;

        assert_eq!(source.calls(), 5);
        assert_eq!(outcome.attempts, 5);
        assert_eq!(outcome.retries.len(), 4);
        assert_eq!(outcome.status(), PageStatus::ExhaustedRetries);
        match outcome.result {
            Err(IngestError::RetryExhausted {
                page,
                attempts,
                last_error,
            }) => {
                assert_eq!(page, 1);
                assert_eq!(attempts, 5);
                assert_eq!(last_error, "HTTP 500");
            },
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let source = Script::new(vec![
            Outcome::TransientFailure("timeout".into()),
            Outcome::TransientFailure("HTTP 503".into()),
            Outcome::Success(envelope(10, None)),
        ]);
        let policy = RetryPolicy::default();

        let started = tokio::time::Instant::now();
        let outcome = fetch_with_retry(&source, &policy, &query()).await;

        assert_eq!(outcome.status(), PageStatus::RetriedThenSucceeded);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.item_count(), 10);
        assert!(started.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_is_not_retried() {
        let source = Script::new(vec![Outcome::PermanentFailure("HTTP 404".into())]);
        let outcome = fetch_with_retry(&source, &RetryPolicy::default(), &query()).await;

        assert_eq!(source.calls(), 1);
        assert_eq!(outcome.status(), PageStatus::Failed);
        assert!(matches!(
            outcome.result,
            Err(IngestError::PermanentService(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_hint_honoured_then_cleared() {
        let source = Script::new(vec![
            Outcome::Success(envelope(0, Some(3))),
            Outcome::Success(envelope(10, None)),
        ]);
        let policy = RetryPolicy::result_backoff(5);

        let started = tokio::time::Instant::now();
        let outcome = fetch_with_retry(&source, &policy, &query()).await;

        assert_eq!(source.calls(), 2);
        assert_eq!(outcome.retries[0].wait, Duration::from_secs(3));
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert_eq!(outcome.item_count(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_hint_on_every_attempt_exhausts() {
        let source = Script::new(vec![Outcome::Success(envelope(0, Some(1)))]);
        let policy = RetryPolicy::result_backoff(3);

        let started = tokio::time::Instant::now();
        let outcome = fetch_with_retry(&source, &policy, &query()).await;

        assert_eq!(source.calls(), 3);
        assert_eq!(outcome.retries.len(), 2);
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(outcome.status(), PageStatus::ExhaustedRetries);
        match outcome.result {
            Err(IngestError::RetryExhausted {
                attempts,
                last_error,
                ..
            }) => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("backoff"), "{last_error}");
            },
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }
}
