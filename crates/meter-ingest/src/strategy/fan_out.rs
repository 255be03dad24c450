use async_trait::async_trait;
use futures::future::{join_all, BoxFuture};
use futures::{FutureExt, StreamExt};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::error;

use super::{FetchPlan, FetchStrategy};
use crate::aggregator::PageResults;
use crate::retry::{fetch_with_retry, PageOutcome, RetryPolicy};
use crate::source::PageSource;

/// All pages in flight at once, multiplexed on the calling task
///
/// With a concurrency limit the pages are still all queued up front but at
/// most `limit` are polled at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct FanOut {
    limit: Option<usize>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit.max(1)),
        }
    }
}

#[async_trait]
impl FetchStrategy for FanOut {
    fn name(&self) -> &'static str {
        "fan_out"
    }

    async fn fetch(
        &self,
        source: Arc<dyn PageSource>,
        policy: &RetryPolicy,
        plan: &FetchPlan,
    ) -> PageResults {
        let tasks: Vec<BoxFuture<'_, Option<PageOutcome>>> = plan
            .pages()
            .map(|page| {
                let source = Arc::clone(&source);
                let query = plan.query(page);
                AssertUnwindSafe(async move {
                    fetch_with_retry(source.as_ref(), policy, &query).await
                })
                .catch_unwind()
                .map(move |joined| match joined {
                    Ok(outcome) => Some(outcome),
                    Err(_) => {
                        error!(page, "Page task panicked");
                        None
                    },
                })
                .boxed()
            })
            .collect();

        let outcomes = match self.limit {
            None => join_all(tasks).await,
            Some(limit) => {
                futures::stream::iter(tasks)
                    .buffer_unordered(limit)
                    .collect::<Vec<_>>()
                    .await
            },
        };

        outcomes.into_iter().flatten().collect()
    }
}
