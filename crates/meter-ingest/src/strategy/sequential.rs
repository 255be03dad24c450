use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{FetchPlan, FetchStrategy};
use crate::aggregator::PageResults;
use crate::retry::{fetch_with_retry, RetryPolicy};
use crate::source::PageSource;

/// One page at a time, in order
///
/// Issues no request past the page that ends the run, so it is the only
/// strategy that never produces discarded pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential;

#[async_trait]
impl FetchStrategy for Sequential {
    fn name(&self) -> &'static str {
        "sequential"
    }

    async fn fetch(
        &self,
        source: Arc<dyn PageSource>,
        policy: &RetryPolicy,
        plan: &FetchPlan,
    ) -> PageResults {
        let mut results = PageResults::new();

        for page in plan.pages() {
            let outcome = fetch_with_retry(source.as_ref(), policy, &plan.query(page)).await;
            let ends_run = outcome.ends_run(plan.page_size);
            results.record(outcome);

            if ends_run {
                debug!(page, "Stopping sequential fetch");
                break;
            }
        }

        results
    }
}
