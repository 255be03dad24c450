use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error};

use super::{FetchPlan, FetchStrategy};
use crate::aggregator::PageResults;
use crate::retry::{fetch_with_retry, PageOutcome, RetryPolicy};
use crate::source::PageSource;

/// Default number of pool workers
pub const DEFAULT_WORKERS: usize = 5;

/// Page numbers `1..=last`, handed out once each
///
/// `next` drops to 0 once `u32::MAX` has been handed out.
struct PageQueue {
    next: AtomicU32,
    last: u32,
}

impl PageQueue {
    fn new(last: u32) -> Self {
        Self {
            next: AtomicU32::new(1),
            last,
        }
    }

    fn pop(&self) -> Option<u32> {
        self.next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |page| {
                (page != 0 && page <= self.last).then(|| page.wrapping_add(1))
            })
            .ok()
    }
}

/// A fixed pool of spawned tasks sharing one queue of page numbers
///
/// Workers send finished pages to a single collector over a channel, so
/// every page outcome is written exactly once. A worker that panics loses
/// at most the page it was holding; the aggregator reports that page as
/// missing.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

#[async_trait]
impl FetchStrategy for WorkerPool {
    fn name(&self) -> &'static str {
        "worker_pool"
    }

    async fn fetch(
        &self,
        source: Arc<dyn PageSource>,
        policy: &RetryPolicy,
        plan: &FetchPlan,
    ) -> PageResults {
        let queue = Arc::new(PageQueue::new(plan.max_pages));
        let (tx, mut rx) = mpsc::unbounded_channel::<PageOutcome>();
        let workers = self.workers.min(plan.max_pages as usize);

        let mut join_set = JoinSet::new();
        for worker in 0..workers {
            let queue = Arc::clone(&queue);
            let source = Arc::clone(&source);
            let tx = tx.clone();
            let policy = *policy;
            let plan = plan.clone();

            join_set.spawn(async move {
                while let Some(page) = queue.pop() {
                    let outcome = fetch_with_retry(source.as_ref(), &policy, &plan.query(page)).await;
                    if tx.send(outcome).is_err() {
                        break;
                    }
                }
                debug!(worker, "Worker drained queue");
            });
        }
        drop(tx);

        let mut results = PageResults::new();
        while let Some(outcome) = rx.recv().await {
            results.record(outcome);
        }

        while let Some(joined) = join_set.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Worker task failed");
            }
        }

        results
    }
}
