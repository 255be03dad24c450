//! Fetch strategies
//!
//! Every strategy answers the same question: given a page source, a retry
//! policy, and a plan, produce one outcome per page it fetched. Where the
//! run stops is decided afterwards by [`crate::aggregator::aggregate`], so
//! strategies only differ in scheduling:
//!
//! - [`Sequential`]: one page at a time, stops as soon as a page ends the run
//! - [`WorkerPool`]: a fixed number of spawned tasks pull pages off a shared queue
//! - [`FanOut`]: every page is in flight at once on the calling task

mod fan_out;
mod sequential;
mod worker_pool;

pub use fan_out::FanOut;
pub use sequential::Sequential;
pub use worker_pool::{WorkerPool, DEFAULT_WORKERS};

use async_trait::async_trait;
use meter_common::types::PageQuery;
use std::sync::Arc;

use crate::aggregator::PageResults;
use crate::error::{IngestError, Result};
use crate::retry::RetryPolicy;
use crate::source::PageSource;

/// Largest page size the service accepts
pub const MAX_PAGE_SIZE: u32 = 100;

/// Largest dataset the service will generate
pub const MAX_TOTAL: u32 = 1000;

/// What to fetch: a request template plus the page limit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    pub total: u32,
    pub page_size: u32,
    pub max_pages: u32,
    pub device_id: Option<String>,
}

impl FetchPlan {
    pub fn new(total: u32, page_size: u32, max_pages: u32) -> Result<Self> {
        if total > MAX_TOTAL {
            return Err(IngestError::invalid_request(format!(
                "total must be at most {MAX_TOTAL}, got {total}"
            )));
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(IngestError::invalid_request(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"
            )));
        }
        if max_pages == 0 {
            return Err(IngestError::invalid_request(
                "max pages must be at least 1",
            ));
        }
        Ok(Self {
            total,
            page_size,
            max_pages,
            device_id: None,
        })
    }

    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// The request for one page of this plan
    pub fn query(&self, page: u32) -> PageQuery {
        PageQuery {
            total: self.total,
            page,
            size: self.page_size,
            device_id: self.device_id.clone(),
        }
    }

    pub fn pages(&self) -> impl Iterator<Item = u32> {
        1..=self.max_pages
    }
}

#[async_trait]
pub trait FetchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(
        &self,
        source: Arc<dyn PageSource>,
        policy: &RetryPolicy,
        plan: &FetchPlan,
    ) -> PageResults;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_validation() {
        assert!(matches!(
            FetchPlan::new(100, 0, 5),
            Err(IngestError::InvalidRequest(_))
        ));
        assert!(matches!(
            FetchPlan::new(100, 101, 5),
            Err(IngestError::InvalidRequest(_))
        ));
        assert!(matches!(
            FetchPlan::new(100, 10, 0),
            Err(IngestError::InvalidRequest(_))
        ));
        assert!(FetchPlan::new(0, 100, 1).is_ok());
    }

    #[test]
    fn test_query_carries_template() {
        let plan = FetchPlan::new(137, 10, 20).unwrap().with_device("device_3");
        let query = plan.query(7);
        assert_eq!(query.total, 137);
        assert_eq!(query.page, 7);
        assert_eq!(query.size, 10);
        assert_eq!(query.device_id.as_deref(), Some("device_3"));
        assert_eq!(plan.pages().count(), 20);
    }
}
