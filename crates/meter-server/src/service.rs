//! The data service: generator, paginator and failure injection behind one
//! request/response contract
//!
//! Datasets are regenerated deterministically, so caching is an
//! optimisation only: a cache miss produces exactly the dataset a hit would
//! have returned. The cache is keyed by `(total, device_id)` and holds
//! read-only `Arc`s, which makes concurrent page reads of one logical
//! dataset safe and consistent in any order.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use meter_common::types::{Measurement, PageEnvelope};
use tracing::{debug, instrument};

use crate::error::{ServiceError, ServiceResult};
use crate::generator;
use crate::pagination::{paginate, PageParams};
use crate::unreliability::UnreliabilityInjector;

/// Default number of distinct datasets kept in memory
pub const DEFAULT_DATASET_CACHE_CAPACITY: usize = 64;

/// Which contract variant a request is served under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Never injects failures
    Reliable,
    /// Rolls the injector before every response
    Unreliable,
}

/// One page request against the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Number of records to generate
    pub total: u32,
    /// 1-indexed page number
    pub page: u32,
    pub size: u32,
    pub device_id: Option<String>,
}

impl PageRequest {
    pub fn new(total: u32, page: u32, size: u32) -> Self {
        Self {
            total,
            page,
            size,
            device_id: None,
        }
    }

    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }
}

type DatasetKey = (u32, Option<String>);

pub struct DataService {
    injector: UnreliabilityInjector,
    cache: RwLock<HashMap<DatasetKey, Arc<Vec<Measurement>>>>,
    cache_capacity: usize,
}

impl DataService {
    pub fn new(injector: UnreliabilityInjector, cache_capacity: usize) -> Self {
        Self {
            injector,
            cache: RwLock::new(HashMap::new()),
            cache_capacity: cache_capacity.max(1),
        }
    }

    /// The full dataset for `total` records, generated once per key
    pub fn dataset(&self, total: u32, device_id: Option<&str>) -> Arc<Vec<Measurement>> {
        let key: DatasetKey = (total, device_id.map(str::to_string));

        if let Some(hit) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Arc::clone(hit);
        }

        let generated = Arc::new(generator::generate(total as usize, device_id));
        debug!(total, device_id, "Generated dataset");

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if cache.len() >= self.cache_capacity && !cache.contains_key(&key) {
            if let Some(evict) = cache.keys().next().cloned() {
                cache.remove(&evict);
            }
        }
        Arc::clone(cache.entry(key).or_insert(generated))
    }

    /// Serve one page
    ///
    /// Under [`Endpoint::Unreliable`] the injector is rolled after
    /// validation and before any slicing; a failed roll returns
    /// [`ServiceError::Unavailable`] and no data.
    #[instrument(skip(self), fields(total = request.total, page = request.page, size = request.size))]
    pub fn fetch_page(
        &self,
        request: &PageRequest,
        endpoint: Endpoint,
    ) -> ServiceResult<PageEnvelope<Measurement>> {
        let params = PageParams::new(request.page, request.size)?;

        if endpoint == Endpoint::Unreliable && self.injector.maybe_fail() {
            return Err(ServiceError::Unavailable);
        }

        let dataset = self.dataset(request.total, request.device_id.as_deref());
        let envelope = paginate(&dataset, params);
        debug!(items = envelope.items.len(), "Served page");

        Ok(envelope)
    }

    /// Flat, unpaginated listing of the first `count` records
    pub fn legacy(&self, count: u32, device_id: Option<&str>) -> Vec<Measurement> {
        let dataset = self.dataset(count, device_id);
        dataset.iter().take(count as usize).cloned().collect()
    }

    pub fn failure_probability(&self) -> f64 {
        self.injector.probability()
    }
}

impl Default for DataService {
    fn default() -> Self {
        Self::new(UnreliabilityInjector::default(), DEFAULT_DATASET_CACHE_CAPACITY)
    }
}
