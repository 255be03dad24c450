//! Shared fixtures for ingestion integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use meter_common::types::PageQuery;
use meter_ingest::{FanOut, FetchStrategy, Outcome, PageSource, Sequential, WorkerPool};
use meter_server::{
    config::Config,
    create_router,
    service::{DataService, Endpoint, PageRequest},
    unreliability::UnreliabilityInjector,
    ServiceError,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Page source calling the data service in-process
///
/// Counts requests per page and can be told to fail chosen pages forever.
pub struct LocalSource {
    service: DataService,
    endpoint: Endpoint,
    failing: HashSet<u32>,
    panicking: HashSet<u32>,
    calls: Mutex<HashMap<u32, u32>>,
}

impl LocalSource {
    pub fn reliable() -> Self {
        Self::new(0.0, Endpoint::Reliable)
    }

    pub fn unreliable(probability: f64) -> Self {
        Self::new(probability, Endpoint::Unreliable)
    }

    fn new(probability: f64, endpoint: Endpoint) -> Self {
        Self {
            service: DataService::new(UnreliabilityInjector::new(probability).unwrap(), 8),
            endpoint,
            failing: HashSet::new(),
            panicking: HashSet::new(),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Answer this page with a transient failure every time
    pub fn failing_on(mut self, page: u32) -> Self {
        self.failing.insert(page);
        self
    }

    /// Panic when this page is requested
    pub fn panicking_on(mut self, page: u32) -> Self {
        self.panicking.insert(page);
        self
    }

    pub fn calls_for(&self, page: u32) -> u32 {
        self.calls.lock().unwrap().get(&page).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl PageSource for LocalSource {
    async fn fetch_page(&self, query: &PageQuery) -> Outcome {
        *self.calls.lock().unwrap().entry(query.page).or_insert(0) += 1;
        tokio::task::yield_now().await;

        if self.panicking.contains(&query.page) {
            panic!("source exploded on page {}", query.page);
        }
        if self.failing.contains(&query.page) {
            return Outcome::TransientFailure("HTTP 500: scripted".to_string());
        }

        let mut request = PageRequest::new(query.total, query.page, query.size);
        if let Some(device) = &query.device_id {
            request = request.with_device(device.clone());
        }

        match self.service.fetch_page(&request, self.endpoint) {
            Ok(envelope) => Outcome::Success(envelope),
            Err(ServiceError::InvalidRequest(msg)) => Outcome::PermanentFailure(msg),
            Err(e) => Outcome::TransientFailure(e.to_string()),
        }
    }
}

/// Never answers
pub struct HangingSource;

#[async_trait]
impl PageSource for HangingSource {
    async fn fetch_page(&self, _query: &PageQuery) -> Outcome {
        std::future::pending().await
    }
}

pub fn all_strategies() -> Vec<Box<dyn FetchStrategy>> {
    vec![
        Box::new(Sequential),
        Box::new(WorkerPool::new(5)),
        Box::new(FanOut::new()),
        Box::new(FanOut::with_limit(3)),
    ]
}

/// Serve the measurement API on an ephemeral loopback port
pub async fn spawn_server(probability: f64) -> String {
    let service = DataService::new(UnreliabilityInjector::new(probability).unwrap(), 8);
    let app = create_router(service, &Config::default());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}
