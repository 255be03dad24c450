//! HTTP surface of the data service
//!
//! - `GET /` - service banner
//! - `GET /health` - liveness
//! - `GET /measurements` - legacy flat listing (deprecated)
//! - `GET /measurements/page` - page-based pagination
//! - `GET /measurements/very-reliable` - same contract with injected 500s

pub mod routes;

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::service::DataService;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DataService>,
}

impl AppState {
    pub fn new(service: DataService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// Build the measurement routes without middleware
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::health))
        .route("/measurements", get(routes::legacy_measurements))
        .route("/measurements/page", get(routes::page_measurements))
        .route("/measurements/very-reliable", get(routes::unreliable_measurements))
        .with_state(state)
}
