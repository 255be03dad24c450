//! Meter Server Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
//!
//! A paginated measurement service over a deterministic synthetic dataset.
//!
//! # Overview
//!
//! - **generator**: seeded, reproducible record generation
//! - **pagination**: 1-indexed page windows over an ordered slice
//! - **unreliability**: independent failure injection for the unreliable endpoint
//! - **service**: composes the three behind `fetch_page`
//! - **api**: the axum routes exposing the service over HTTP
//!
//! # Example
//!
//! ```no_run
//! use meter_server::{config::Config, create_router, service::DataService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let app = create_router(DataService::default(), &config);
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod generator;
pub mod middleware;
pub mod pagination;
pub mod service;
pub mod unreliability;

use axum::Router;

pub use error::{ServiceError, ServiceResult};
pub use service::{DataService, Endpoint, PageRequest};

/// Build the application router with its middleware stack
pub fn create_router(service: DataService, config: &config::Config) -> Router {
    api::router(api::AppState::new(service))
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
}
