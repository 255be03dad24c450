//! Meter Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging setup, and error handling for the meter workspace.
//!
//! # Overview
//!
//! - **Types**: the `Measurement` record and the page envelope exchanged
//!   between the data service and the ingestion engine
//! - **Error Handling**: `MeterError` and the `Result` alias
//! - **Logging**: tracing subscriber configuration shared by both binaries
//!
//! # Example
//!
//! ```no_run
//! use meter_common::types::{Measurement, PageEnvelope};
//!
//! fn count_items(body: &str) -> meter_common::Result<usize> {
//!     let envelope: PageEnvelope<Measurement> = serde_json::from_str(body)?;
//!     Ok(envelope.items.len())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{MeterError, Result};
