//! Error types for the ingestion engine
//!
//! Page-level failures (`TransientService`, `PermanentService`,
//! `RetryExhausted`) are recorded on the page they happened to and never
//! abort a run. Only configuration problems and cancellation reach the
//! caller as a failed run.

use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    /// Malformed page number, page size, or page limit
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// 5xx, timeout, or connection failure; eligible for retry
    #[error("Transient service error: {0}")]
    TransientService(String),

    /// Non-retryable client error or undecodable body
    #[error("Permanent service error: {0}")]
    PermanentService(String),

    /// A retryable failure outlived the retry policy
    #[error("Page {page} failed after {attempts} attempts: {last_error}")]
    RetryExhausted {
        page: u32,
        attempts: u32,
        last_error: String,
    },

    /// The run stopped before the end of the data
    #[error("Partial ingestion: stopped at page {page}: {reason}")]
    PartialIngestion { page: u32, reason: String },

    /// The export sink could not be written
    #[error("Failed to write export to '{sink}': {reason}")]
    SinkWrite { sink: String, reason: String },

    #[error("Configuration error: {0}. Check your environment variables or command-line flags.")]
    Config(String),

    #[error("Ingestion cancelled")]
    Cancelled,

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl IngestError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn sink_write(sink: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::SinkWrite {
            sink: sink.into(),
            reason: reason.to_string(),
        }
    }
}
