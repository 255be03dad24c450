//! Where pages come from
//!
//! A [`PageSource`] performs exactly one request and classifies the result
//! as an [`Outcome`]. It never retries; that is the retry policy's job.

use async_trait::async_trait;
use meter_common::types::{Measurement, PageEnvelope, PageQuery};

use crate::error::IngestError;

/// Classified result of a single page request
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(PageEnvelope<Measurement>),
    /// Expected to succeed if asked again (5xx, timeout, connect failure)
    TransientFailure(String),
    /// Asking again will not help (4xx, malformed body)
    PermanentFailure(String),
}

impl Outcome {
    /// Backoff hint carried by a successful body, in seconds
    pub fn backoff_hint(&self) -> Option<u64> {
        match self {
            Outcome::Success(envelope) => envelope.backoff,
            _ => None,
        }
    }

    /// Human-readable cause, used in retry logs and error messages
    pub fn describe(&self) -> String {
        match self {
            Outcome::Success(envelope) => match envelope.backoff {
                Some(secs) => format!("server requested backoff of {secs}s"),
                None => format!("{} items", envelope.items.len()),
            },
            Outcome::TransientFailure(reason) | Outcome::PermanentFailure(reason) => {
                reason.clone()
            },
        }
    }

    /// Convert a failed outcome into the matching page error
    pub(crate) fn into_error(self) -> Option<IngestError> {
        match self {
            Outcome::Success(_) => None,
            Outcome::TransientFailure(reason) => Some(IngestError::TransientService(reason)),
            Outcome::PermanentFailure(reason) => Some(IngestError::PermanentService(reason)),
        }
    }
}

/// One page request, one classified answer
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, query: &PageQuery) -> Outcome;
}
