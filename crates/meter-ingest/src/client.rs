//! HTTP page source for the measurement service
//!
//! One [`reqwest::Client`] is built up front and shared by every request,
//! whichever strategy is driving it.

use async_trait::async_trait;
use meter_common::types::{Measurement, PageEnvelope, PageQuery};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::trace;

use crate::error::Result;
use crate::source::{Outcome, PageSource};

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default service URL when none is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Paginated endpoint that always answers
pub const PAGE_ENDPOINT: &str = "/measurements/page";

/// Paginated endpoint with injected failures
pub const UNRELIABLE_ENDPOINT: &str = "/measurements/very-reliable";

pub struct HttpPageSource {
    client: Client,
    url: String,
}

impl HttpPageSource {
    pub fn new(base_url: &str, endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, endpoint))
    }

    /// Reuse an existing client
    pub fn with_client(client: Client, base_url: &str, endpoint: &str) -> Self {
        Self {
            client,
            url: endpoint_url(base_url, endpoint),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch_page(&self, query: &PageQuery) -> Outcome {
        trace!(url = %self.url, page = query.page, "GET page");

        let response = match self.client.get(&self.url).query(query).send().await {
            Ok(response) => response,
            Err(e) => return classify_transport(&e),
        };

        let status = response.status();
        if status.is_success() {
            return match response.json::<PageEnvelope<Measurement>>().await {
                Ok(envelope) => Outcome::Success(envelope),
                Err(e) if e.is_timeout() => Outcome::TransientFailure(format!("timed out: {e}")),
                Err(e) if e.is_body() => {
                    Outcome::TransientFailure(format!("page body interrupted: {e}"))
                },
                Err(e) => Outcome::PermanentFailure(format!("invalid page body: {e}")),
            };
        }

        let body = response.text().await.unwrap_or_default();
        let reason = format!("HTTP {}: {}", status.as_u16(), body.trim());
        if is_transient_status(status) {
            Outcome::TransientFailure(reason)
        } else {
            Outcome::PermanentFailure(reason)
        }
    }
}

fn endpoint_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

fn classify_transport(e: &reqwest::Error) -> Outcome {
    if e.is_timeout() || e.is_connect() {
        Outcome::TransientFailure(format!("request failed: {e}"))
    } else {
        Outcome::PermanentFailure(format!("request failed: {e}"))
    }
}
