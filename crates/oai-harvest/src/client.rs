use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use stacks_core::config::OaiTargetConfig;
use stacks_core::error::{Result, StacksError};
use tracing::{debug, info, warn};

use crate::response::{self, OaiResponse};

/// HTTP client for one OAI-PMH base URL.
pub struct OaiClient {
    base_url: String,
    http: Client,
    retry_delay: Duration,
}

impl OaiClient {
    pub fn new(target: &OaiTargetConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(target.timeout_secs))
            .build()?;
        Ok(Self::with_http_client(target, http))
    }

    /// Create a client with a custom reqwest::Client (useful for testing).
    pub fn with_http_client(target: &OaiTargetConfig, http: Client) -> Self {
        Self {
            base_url: target.url.clone(),
            http,
            retry_delay: Duration::from_secs(target.retry_delay_secs),
        }
    }

    /// Issue `verb` with `params` and parse the response.
    ///
    /// A 503 is retried after the server's `Retry-After` delay for as long as
    /// the server keeps answering 503.
    pub async fn request(&self, verb: &str, params: &[(&str, String)]) -> Result<OaiResponse> {
        loop {
            debug!(url = %self.base_url, verb = %verb, ?params, "OAI-PMH request");
            let response = self
                .http
                .get(&self.base_url)
                .query(&[("verb", verb)])
                .query(params)
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::SERVICE_UNAVAILABLE {
                let delay = retry_after(response.headers()).unwrap_or(self.retry_delay);
                info!(verb = %verb, delay_secs = delay.as_secs(), "OAI-PMH server busy, retrying");
                tokio::time::sleep(delay).await;
                continue;
            }
            if !status.is_success() {
                warn!(status = %status, verb = %verb, "OAI-PMH request failed");
                return Err(StacksError::Backend(format!(
                    "OAI-PMH {verb} request to {} failed with status {status}",
                    self.base_url
                )));
            }

            let body = response.text().await?;
            return response::parse(&body);
        }
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
