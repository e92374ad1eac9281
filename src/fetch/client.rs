//! HTTP client and schedule-driven fetch
//!
//! The fetcher makes one attempt per configured delay slot: on any network
//! error or non-success status it logs, sleeps for that slot's delay, and
//! moves to the next slot. A 200 response short-circuits immediately.
//! Exhausting the schedule is a terminal failure for the URL; the last
//! slot's delay is never slept, since no attempt follows it.

use crate::config::FetchConfig;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Path of the third-party price-analysis endpoint, keyed by listing id
pub const PRICE_ANALYSIS_PATH: &str = "/analytics/aPriceAnalysis/?id=";

/// Errors produced by the fetch layer
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Max retries exceeded for {url}")]
    MaxRetriesExceeded { url: String },

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),
}

/// Builds the shared HTTP client
///
/// # Arguments
///
/// * `config` - The fetch configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Schedule-driven HTTP fetcher
pub struct Fetcher {
    client: Client,
    retry_delays: Vec<Duration>,
}

impl Fetcher {
    /// Creates a fetcher from the fetch configuration
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = build_http_client(config)?;
        let retry_delays = config
            .retry_delays
            .iter()
            .map(|secs| Duration::from_secs(*secs))
            .collect();
        Ok(Self {
            client,
            retry_delays,
        })
    }

    /// Fetches a URL, returning the response body
    ///
    /// One attempt is made per configured delay slot. Any error or non-2xx
    /// status burns the slot: the failure is logged and the slot's delay is
    /// slept before the next attempt.
    ///
    /// # Errors
    ///
    /// `FetchError::MaxRetriesExceeded` once every slot is exhausted.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        for (slot, delay) in self.retry_delays.iter().enumerate() {
            tracing::debug!(url, "Requesting");
            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        match response.text().await {
                            Ok(body) => {
                                tracing::debug!(url, status = status.as_u16(), "Fetched");
                                return Ok(body);
                            }
                            Err(e) => {
                                tracing::warn!(url, error = %e, "Failed to read response body");
                            }
                        }
                    } else {
                        tracing::warn!(url, status = status.as_u16(), "Non-success status");
                    }
                }
                Err(e) => {
                    tracing::warn!(url, error = %e, "Request failed");
                }
            }

            // The last slot has no attempt after it, so its delay is skipped.
            if slot + 1 < self.retry_delays.len() {
                tracing::debug!(url, delay_secs = delay.as_secs(), "Sleeping before retry");
                tokio::time::sleep(*delay).await;
            }
        }

        Err(FetchError::MaxRetriesExceeded {
            url: url.to_string(),
        })
    }
}
