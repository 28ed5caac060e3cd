use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;

use crate::config::NetworkConfig;
use crate::events::{AccessEvent, TimeRange};
use crate::traits::EventSource;

/// HTTP client for a remote event store exposing `GET {base}/events`.
#[derive(Clone, Debug)]
pub struct EventApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl EventApiClient {
    /// Create a new API client with configurable timeouts.
    pub fn new(base_url: String, network_config: &NetworkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(network_config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(network_config.connect_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, base_url })
    }

    /// Build the listing URL, adding `from`/`to` only for bounded sides.
    pub fn events_url(&self, range: TimeRange) -> Result<Url> {
        let base = self.base_url.trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/events"))
            .with_context(|| format!("Invalid event API URL: {}", self.base_url))?;

        if !range.is_unbounded() {
            let mut query = url.query_pairs_mut();
            if let Some(from) = range.from {
                query.append_pair("from", &from.to_rfc3339());
            }
            if let Some(to) = range.to {
                query.append_pair("to", &to.to_rfc3339());
            }
        }

        Ok(url)
    }

    /// Fetch events in `range` from the remote store.
    pub async fn list_events(&self, range: TimeRange) -> Result<Vec<AccessEvent>> {
        let url = self.events_url(range)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request to event API")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("API returned error status: {}", status);
        }

        let events = response
            .json::<Vec<AccessEvent>>()
            .await
            .context("Failed to parse event API response")?;

        Ok(events)
    }
}

impl EventSource for EventApiClient {
    async fn fetch_events(&self, range: TimeRange) -> Result<Vec<AccessEvent>> {
        // The server filters too, but the range stays inclusive whatever it does
        let events = self.list_events(range).await?;
        Ok(range.filter(events))
    }
}
