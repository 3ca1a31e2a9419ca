//! Counter source abstraction and HTTP implementation

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::error::{Result, TelemetryError};

/// Provider of the raw counter table text.
#[async_trait]
pub trait CounterSource: Send + Sync {
    /// Fetch the raw delimited counter table for one cycle.
    async fn fetch_raw(&self) -> Result<String>;
}

/// Counter source backed by the load balancer's text endpoint.
pub struct HttpCounterSource {
    client: Client,
    url: Url,
}

impl HttpCounterSource {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TelemetryError::fetch(url, e))?;
        let url = Url::parse(url).map_err(|e| TelemetryError::fetch(url, e))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl CounterSource for HttpCounterSource {
    async fn fetch_raw(&self) -> Result<String> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| TelemetryError::fetch(self.url.as_str(), e))?;

        if !response.status().is_success() {
            return Err(TelemetryError::fetch(
                self.url.as_str(),
                format!("status {}", response.status()),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| TelemetryError::fetch(self.url.as_str(), e))
    }
}
