//! Topology source abstraction and HTTP implementation
//!
//! The topology control plane exposes host identities, per-host
//! circuit lists, and side-effecting circuit commands. This module
//! only forwards; the control plane itself is not part of the core.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::error::{Result, TelemetryError};
use crate::models::{Circuit, CommandOutcome, TorHost};

/// Provider of host identity and circuit topology, plus the
/// command surface forwarded to the control plane.
#[async_trait]
pub trait TopologySource: Send + Sync {
    /// List the fleet's host identity records.
    async fn list_hosts(&self) -> Result<Vec<TorHost>>;

    /// Fetch one host's circuit list. A control-plane error for the
    /// host surfaces as [`TelemetryError::Fetch`].
    async fn host_circuits(&self, host_id: &str) -> Result<Vec<Circuit>>;

    /// Tear down and rebuild all circuits on one host.
    async fn rebuild_circuits(&self, host_id: &str) -> Result<CommandOutcome>;

    /// Close one circuit on one host.
    async fn close_circuit(&self, host_id: &str, circuit_id: &str) -> Result<CommandOutcome>;

    /// Request a new identity (fresh circuits, new exit) for a host.
    async fn new_identity(&self, host_id: &str) -> Result<CommandOutcome>;
}

/// Per-host circuits payload. The control plane reports a failed
/// control-port connection as a 200 with an `error` key.
#[derive(Debug, Deserialize)]
struct CircuitsResponse {
    #[serde(default)]
    circuits: Vec<Circuit>,
    #[serde(default)]
    error: Option<String>,
}

/// Topology source backed by the metrics service HTTP API.
pub struct HttpTopologySource {
    client: Client,
    base_url: Url,
}

impl HttpTopologySource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TelemetryError::fetch(base_url, e))?;
        let base_url = Url::parse(base_url).map_err(|e| TelemetryError::fetch(base_url, e))?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| TelemetryError::fetch(path, e))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| TelemetryError::fetch(url.as_str(), e))?;

        if !response.status().is_success() {
            return Err(TelemetryError::fetch(
                url.as_str(),
                format!("status {}", response.status()),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| TelemetryError::fetch(url.as_str(), e))
    }

    async fn post_command(&self, path: &str) -> Result<CommandOutcome> {
        let url = self.endpoint(path)?;
        let response = self
            .client
            .post(url.clone())
            .send()
            .await
            .map_err(|e| TelemetryError::fetch(url.as_str(), e))?;

        if !response.status().is_success() {
            return Err(TelemetryError::fetch(
                url.as_str(),
                format!("status {}", response.status()),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| TelemetryError::fetch(url.as_str(), e))
    }
}

#[async_trait]
impl TopologySource for HttpTopologySource {
    async fn list_hosts(&self) -> Result<Vec<TorHost>> {
        self.get_json("/tor-hosts").await
    }

    async fn host_circuits(&self, host_id: &str) -> Result<Vec<Circuit>> {
        let path = format!("/tor-hosts/{host_id}/circuits");
        let payload: CircuitsResponse = self.get_json(&path).await?;
        match payload.error {
            Some(reason) => Err(TelemetryError::fetch(path, reason)),
            None => Ok(payload.circuits),
        }
    }

    async fn rebuild_circuits(&self, host_id: &str) -> Result<CommandOutcome> {
        self.post_command(&format!("/tor-hosts/{host_id}/rebuild-circuits"))
            .await
    }

    async fn close_circuit(&self, host_id: &str, circuit_id: &str) -> Result<CommandOutcome> {
        self.post_command(&format!("/circuits/{circuit_id}/close?host_id={host_id}"))
            .await
    }

    async fn new_identity(&self, host_id: &str) -> Result<CommandOutcome> {
        self.post_command(&format!("/tor-hosts/{host_id}/new-identity"))
            .await
    }
}
