//! Server configuration

use anyhow::Result;
use serde::Deserialize;

/// Server configuration, loaded from `MULTISOCKS_*` environment
/// variables with defaults matching the stock compose deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// API server port for the dashboard endpoints
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Load-balancer counter table endpoint
    #[serde(default = "default_counter_url")]
    pub counter_url: String,

    /// Topology (metrics service) base URL
    #[serde(default = "default_topology_url")]
    pub topology_url: String,

    /// Live dashboard poll cadence in seconds
    #[serde(default = "default_live_interval")]
    pub live_interval_secs: u64,

    /// Counter-only poll cadence in seconds
    #[serde(default = "default_counter_interval")]
    pub counter_interval_secs: u64,

    /// Per-request fetch timeout in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Rolling trend window size
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

fn default_api_port() -> u16 {
    8080
}

fn default_counter_url() -> String {
    "http://localhost:1337/;csv".to_string()
}

fn default_topology_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_live_interval() -> u64 {
    2
}

fn default_counter_interval() -> u64 {
    30
}

fn default_fetch_timeout() -> u64 {
    10
}

fn default_history_capacity() -> usize {
    60
}

impl ServerConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("MULTISOCKS"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|_| ServerConfig {
            api_port: default_api_port(),
            counter_url: default_counter_url(),
            topology_url: default_topology_url(),
            live_interval_secs: default_live_interval(),
            counter_interval_secs: default_counter_interval(),
            fetch_timeout_secs: default_fetch_timeout(),
            history_capacity: default_history_capacity(),
        }))
    }
}
