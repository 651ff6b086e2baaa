//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use syncstream_api::StrategyParameters;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Evaluation loop settings
    #[serde(default)]
    pub engine: RawEngineConfig,

    /// Remote playback provider settings
    #[serde(default)]
    pub provider: RawProviderConfig,

    /// Strategy catalog seeds
    #[serde(default)]
    pub catalog: RawCatalogConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// IPC socket path
    pub socket_path: Option<PathBuf>,

    /// Data directory for store
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawEngineConfig {
    /// Seconds between evaluation cycles
    pub poll_interval_secs: Option<u64>,
}

/// Which provider implementation to run against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderMode {
    #[default]
    Spotify,
    /// Deterministic in-process provider, no network
    Mock,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawProviderConfig {
    #[serde(default)]
    pub mode: ProviderMode,

    pub api_base_url: Option<String>,

    pub token_url: Option<String>,

    pub client_id: Option<String>,

    pub client_secret: Option<String>,

    pub refresh_token: Option<String>,

    pub request_timeout_secs: Option<u64>,

    /// Proactive token refresh cadence; 0 disables it
    pub token_refresh_interval_secs: Option<u64>,

    #[serde(default)]
    pub retry: RawRetryConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawRetryConfig {
    pub max_rate_limit_retries: Option<u32>,

    /// Wait used when a 429 carries no Retry-After header
    pub default_retry_after_secs: Option<u64>,

    pub max_backoff_secs: Option<u64>,

    pub backoff_multiplier: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawCatalogConfig {
    /// Strategy to activate when no active pointer is stored yet
    pub default_active: Option<String>,

    /// Seed entries; the built-in seeds are used when empty
    #[serde(default)]
    pub strategies: Vec<RawStrategy>,
}

/// Raw strategy seed
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawStrategy {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_true")]
    pub is_active: bool,

    #[serde(default)]
    pub parameters: StrategyParameters,
}

fn default_true() -> bool {
    true
}
