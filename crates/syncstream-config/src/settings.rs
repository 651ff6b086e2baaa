//! Validated settings structures

use crate::schema::{ProviderMode, RawConfig, RawProviderConfig, RawRetryConfig, RawStrategy};
use crate::{ConfigError, ConfigResult};
use std::path::PathBuf;
use std::time::Duration;
use syncstream_api::StrategyConfig;
use syncstream_util::{StrategyId, data_dir_without_env, socket_path_without_env};

pub const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

pub const CLIENT_ID_ENV: &str = "SYNCSTREAM_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "SYNCSTREAM_CLIENT_SECRET";
pub const REFRESH_TOKEN_ENV: &str = "SYNCSTREAM_REFRESH_TOKEN";

/// Validated settings ready for use by the service
#[derive(Debug, Clone)]
pub struct Settings {
    pub service: ServiceSettings,
    pub engine: EngineSettings,
    pub provider: ProviderSettings,
    pub catalog: CatalogSettings,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceSettings {
                socket_path: raw
                    .service
                    .socket_path
                    .unwrap_or_else(socket_path_without_env),
                data_dir: raw.service.data_dir.unwrap_or_else(data_dir_without_env),
            },
            engine: EngineSettings {
                poll_interval: Duration::from_secs(raw.engine.poll_interval_secs.unwrap_or(10)),
            },
            provider: ProviderSettings::from_raw(raw.provider),
            catalog: CatalogSettings::from_raw(raw.catalog.default_active, raw.catalog.strategies),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_raw(RawConfig {
            config_version: crate::CURRENT_CONFIG_VERSION,
            service: Default::default(),
            engine: Default::default(),
            provider: Default::default(),
            catalog: Default::default(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub socket_path: PathBuf,
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub poll_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub mode: ProviderMode,
    pub api_base_url: String,
    pub token_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub request_timeout: Duration,
    /// None disables the proactive refresh task
    pub token_refresh_interval: Option<Duration>,
    pub retry: RetrySettings,
}

impl ProviderSettings {
    fn from_raw(raw: RawProviderConfig) -> Self {
        // Access tokens live for one hour
        let token_refresh_interval = match raw.token_refresh_interval_secs.unwrap_or(2700) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Self {
            mode: raw.mode,
            api_base_url: raw
                .api_base_url
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.into()),
            token_url: raw.token_url.unwrap_or_else(|| DEFAULT_TOKEN_URL.into()),
            client_id: raw.client_id,
            client_secret: raw.client_secret,
            refresh_token: raw.refresh_token,
            request_timeout: Duration::from_secs(raw.request_timeout_secs.unwrap_or(30)),
            token_refresh_interval,
            retry: RetrySettings::from_raw(raw.retry),
        }
    }

    /// Resolve credentials, letting the environment override the file.
    ///
    /// `lookup` is normally `|k| std::env::var(k).ok()`.
    pub fn resolve_credentials(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<ProviderCredentials> {
        let pick = |env_key: &str, file_value: &Option<String>| {
            lookup(env_key)
                .filter(|v| !v.is_empty())
                .or_else(|| file_value.clone().filter(|v| !v.is_empty()))
        };

        let client_id = pick(CLIENT_ID_ENV, &self.client_id);
        let client_secret = pick(CLIENT_SECRET_ENV, &self.client_secret);
        let refresh_token = pick(REFRESH_TOKEN_ENV, &self.refresh_token);

        match (client_id, client_secret, refresh_token) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => Ok(ProviderCredentials {
                client_id,
                client_secret,
                refresh_token,
            }),
            (id, secret, token) => {
                let mut missing = Vec::new();
                if id.is_none() {
                    missing.push("client_id");
                }
                if secret.is_none() {
                    missing.push("client_secret");
                }
                if token.is_none() {
                    missing.push("refresh_token");
                }
                Err(ConfigError::MissingCredentials(missing))
            }
        }
    }
}

/// Long-lived credentials exchanged for access tokens
#[derive(Clone)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Rate-limit retry tuning
#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub max_rate_limit_retries: u32,
    pub default_retry_after: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl RetrySettings {
    fn from_raw(raw: RawRetryConfig) -> Self {
        Self {
            max_rate_limit_retries: raw.max_rate_limit_retries.unwrap_or(5),
            default_retry_after: Duration::from_secs(raw.default_retry_after_secs.unwrap_or(5)),
            max_backoff: Duration::from_secs(raw.max_backoff_secs.unwrap_or(60)),
            backoff_multiplier: raw.backoff_multiplier.unwrap_or(2.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    /// Applied only when no active pointer is stored yet
    pub default_active: Option<StrategyId>,
    pub strategies: Vec<StrategyConfig>,
}

impl CatalogSettings {
    fn from_raw(default_active: Option<String>, strategies: Vec<RawStrategy>) -> Self {
        if strategies.is_empty() {
            return Self {
                default_active: Some(
                    default_active
                        .map(StrategyId::from)
                        .unwrap_or_else(|| StrategyId::new("focus")),
                ),
                strategies: builtin_seeds(),
            };
        }

        Self {
            default_active: default_active.map(StrategyId::from),
            strategies: strategies.into_iter().map(convert_strategy).collect(),
        }
    }
}

fn convert_strategy(raw: RawStrategy) -> StrategyConfig {
    StrategyConfig {
        id: StrategyId::new(raw.id),
        name: raw.name,
        description: raw.description,
        is_active: raw.is_active,
        parameters: raw.parameters,
    }
}

/// Seeds used when the config declares no strategies
pub fn builtin_seeds() -> Vec<StrategyConfig> {
    vec![
        StrategyConfig::new("focus", "Focus Guard", "Skips songs with lyrics or high energy.")
            .with_parameter("instrumentalness_threshold", 0.75)
            .with_parameter("energy_threshold", 0.5),
        StrategyConfig::new("energy", "Energy Floor", "Ensures music energy stays high.")
            .with_parameter("energy_floor", 0.7),
        StrategyConfig::new("vibe", "Vibe Shift", "Maintains a positive emotional atmosphere.")
            .with_parameter("min_valence", 0.6)
            .disabled(),
    ]
}
