//! HTTP client for the Spotify Web API

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use syncstream_api::{AudioFeatures, PlaybackState};
use syncstream_config::{ConfigError, ProviderCredentials, ProviderSettings};
use syncstream_store::Store;
use tracing::{debug, error, warn};

use crate::{PlaybackProvider, ProviderError, ProviderResult, RetryPolicy, TokenCache};

/// Successful response body
#[derive(Debug)]
enum Reply {
    NoContent,
    Body(String),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Production provider client.
///
/// Every call reads the cached token (refreshing first when empty), retries
/// once after a 401 with a fresh token, and waits out 429 responses within
/// the retry budget of its `RetryPolicy`.
pub struct SpotifyClient {
    http: Client,
    api_base_url: String,
    token_url: String,
    credentials: ProviderCredentials,
    tokens: TokenCache,
    retry: RetryPolicy,
}

impl SpotifyClient {
    pub fn new(
        settings: &ProviderSettings,
        credentials: ProviderCredentials,
        store: Arc<dyn Store>,
    ) -> ProviderResult<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(format!("syncstream/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            token_url: settings.token_url.clone(),
            credentials,
            tokens: TokenCache::new(store),
            retry: RetryPolicy::from(&settings.retry),
        })
    }

    /// Build from settings, resolving credentials from the environment first
    pub fn from_settings(settings: &ProviderSettings, store: Arc<dyn Store>) -> ProviderResult<Self> {
        let credentials = settings
            .resolve_credentials(|key| std::env::var(key).ok())
            .map_err(|e| match e {
                ConfigError::MissingCredentials(missing) => {
                    ProviderError::MissingCredentials(missing.join(", "))
                }
                other => ProviderError::MissingCredentials(other.to_string()),
            })?;
        Self::new(settings, credentials, store)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Exchange the refresh credential for a new access token
    async fn fetch_access_token(&self) -> ProviderResult<String> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", self.credentials.refresh_token.as_str()),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Token endpoint unreachable");
                ProviderError::Auth(format!("token request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Failed to refresh access token");
            return Err(ProviderError::Auth(format!(
                "token endpoint returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Auth(format!("malformed token response: {}", e)))?;
        Ok(token.access_token)
    }

    async fn request(&self, method: Method, endpoint: &str) -> ProviderResult<Reply> {
        let url = format!("{}{}", self.api_base_url, endpoint);
        let mut token = self
            .tokens
            .get_or_refresh(|| self.fetch_access_token())
            .await?;
        let mut auth_retried = false;
        let mut rate_limit_retries = 0u32;

        loop {
            let mut request = self.http.request(method.clone(), &url).bearer_auth(&token);
            if method == Method::POST {
                request = request.header(reqwest::header::CONTENT_LENGTH, 0);
            }

            let response = request.send().await.map_err(|e| {
                error!(method = %method, endpoint, error = %e, "Provider request failed");
                ProviderError::Request(e)
            })?;

            let status = response.status();
            match status {
                StatusCode::UNAUTHORIZED if !auth_retried => {
                    warn!(method = %method, endpoint, "Access token rejected (401), refreshing");
                    auth_retried = true;
                    token = self
                        .tokens
                        .refresh(Some(&token), || self.fetch_access_token())
                        .await?;
                }
                StatusCode::UNAUTHORIZED => {
                    error!(method = %method, endpoint, "Still unauthorized after token refresh");
                    return Err(ProviderError::Auth(format!(
                        "{} {} unauthorized after token refresh",
                        method, endpoint
                    )));
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after = response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.trim().parse::<u64>().ok());

                    if !self.retry.allows_retry(rate_limit_retries) {
                        let retry_after_secs = retry_after
                            .unwrap_or_else(|| self.retry.default_retry_after.as_secs());
                        error!(
                            method = %method,
                            endpoint,
                            retries = rate_limit_retries,
                            "Rate limit retry budget exhausted"
                        );
                        return Err(ProviderError::RateLimited { retry_after_secs });
                    }

                    let delay = self.retry.delay_for(rate_limit_retries, retry_after);
                    rate_limit_retries += 1;
                    warn!(
                        method = %method,
                        endpoint,
                        retry_after_secs = ?retry_after,
                        delay_ms = delay.as_millis() as u64,
                        attempt = rate_limit_retries,
                        "Rate limited (429), backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                StatusCode::NO_CONTENT => return Ok(Reply::NoContent),
                s if s.is_success() => {
                    let body = response.text().await?;
                    return Ok(if body.trim().is_empty() {
                        Reply::NoContent
                    } else {
                        Reply::Body(body)
                    });
                }
                s => {
                    let body = response.text().await.unwrap_or_default();
                    error!(method = %method, endpoint, status = s.as_u16(), "Provider returned an error");
                    return Err(ProviderError::Transport {
                        method: method.to_string(),
                        endpoint: endpoint.to_string(),
                        status: s.as_u16(),
                        body,
                    });
                }
            }
        }
    }
}

/// Decode a playback payload, dropping items that are not music tracks
fn decode_playback(body: &str) -> ProviderResult<PlaybackState> {
    let mut value: serde_json::Value = serde_json::from_str(body)?;
    let playing_type = value
        .get("currently_playing_type")
        .and_then(|v| v.as_str())
        .unwrap_or("track")
        .to_string();

    // Local files carry null ids and have no features to fetch
    let local_file = value.get("item").is_some_and(|item| {
        item.get("is_local").and_then(|v| v.as_bool()) == Some(true)
            || item.get("id").is_some_and(|id| id.is_null())
    });

    if (playing_type != "track" || local_file)
        && let Some(obj) = value.as_object_mut()
    {
        debug!(playing_type = %playing_type, local_file, "Current item cannot be evaluated");
        obj.insert("item".into(), serde_json::Value::Null);
    }

    Ok(serde_json::from_value(value)?)
}

#[async_trait]
impl PlaybackProvider for SpotifyClient {
    fn name(&self) -> &'static str {
        "spotify"
    }

    async fn current_playback(&self) -> ProviderResult<Option<PlaybackState>> {
        match self.request(Method::GET, "/me/player").await? {
            Reply::NoContent => Ok(None),
            Reply::Body(body) => decode_playback(&body).map(Some),
        }
    }

    async fn audio_features(&self, track_id: &str) -> ProviderResult<Option<AudioFeatures>> {
        let endpoint = format!("/audio-features/{}", track_id);
        match self.request(Method::GET, &endpoint).await? {
            Reply::NoContent => Ok(None),
            Reply::Body(body) => Ok(Some(serde_json::from_str(&body)?)),
        }
    }

    async fn skip_next(&self) -> ProviderResult<bool> {
        self.request(Method::POST, "/me/player/next").await?;
        Ok(true)
    }

    async fn refresh_access_token(&self) -> ProviderResult<()> {
        let current = self.tokens.current()?;
        self.tokens
            .refresh(current.as_deref(), || self.fetch_access_token())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn episode_items_are_dropped() {
        let body = r#"{
            "timestamp": 1,
            "is_playing": true,
            "progress_ms": 10,
            "currently_playing_type": "episode",
            "item": {"id": "e1", "name": "Podcast", "duration_ms": 1000, "show": {}}
        }"#;
        let state = decode_playback(body).unwrap();
        assert!(state.item.is_none());
        assert!(state.is_playing);
    }

    #[test]
    fn local_files_are_dropped() {
        let body = r#"{
            "timestamp": 1,
            "is_playing": true,
            "currently_playing_type": "track",
            "item": {
                "id": null,
                "name": "ripped.mp3",
                "duration_ms": 1000,
                "is_local": true,
                "uri": "spotify:local:::ripped.mp3:100",
                "artists": [{"id": null, "name": "Unknown"}],
                "album": {"id": null, "name": "", "images": []}
            }
        }"#;
        let state = decode_playback(body).unwrap();
        assert!(state.item.is_none());
        assert!(state.into_playing_track().is_none());
    }

    #[test]
    fn track_items_are_decoded() {
        let body = r#"{
            "timestamp": 1,
            "is_playing": true,
            "currently_playing_type": "track",
            "device": {"id": "d1"},
            "item": {
                "id": "t1",
                "name": "Song",
                "duration_ms": 1000,
                "artists": [{"id": "a1", "name": "Artist"}]
            }
        }"#;
        let state = decode_playback(body).unwrap();
        let track = state.into_playing_track().unwrap();
        assert_eq!(track.id, "t1");
        assert_eq!(track.artist_names(), vec!["Artist".to_string()]);
    }
}
