//! Provider trait

use async_trait::async_trait;
use syncstream_api::{AudioFeatures, PlaybackState};

use crate::ProviderResult;

/// Remote playback provider - implemented by the real client and the mock
#[async_trait]
pub trait PlaybackProvider: Send + Sync {
    /// Short name for logs and health reports
    fn name(&self) -> &'static str;

    /// Current playback state; `None` when nothing is playing on any device
    async fn current_playback(&self) -> ProviderResult<Option<PlaybackState>>;

    /// Audio features for a track; `None` when the provider has none
    async fn audio_features(&self, track_id: &str) -> ProviderResult<Option<AudioFeatures>>;

    /// Skip to the next track on the active device
    async fn skip_next(&self) -> ProviderResult<bool>;

    /// Replace the cached access token
    async fn refresh_access_token(&self) -> ProviderResult<()> {
        Ok(())
    }
}
