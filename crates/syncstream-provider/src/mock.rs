//! Mock provider for local runs and testing

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use syncstream_api::{AlbumRef, ArtistRef, AudioFeatures, Image, PlaybackState, Track};

use crate::{PlaybackProvider, ProviderError, ProviderResult};

pub const MOCK_FOCUS_TRACK_ID: &str = "mock_id_focus";
pub const MOCK_NOISE_TRACK_ID: &str = "mock_id_noise";

#[derive(Default)]
struct MockScript {
    /// Overrides the alternating playback when set
    playback: Option<Option<PlaybackState>>,
    /// Per-track feature overrides; `None` means "provider has no features"
    features: HashMap<String, Option<AudioFeatures>>,
    fail_playback: Option<String>,
    fail_features: Option<String>,
    fail_skip: Option<String>,
}

/// Deterministic stand-in for the remote provider.
///
/// Unscripted, it alternates between an instrumental low-energy track and
/// a loud vocal track on every playback poll. Tests script exact states,
/// features and failures instead.
pub struct MockProvider {
    script: Mutex<MockScript>,
    polls: AtomicU64,
    feature_calls: AtomicU32,
    skips: AtomicU32,
    refreshes: AtomicU32,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(MockScript::default()),
            polls: AtomicU64::new(0),
            feature_calls: AtomicU32::new(0),
            skips: AtomicU32::new(0),
            refreshes: AtomicU32::new(0),
        }
    }

    fn script(&self) -> MutexGuard<'_, MockScript> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Pin the playback state returned by every poll
    pub fn set_playback(&self, state: Option<PlaybackState>) {
        self.script().playback = Some(state);
    }

    /// Pin the features returned for one track
    pub fn set_features(&self, track_id: &str, features: Option<AudioFeatures>) {
        self.script().features.insert(track_id.to_string(), features);
    }

    pub fn fail_playback(&self, message: Option<&str>) {
        self.script().fail_playback = message.map(String::from);
    }

    pub fn fail_features(&self, message: Option<&str>) {
        self.script().fail_features = message.map(String::from);
    }

    pub fn fail_skip(&self, message: Option<&str>) {
        self.script().fail_skip = message.map(String::from);
    }

    pub fn skip_count(&self) -> u32 {
        self.skips.load(Ordering::SeqCst)
    }

    pub fn feature_calls(&self) -> u32 {
        self.feature_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_count(&self) -> u32 {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// A playing state around `track`
    pub fn playing(track: Track) -> PlaybackState {
        PlaybackState {
            timestamp: 1_736_240_427_000,
            is_playing: true,
            progress_ms: Some(45_000),
            item: Some(track),
            currently_playing_type: "track".into(),
        }
    }

    pub fn track(id: &str, name: &str) -> Track {
        Track {
            id: id.to_string(),
            name: name.to_string(),
            uri: format!("spotify:track:{}", id),
            duration_ms: 210_000,
            explicit: false,
            popularity: 85,
            artists: vec![ArtistRef {
                id: "artist_1".into(),
                name: "The SyncStream Architect".into(),
                external_urls: HashMap::new(),
            }],
            album: Some(AlbumRef {
                id: "album_1".into(),
                name: "Architecture Vol 1".into(),
                images: vec![Image {
                    url: "https://placehold.co/640x640".into(),
                    height: Some(640),
                    width: Some(640),
                }],
                release_date: None,
            }),
            features: None,
        }
    }

    /// Features of the instrumental, low-energy mock track
    pub fn focus_features(track_id: &str) -> AudioFeatures {
        AudioFeatures {
            id: track_id.to_string(),
            instrumentalness: 0.85,
            energy: 0.3,
            valence: 0.4,
            danceability: 0.2,
            tempo: 110.0,
            loudness: -12.5,
            speechiness: 0.02,
            acousticness: 0.7,
            ..Default::default()
        }
    }

    /// Features of the vocal, high-energy mock track
    pub fn noise_features(track_id: &str) -> AudioFeatures {
        AudioFeatures {
            id: track_id.to_string(),
            instrumentalness: 0.05,
            energy: 0.88,
            valence: 0.8,
            danceability: 0.75,
            tempo: 140.0,
            loudness: -5.2,
            speechiness: 0.1,
            acousticness: 0.1,
            ..Default::default()
        }
    }
}

#[async_trait]
impl PlaybackProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn current_playback(&self) -> ProviderResult<Option<PlaybackState>> {
        let poll = self.polls.fetch_add(1, Ordering::SeqCst);
        let script = self.script();

        if let Some(message) = &script.fail_playback {
            return Err(ProviderError::Injected(message.clone()));
        }
        if let Some(state) = &script.playback {
            return Ok(state.clone());
        }

        let track = if poll % 2 == 0 {
            Self::track(MOCK_FOCUS_TRACK_ID, "Deep Work Focus")
        } else {
            Self::track(MOCK_NOISE_TRACK_ID, "High Energy Vocal Mix")
        };
        Ok(Some(Self::playing(track)))
    }

    async fn audio_features(&self, track_id: &str) -> ProviderResult<Option<AudioFeatures>> {
        self.feature_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.script();

        if let Some(message) = &script.fail_features {
            return Err(ProviderError::Injected(message.clone()));
        }
        if let Some(features) = script.features.get(track_id) {
            return Ok(features.clone());
        }

        if track_id.contains("focus") {
            Ok(Some(Self::focus_features(track_id)))
        } else {
            Ok(Some(Self::noise_features(track_id)))
        }
    }

    async fn skip_next(&self) -> ProviderResult<bool> {
        if let Some(message) = &self.script().fail_skip {
            return Err(ProviderError::Injected(message.clone()));
        }
        self.skips.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn refresh_access_token(&self) -> ProviderResult<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
