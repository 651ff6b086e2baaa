//! Playback model as reported by the remote provider

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Numeric descriptors of a track.
///
/// Policies only consult `energy`, `instrumentalness` and `valence`; the
/// remaining descriptors are carried for clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub id: String,
    pub energy: f64,
    pub instrumentalness: f64,
    pub valence: f64,
    #[serde(default)]
    pub danceability: f64,
    #[serde(default)]
    pub tempo: f64,
    #[serde(default)]
    pub loudness: f64,
    #[serde(default)]
    pub speechiness: f64,
    #[serde(default)]
    pub acousticness: f64,
    #[serde(default)]
    pub liveness: f64,
    #[serde(default)]
    pub key: i32,
    #[serde(default)]
    pub mode: i32,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub time_signature: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub external_urls: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    pub height: Option<u32>,
    pub width: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub release_date: Option<String>,
}

/// A track as fetched from the provider.
///
/// Immutable once fetched, except that features may be attached once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub uri: String,
    pub duration_ms: u64,
    #[serde(default)]
    pub explicit: bool,
    #[serde(default)]
    pub popularity: u32,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    #[serde(default)]
    pub album: Option<AlbumRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<AudioFeatures>,
}

impl Track {
    /// Attach features if none are present yet.
    ///
    /// Returns `false` (and leaves the track untouched) when features were
    /// already attached.
    pub fn attach_features(&mut self, features: AudioFeatures) -> bool {
        if self.features.is_some() {
            return false;
        }
        self.features = Some(features);
        true
    }

    pub fn artist_names(&self) -> Vec<String> {
        self.artists.iter().map(|a| a.name.clone()).collect()
    }

    pub fn summary(&self) -> TrackSummary {
        TrackSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            artists: self.artist_names(),
            duration_ms: self.duration_ms,
        }
    }
}

/// Compact view of a track for status reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub duration_ms: u64,
}

/// Current playback state of the remote session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    /// Provider timestamp (unix ms)
    pub timestamp: i64,
    pub is_playing: bool,
    #[serde(default)]
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub item: Option<Track>,
    #[serde(default = "default_playing_type")]
    pub currently_playing_type: String,
}

fn default_playing_type() -> String {
    "track".into()
}

impl PlaybackState {
    /// The track worth evaluating, if any.
    ///
    /// Paused playback or a missing item both count as nothing to evaluate.
    pub fn into_playing_track(self) -> Option<Track> {
        if self.is_playing { self.item } else { None }
    }
}
