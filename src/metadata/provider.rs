//! Track metadata provider seam.
//!
//! The provider supplies per-track audio features and artist genres. A fetch
//! failure is never fatal to the caller: the stats engine records the play
//! and leaves the taste stats unchanged.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Audio features of a single track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioFeatures {
    pub danceability: f64,
    pub energy: f64,
    pub valence: f64,
    pub acousticness: f64,
    pub tempo: f64,
}

/// The primary artist of a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistInfo {
    pub id: String,
    pub name: String,
}

/// Everything the stats engine needs to know about a played track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub audio_features: AudioFeatures,
    /// Raw genre labels as reported by the provider; normalization happens
    /// in the stats engine.
    pub genres: Vec<String>,
    pub artist: ArtistInfo,
}

#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Fetch audio features and artist genres for a track.
    /// Returns Err when the provider is unreachable or the track is unknown.
    async fn fetch(&self, track_id: &str) -> Result<TrackMetadata>;
}

/// Provider used when no metadata endpoint is configured.
///
/// Every fetch fails, so plays are recorded without taste-stat updates.
pub struct NoopMetadataProvider;

#[async_trait]
impl MetadataProvider for NoopMetadataProvider {
    async fn fetch(&self, track_id: &str) -> Result<TrackMetadata> {
        anyhow::bail!("Metadata provider is not configured (track {})", track_id)
    }
}
