//! Shared fixtures for integration tests.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use tunewise_taste_server::metadata::{
    ArtistInfo, AudioFeatures, MetadataProvider, TrackMetadata,
};

/// Metadata provider answering from a fixed in-memory table.
pub struct StaticMetadataProvider {
    tracks: HashMap<String, TrackMetadata>,
}

impl StaticMetadataProvider {
    pub fn new() -> Self {
        Self {
            tracks: HashMap::new(),
        }
    }

    pub fn with_track(
        mut self,
        track_id: &str,
        artist_id: &str,
        genres: &[&str],
        features: AudioFeatures,
    ) -> Self {
        self.tracks.insert(
            track_id.to_string(),
            TrackMetadata {
                audio_features: features,
                genres: genres.iter().map(|g| g.to_string()).collect(),
                artist: ArtistInfo {
                    id: artist_id.to_string(),
                    name: format!("artist {}", artist_id),
                },
            },
        );
        self
    }

    pub fn into_arc(self) -> Arc<dyn MetadataProvider> {
        Arc::new(self)
    }
}

#[async_trait]
impl MetadataProvider for StaticMetadataProvider {
    async fn fetch(&self, track_id: &str) -> Result<TrackMetadata> {
        self.tracks
            .get(track_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown track {}", track_id))
    }
}

pub fn features(danceability: f64, energy: f64, tempo: f64) -> AudioFeatures {
    AudioFeatures {
        danceability,
        energy,
        valence: 0.5,
        acousticness: 0.5,
        tempo,
    }
}

/// Write a catalog snapshot to a temp file and return its handle.
pub fn write_catalog_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}
