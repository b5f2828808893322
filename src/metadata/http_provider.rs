//! HTTP client for the external track metadata service.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::provider::{ArtistInfo, AudioFeatures, MetadataProvider, TrackMetadata};

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Metadata provider backed by an HTTP metadata service.
///
/// Expects `GET {base_url}/v1/tracks/{id}/metadata` to return audio features,
/// artist info and genre labels as JSON. Request timeouts are owned by this
/// client; the caller treats any failure as terminal for that attempt.
pub struct HttpMetadataProvider {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

#[derive(Deserialize)]
struct MetadataResponse {
    audio_features: Option<AudioFeatures>,
    genres: Option<Vec<String>>,
    artist: Option<WireArtist>,
}

#[derive(Deserialize)]
struct WireArtist {
    id: Option<String>,
    name: Option<String>,
}

impl HttpMetadataProvider {
    pub fn new(base_url: String, bearer_token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;
        let base_url = base_url.trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            bearer_token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl MetadataProvider for HttpMetadataProvider {
    async fn fetch(&self, track_id: &str) -> Result<TrackMetadata> {
        let url = format!("{}/v1/tracks/{}/metadata", self.base_url, track_id);
        let mut request = self.client.get(&url);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .context("Failed to connect to metadata service")?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Metadata fetch for track {} failed with status {}",
                track_id,
                response.status()
            );
        }

        let body: MetadataResponse = response
            .json()
            .await
            .context("Failed to parse metadata response")?;

        let artist = body
            .artist
            .and_then(|a| {
                let id = a.id?;
                let name = a.name.unwrap_or_default();
                Some(ArtistInfo { id, name })
            })
            .with_context(|| format!("Metadata for track {} is missing artist id", track_id))?;

        Ok(TrackMetadata {
            audio_features: body.audio_features.unwrap_or_default(),
            genres: body.genres.unwrap_or_default(),
            artist,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation_strips_trailing_slash() {
        let provider = HttpMetadataProvider::new("http://localhost:8080/".to_string(), None).unwrap();
        assert_eq!(provider.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_response_decoding_tolerates_missing_fields() {
        let body: MetadataResponse = serde_json::from_str(
            r#"{"artist": {"id": "a1"}, "audio_features": {"tempo": 120.0}}"#,
        )
        .unwrap();
        assert_eq!(body.audio_features.unwrap().tempo, 120.0);
        assert!(body.genres.is_none());
        assert_eq!(body.artist.unwrap().id.unwrap(), "a1");
    }
}
