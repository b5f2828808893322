use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub port: Option<u16>,
    pub metadata_url: Option<String>,
    pub metadata_token: Option<String>,
    pub catalog_path: Option<String>,
    pub catalog_url: Option<String>,

    // Feature configs
    pub recommender: Option<RecommenderConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RecommenderConfig {
    /// Comma-separated genre vocabulary, e.g. "indie rock,jazz,synth pop"
    pub genre_vocab: Option<String>,
    pub tempo_min: Option<f64>,
    pub tempo_max: Option<f64>,
    pub catalog_ttl_secs: Option<u64>,
    pub queue_size: Option<usize>,
    pub min_listen_time_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
