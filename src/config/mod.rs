mod file_config;

pub use file_config::{FileConfig, RecommenderConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::embedding::{
    normalize_genre_label, EmbeddingConfig, DEFAULT_TEMPO_MAX, DEFAULT_TEMPO_MIN,
};
use crate::recommender::{CatalogSource, DEFAULT_CATALOG_TTL_SECS, DEFAULT_QUEUE_SIZE};
use crate::session::tracker::DEFAULT_MIN_LISTEN_TIME_SECS;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub metadata_url: Option<String>,
    pub metadata_token: Option<String>,
    pub catalog_path: Option<PathBuf>,
    pub catalog_url: Option<String>,
    pub genre_vocab: Option<String>,
    pub tempo_min: Option<f64>,
    pub tempo_max: Option<f64>,
    pub catalog_ttl_secs: Option<u64>,
    pub queue_size: Option<usize>,
    pub min_listen_time_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub port: u16,
    pub metadata_url: Option<String>,
    pub metadata_token: Option<String>,

    // Recommender settings (with defaults)
    pub recommender: RecommenderSettings,
}

#[derive(Debug, Clone)]
pub struct RecommenderSettings {
    /// Normalized genre vocabulary, order as configured.
    pub genre_vocab: Vec<String>,
    pub tempo_min: f64,
    pub tempo_max: f64,
    pub catalog_source: Option<CatalogSource>,
    pub catalog_ttl_secs: u64,
    pub queue_size: usize,
    pub min_listen_time_secs: u64,
}

impl Default for RecommenderSettings {
    fn default() -> Self {
        Self {
            genre_vocab: Vec::new(),
            tempo_min: DEFAULT_TEMPO_MIN,
            tempo_max: DEFAULT_TEMPO_MAX,
            catalog_source: None,
            catalog_ttl_secs: DEFAULT_CATALOG_TTL_SECS,
            queue_size: DEFAULT_QUEUE_SIZE,
            min_listen_time_secs: DEFAULT_MIN_LISTEN_TIME_SECS,
        }
    }
}

impl RecommenderSettings {
    pub fn embedding_config(&self) -> EmbeddingConfig {
        EmbeddingConfig {
            genre_vocab: self.genre_vocab.clone(),
            tempo_min: self.tempo_min,
            tempo_max: self.tempo_max,
        }
    }

    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_ttl_secs)
    }
}

/// Parse a comma-separated genre vocabulary into normalized labels.
/// Empty entries are dropped.
pub fn parse_genre_vocab(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter(|entry| !entry.trim().is_empty())
        .map(normalize_genre_label)
        .collect()
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        // Validate db_dir exists
        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);
        let metadata_url = file.metadata_url.or_else(|| cli.metadata_url.clone());
        let metadata_token = file.metadata_token.or_else(|| cli.metadata_token.clone());

        let catalog_path = file
            .catalog_path
            .map(PathBuf::from)
            .or_else(|| cli.catalog_path.clone());
        let catalog_url = file.catalog_url.or_else(|| cli.catalog_url.clone());
        // A local path takes precedence over a remote URL when both are set.
        let catalog_source = match (catalog_path, catalog_url) {
            (Some(path), _) => Some(CatalogSource::File(path)),
            (None, Some(url)) => Some(CatalogSource::Http(url)),
            (None, None) => None,
        };

        let rec_file = file.recommender.unwrap_or_default();
        let genre_vocab = rec_file
            .genre_vocab
            .or_else(|| cli.genre_vocab.clone())
            .map(|raw| parse_genre_vocab(&raw))
            .unwrap_or_default();

        let tempo_min = rec_file
            .tempo_min
            .or(cli.tempo_min)
            .unwrap_or(DEFAULT_TEMPO_MIN);
        let tempo_max = rec_file
            .tempo_max
            .or(cli.tempo_max)
            .unwrap_or(DEFAULT_TEMPO_MAX);
        let (tempo_min, tempo_max) = if tempo_max <= tempo_min {
            warn!(
                "Configured tempo bounds ({}, {}) are degenerate; using defaults",
                tempo_min, tempo_max
            );
            (DEFAULT_TEMPO_MIN, DEFAULT_TEMPO_MAX)
        } else {
            (tempo_min, tempo_max)
        };

        let recommender = RecommenderSettings {
            genre_vocab,
            tempo_min,
            tempo_max,
            catalog_source,
            catalog_ttl_secs: rec_file
                .catalog_ttl_secs
                .or(cli.catalog_ttl_secs)
                .unwrap_or(DEFAULT_CATALOG_TTL_SECS),
            queue_size: rec_file
                .queue_size
                .or(cli.queue_size)
                .unwrap_or(DEFAULT_QUEUE_SIZE),
            min_listen_time_secs: rec_file
                .min_listen_time_secs
                .or(cli.min_listen_time_secs)
                .unwrap_or(DEFAULT_MIN_LISTEN_TIME_SECS),
        };

        Ok(Self {
            db_dir,
            port,
            metadata_url,
            metadata_token,
            recommender,
        })
    }

    pub fn profile_db_path(&self) -> PathBuf {
        self.db_dir.join("profiles.db")
    }
}
