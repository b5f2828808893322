use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Instant;
use std::{fmt::Debug, path::PathBuf};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
use config::{AppConfig, CliConfig, FileConfig};

mod embedding;

mod ingest;
use ingest::EventIngestor;

mod metadata;
use metadata::{HttpMetadataProvider, MetadataProvider, NoopMetadataProvider};

mod profile;
use profile::SqliteProfileStore;

mod recommender;
use recommender::{CatalogIndexLoader, Recommender};

mod server;
use server::{run_server, ServerState};

mod session;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding the profile database.
    #[clap(value_parser = parse_path)]
    pub db_dir: PathBuf,

    /// Path to an optional TOML config file. File values override CLI values.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// Base URL of the track metadata service.
    #[clap(long)]
    pub metadata_url: Option<String>,

    /// Bearer token for the track metadata service.
    #[clap(long)]
    pub metadata_token: Option<String>,

    /// Path to a local catalog snapshot file (JSON).
    #[clap(long, value_parser = parse_path)]
    pub catalog_path: Option<PathBuf>,

    /// URL of a remote catalog snapshot (JSON). Ignored if --catalog-path is set.
    #[clap(long)]
    pub catalog_url: Option<String>,

    /// Comma-separated genre vocabulary used for embeddings.
    #[clap(long)]
    pub genre_vocab: Option<String>,

    /// Lower tempo bound for embedding normalization.
    #[clap(long)]
    pub tempo_min: Option<f64>,

    /// Upper tempo bound for embedding normalization.
    #[clap(long)]
    pub tempo_max: Option<f64>,

    /// Seconds a loaded catalog snapshot stays cached.
    #[clap(long)]
    pub catalog_ttl_secs: Option<u64>,

    /// Default recommendation queue size.
    #[clap(long)]
    pub queue_size: Option<usize>,

    /// Seconds a track must play before it counts as completed.
    #[clap(long)]
    pub min_listen_time_secs: Option<u64>,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_dir: Some(self.db_dir.clone()),
            port: self.port,
            metadata_url: self.metadata_url.clone(),
            metadata_token: self.metadata_token.clone(),
            catalog_path: self.catalog_path.clone(),
            catalog_url: self.catalog_url.clone(),
            genre_vocab: self.genre_vocab.clone(),
            tempo_min: self.tempo_min,
            tempo_max: self.tempo_max,
            catalog_ttl_secs: self.catalog_ttl_secs,
            queue_size: self.queue_size,
            min_listen_time_secs: self.min_listen_time_secs,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!(
        "Opening SQLite profile database at {:?}...",
        config.profile_db_path()
    );
    let profile_store = Arc::new(SqliteProfileStore::new(&config.profile_db_path())?);

    let metadata_provider: Arc<dyn MetadataProvider> = match &config.metadata_url {
        Some(url) => {
            info!("Metadata service configured at {}", url);
            Arc::new(HttpMetadataProvider::new(
                url.clone(),
                config.metadata_token.clone(),
            )?)
        }
        None => {
            warn!("No metadata service configured; plays will be recorded without taste stats");
            Arc::new(NoopMetadataProvider)
        }
    };

    let settings = &config.recommender;
    match &settings.catalog_source {
        Some(source) => info!("Catalog source: {}", source),
        None => warn!("No catalog source configured; recommendations will be empty"),
    }
    let catalog = Arc::new(CatalogIndexLoader::new(
        settings.catalog_source.clone(),
        settings.catalog_ttl(),
    ));

    let embedding_config = settings.embedding_config();
    let ingestor = Arc::new(EventIngestor::new(
        profile_store.clone(),
        metadata_provider,
        embedding_config.clone(),
    ));
    let recommender = Arc::new(Recommender::new(
        profile_store.clone(),
        catalog,
        embedding_config,
    ));

    let state = ServerState {
        start_time: Instant::now(),
        hash: env!("GIT_HASH").to_string(),
        profile_store,
        ingestor,
        recommender,
        default_queue_size: settings.queue_size,
    };

    info!("Ready to serve at port {}!", config.port);
    run_server(state, config.port).await
}
