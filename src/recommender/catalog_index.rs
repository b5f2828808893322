//! Catalog index loader.
//!
//! Loads the item-vector snapshot from a local file or an HTTP object URL,
//! normalizes heterogeneous payload shapes, and memoizes the result with a
//! TTL. The clock is injected so tests control time; a fetch or parse
//! failure returns no payload and never replaces a previously cached
//! snapshot with a failure.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{error, info, warn};

/// Default time-to-live of a cached catalog snapshot.
pub const DEFAULT_CATALOG_TTL_SECS: u64 = 300;

/// One candidate item of the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemVector {
    pub item_id: String,
    pub vector: Vec<f64>,
    pub artist_id: Option<String>,
}

/// An immutable catalog snapshot, shared read-only between callers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogIndex {
    pub items: Vec<ItemVector>,
    pub feature_order: Vec<String>,
}

/// Where the catalog payload comes from.
#[derive(Debug, Clone)]
pub enum CatalogSource {
    File(PathBuf),
    Http(String),
}

impl std::fmt::Display for CatalogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogSource::File(path) => write!(f, "{}", path.display()),
            CatalogSource::Http(url) => write!(f, "{}", url),
        }
    }
}

type NowFn = Box<dyn Fn() -> Instant + Send + Sync>;

struct CachedIndex {
    loaded_at: Instant,
    index: Arc<CatalogIndex>,
}

/// TTL-cached loader for the catalog snapshot.
pub struct CatalogIndexLoader {
    source: Option<CatalogSource>,
    ttl: Duration,
    client: reqwest::Client,
    now: NowFn,
    cache: Mutex<Option<CachedIndex>>,
}

impl CatalogIndexLoader {
    pub fn new(source: Option<CatalogSource>, ttl: Duration) -> Self {
        Self::with_clock(source, ttl, Box::new(Instant::now))
    }

    /// Loader with an injected clock, for tests that control time.
    pub fn with_clock(source: Option<CatalogSource>, ttl: Duration, now: NowFn) -> Self {
        Self {
            source,
            ttl,
            client: reqwest::Client::new(),
            now,
            cache: Mutex::new(None),
        }
    }

    /// Return the catalog snapshot, from cache when it is still fresh.
    ///
    /// Returns None when no source is configured or the fetch/parse failed;
    /// the caller falls back to whatever queue it already has.
    pub async fn load(&self) -> Option<Arc<CatalogIndex>> {
        {
            let cache = self.cache.lock().unwrap();
            if let Some(cached) = cache.as_ref() {
                if (self.now)().duration_since(cached.loaded_at) < self.ttl {
                    return Some(Arc::clone(&cached.index));
                }
            }
        }

        let source = match &self.source {
            Some(source) => source,
            None => {
                warn!("Catalog source is not configured; no items to rank");
                return None;
            }
        };

        let payload = match self.fetch_payload(source).await {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to load catalog from {}: {:#}", source, e);
                return None;
            }
        };

        let index = match normalize_catalog_payload(&payload) {
            Some(index) => Arc::new(index),
            None => {
                error!("Unsupported catalog payload format from {}", source);
                return None;
            }
        };

        info!(
            "Loaded catalog snapshot from {} ({} items)",
            source,
            index.items.len()
        );
        let mut cache = self.cache.lock().unwrap();
        *cache = Some(CachedIndex {
            loaded_at: (self.now)(),
            index: Arc::clone(&index),
        });
        Some(index)
    }

    async fn fetch_payload(&self, source: &CatalogSource) -> Result<Value> {
        match source {
            CatalogSource::File(path) => {
                let content = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read catalog file {:?}", path))?;
                serde_json::from_str(&content).context("Failed to parse catalog file as JSON")
            }
            CatalogSource::Http(url) => {
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .context("Failed to fetch catalog")?;
                if !response.status().is_success() {
                    anyhow::bail!("Catalog fetch failed with status {}", response.status());
                }
                response
                    .json()
                    .await
                    .context("Failed to parse catalog response as JSON")
            }
        }
    }
}

/// Normalize a raw payload into a catalog index.
///
/// Accepts either a bare list of items or an object with `items` and an
/// optional `feature_order`. Items missing an id or a non-list vector are
/// dropped silently; non-numeric vector entries read as 0.
fn normalize_catalog_payload(payload: &Value) -> Option<CatalogIndex> {
    let (raw_items, feature_order) = match payload {
        Value::Object(object) => {
            let items = object.get("items")?.as_array()?;
            let feature_order = object
                .get("feature_order")
                .and_then(|v| v.as_array())
                .map(|entries| {
                    entries
                        .iter()
                        .filter_map(|entry| entry.as_str().map(|s| s.to_string()))
                        .collect()
                })
                .unwrap_or_default();
            (items, feature_order)
        }
        Value::Array(items) => (items, Vec::new()),
        _ => return None,
    };

    let items = raw_items
        .iter()
        .filter_map(|raw| {
            let object = raw.as_object()?;
            let item_id = object
                .get("item_id")
                .or_else(|| object.get("track_id"))
                .and_then(|v| v.as_str())
                .filter(|id| !id.is_empty())?;
            let vector = object
                .get("vector")?
                .as_array()?
                .iter()
                .map(|entry| entry.as_f64().unwrap_or(0.0))
                .collect();
            let artist_id = object
                .get("artist_id")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            Some(ItemVector {
                item_id: item_id.to_string(),
                vector,
                artist_id,
            })
        })
        .collect();

    Some(CatalogIndex {
        items,
        feature_order,
    })
}
