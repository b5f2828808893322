//! Recommendation ranker.
//!
//! Scores every eligible catalog item against the user embedding by cosine
//! similarity and maintains the per-user recommendation queue. A queue is
//! only reused while it is fresh: ranked under the profile's current
//! embedding version and no older than the embedding itself. Every fallback
//! returns a best-effort queue; no failure propagates to the caller.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use rayon::prelude::*;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::embedding::{build_user_embedding, EmbeddingConfig, EMBEDDING_VERSION};
use crate::profile::{ProfileStore, QueueUpdate, UserProfile};

use super::catalog_index::{CatalogIndexLoader, ItemVector};

/// Default number of tracks in a recommendation queue.
pub const DEFAULT_QUEUE_SIZE: usize = 10;

/// The user vector a ranking pass runs against: either the embedding stored
/// on the profile, or one computed on the fly because none was stored.
enum UserVector {
    Stored(Vec<f64>),
    Computed(Vec<f64>),
}

impl UserVector {
    fn as_slice(&self) -> &[f64] {
        match self {
            UserVector::Stored(vector) | UserVector::Computed(vector) => vector,
        }
    }
}

/// Cosine similarity between two vectors.
///
/// Returns 0 for mismatched lengths or zero-norm vectors; degenerate input
/// never panics.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Rank catalog items by similarity to the user vector, best first.
///
/// Excluded ids and items whose vector length does not match the user vector
/// are skipped. The sort is stable on descending score, so ties keep catalog
/// iteration order.
pub fn rank_items(
    user_vector: &[f64],
    items: &[ItemVector],
    exclude_ids: &HashSet<String>,
    limit: usize,
) -> Vec<String> {
    let mut scored: Vec<(f64, usize)> = items
        .par_iter()
        .enumerate()
        .filter_map(|(index, item)| {
            if exclude_ids.contains(&item.item_id) {
                return None;
            }
            if item.vector.len() != user_vector.len() {
                return None;
            }
            Some((cosine_similarity(user_vector, &item.vector), index))
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored
        .into_iter()
        .take(limit)
        .map(|(_, index)| items[index].item_id.clone())
        .collect()
}

/// Produces and persists per-user recommendation queues.
pub struct Recommender {
    profile_store: Arc<dyn ProfileStore>,
    catalog: Arc<CatalogIndexLoader>,
    embedding_config: EmbeddingConfig,
}

impl Recommender {
    pub fn new(
        profile_store: Arc<dyn ProfileStore>,
        catalog: Arc<CatalogIndexLoader>,
        embedding_config: EmbeddingConfig,
    ) -> Self {
        Self {
            profile_store,
            catalog,
            embedding_config,
        }
    }

    /// Return the recommendation queue for a user, recomputing it when the
    /// stored one is stale or too short.
    ///
    /// Never fails: an absent profile yields an empty queue, an unavailable
    /// catalog yields the existing queue truncated to size, and a failed
    /// persistence still returns the freshly ranked queue.
    pub async fn get_queue(&self, user_id: &str, queue_size: usize) -> Vec<String> {
        let request_id = Uuid::new_v4().simple().to_string();

        let profile = match self.profile_store.get_profile(user_id) {
            Ok(Some(profile)) => profile,
            Ok(None) => return Vec::new(),
            Err(e) => {
                error!(
                    "Failed to fetch profile. request_id={} user_id={} error={:#}",
                    request_id, user_id, e
                );
                return Vec::new();
            }
        };

        let mut existing_queue = profile.recommendation_queue.clone();
        let embedding_version = profile
            .embedding_version()
            .unwrap_or(EMBEDDING_VERSION)
            .to_string();
        let embedding_updated_at = profile.embedding_updated_at();

        let queue_is_fresh = profile.queue_embedding_version == embedding_version
            && profile.queue_embedding_ts >= embedding_updated_at
            && existing_queue.len() >= queue_size;
        if queue_is_fresh {
            info!(
                "Returning cached recommendation queue. request_id={} user_id={} queue_size={}",
                request_id,
                user_id,
                existing_queue.len()
            );
            existing_queue.truncate(queue_size);
            return existing_queue;
        }

        // A queue ranked under an older embedding must not be mixed with
        // items ranked under the current one.
        if profile.queue_embedding_version != embedding_version
            || profile.queue_embedding_ts < embedding_updated_at
        {
            existing_queue.clear();
        }

        let user_vector = self.resolve_user_vector(&profile, &request_id);

        let index = match self.catalog.load().await {
            Some(index) if !index.items.is_empty() => index,
            _ => {
                warn!(
                    "Catalog unavailable or empty; returning existing queue. request_id={} user_id={}",
                    request_id, user_id
                );
                existing_queue.truncate(queue_size);
                return existing_queue;
            }
        };

        let mut exclude_ids: HashSet<String> = profile
            .recent_history
            .track_ids()
            .map(|id| id.to_string())
            .collect();
        exclude_ids.extend(existing_queue.iter().cloned());

        let candidates = rank_items(
            user_vector.as_slice(),
            &index.items,
            &exclude_ids,
            (queue_size * 2).max(queue_size),
        );

        let mut new_queue = existing_queue;
        new_queue.extend(candidates);
        new_queue.truncate(queue_size);

        let update = QueueUpdate {
            queue: new_queue.clone(),
            queue_updated_at: Utc::now().timestamp() as u64,
            queue_embedding_version: embedding_version,
            queue_embedding_ts: embedding_updated_at,
        };
        if let Err(e) = self.profile_store.update_queue(user_id, &update) {
            error!(
                "Failed to persist recommendation queue. request_id={} user_id={} error={:#}",
                request_id, user_id, e
            );
        }

        info!(
            "Generated recommendation queue. request_id={} user_id={} queue_size={}",
            request_id,
            user_id,
            new_queue.len()
        );
        new_queue
    }

    /// Prefer the embedding stored on the profile; compute one on demand
    /// when it is missing, which indicates the stats engine did not run as
    /// expected for this user.
    fn resolve_user_vector(&self, profile: &UserProfile, request_id: &str) -> UserVector {
        match &profile.user_embedding {
            Some(embedding) => UserVector::Stored(embedding.vector.clone()),
            None => {
                let (vector, meta) = build_user_embedding(
                    profile,
                    &self.embedding_config.genre_vocab,
                    self.embedding_config.tempo_min,
                    self.embedding_config.tempo_max,
                );
                warn!(
                    "User embedding missing in profile; computed on the fly. request_id={} user_id={} embedding_version={}",
                    request_id, profile.user_id, meta.embedding_version
                );
                UserVector::Computed(vector)
            }
        }
    }
}
