//! User taste profile models.
//!
//! The profile is a single durable document per user, mutated by the stats
//! engine on every track event and by the recommender when it persists a new
//! queue. All fields default so documents written by older builds still load.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingMeta;
use crate::session::TrackStatus;

/// Number of entries kept in the recent listening history.
pub const RECENT_HISTORY_CAPACITY: usize = 20;

/// Running per-feature averages over completed tracks.
///
/// `samples` counts the completed tracks that contributed features; it
/// increments by exactly one per completed event and never on a skip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioProfile {
    pub avg_danceability: f64,
    pub avg_energy: f64,
    pub avg_valence: f64,
    pub avg_acousticness: f64,
    pub avg_tempo: f64,
    pub samples: u64,
}

/// Occurrence counter for one artist, kept in first-seen order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistAffinity {
    pub artist_id: String,
    pub name: String,
    pub affinity: u64,
    pub last_played_ts: u64,
}

/// One entry of the recent listening history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub track_id: String,
    pub status: TrackStatus,
    pub ts: u64,
}

/// Fixed-capacity listening history, newest first.
///
/// Insertion evicts from the back once the capacity is reached, so the
/// buffer can never exceed [`RECENT_HISTORY_CAPACITY`] entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecentHistory {
    entries: VecDeque<HistoryEntry>,
}

impl RecentHistory {
    pub fn record(&mut self, entry: HistoryEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(RECENT_HISTORY_CAPACITY);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries newest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn track_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.track_id.as_str())
    }
}

/// A user embedding vector together with the layout it was built under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEmbedding {
    pub vector: Vec<f64>,
    pub version: String,
    pub meta: EmbeddingMeta,
    pub updated_at: u64,
}

/// The durable per-user taste profile document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub user_id: String,
    pub created_at: u64,
    pub updated_at: u64,
    pub last_event_ts: u64,
    pub audio_profile: AudioProfile,
    /// Genre label (normalized) -> occurrence count.
    pub genre_affinity: BTreeMap<String, u64>,
    pub artist_affinity: Vec<ArtistAffinity>,
    pub recent_history: RecentHistory,
    pub total_tracks_played: u64,
    pub total_completions: u64,
    pub total_skips: u64,
    pub user_embedding: Option<UserEmbedding>,
    pub recommendation_queue: Vec<String>,
    pub queue_updated_at: u64,
    /// Embedding version the stored queue was ranked under.
    pub queue_embedding_version: String,
    /// Profile-embedding timestamp the stored queue was ranked against.
    pub queue_embedding_ts: u64,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self::new("", 0)
    }
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>, now: u64) -> Self {
        Self {
            user_id: user_id.into(),
            created_at: now,
            updated_at: now,
            last_event_ts: now,
            audio_profile: AudioProfile::default(),
            genre_affinity: BTreeMap::new(),
            artist_affinity: Vec::new(),
            recent_history: RecentHistory::default(),
            total_tracks_played: 0,
            total_completions: 0,
            total_skips: 0,
            user_embedding: None,
            recommendation_queue: Vec::new(),
            queue_updated_at: 0,
            queue_embedding_version: String::new(),
            queue_embedding_ts: 0,
        }
    }

    /// Version tag of the stored embedding, if one exists.
    pub fn embedding_version(&self) -> Option<&str> {
        self.user_embedding.as_ref().map(|e| e.version.as_str())
    }

    /// Timestamp the stored embedding was generated at, 0 when absent.
    pub fn embedding_updated_at(&self) -> u64 {
        self.user_embedding.as_ref().map(|e| e.updated_at).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entry(track_id: &str, ts: u64) -> HistoryEntry {
        HistoryEntry {
            track_id: track_id.to_string(),
            status: TrackStatus::Completed,
            ts,
        }
    }

    #[test]
    fn test_recent_history_is_bounded_and_newest_first() {
        let mut history = RecentHistory::default();
        for i in 0..30 {
            history.record(make_entry(&format!("t{}", i), i));
        }
        assert_eq!(history.len(), RECENT_HISTORY_CAPACITY);
        let ids: Vec<&str> = history.track_ids().collect();
        assert_eq!(ids[0], "t29");
        assert_eq!(ids[RECENT_HISTORY_CAPACITY - 1], "t10");
    }

    #[test]
    fn test_profile_roundtrips_through_json() {
        let mut profile = UserProfile::new("user-1", 1000);
        profile.genre_affinity.insert("indie_rock".to_string(), 3);
        profile.recent_history.record(make_entry("t1", 1000));
        profile.recommendation_queue = vec!["t2".to_string(), "t3".to_string()];

        let json = serde_json::to_string(&profile).unwrap();
        let decoded: UserProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.user_id, "user-1");
        assert_eq!(decoded.genre_affinity.get("indie_rock"), Some(&3));
        assert_eq!(decoded.recent_history.len(), 1);
        assert_eq!(decoded.recommendation_queue.len(), 2);
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        // A document written before queue tagging existed still loads.
        let json = r#"{"user_id":"user-1","created_at":5,"total_tracks_played":2}"#;
        let decoded: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(decoded.user_id, "user-1");
        assert_eq!(decoded.total_tracks_played, 2);
        assert!(decoded.user_embedding.is_none());
        assert_eq!(decoded.queue_embedding_version, "");
        assert!(decoded.recent_history.is_empty());
    }
}
