//! User embedding builder.
//!
//! Converts a profile's aggregated stats into a versioned, fixed-order
//! numeric vector: five audio features followed by one genre-share entry per
//! vocabulary genre. The builder is a pure function of the profile and the
//! vocabulary/tempo configuration, so the same inputs always produce a
//! bit-identical vector.

use serde::{Deserialize, Serialize};

use crate::profile::UserProfile;

/// Version tag describing the embedding feature layout.
pub const EMBEDDING_VERSION: &str = "v1";

pub const DEFAULT_TEMPO_MIN: f64 = 50.0;
pub const DEFAULT_TEMPO_MAX: f64 = 200.0;

/// Fixed order of the base audio features.
pub const BASE_FEATURE_ORDER: [&str; 5] = [
    "danceability",
    "energy",
    "valence",
    "acousticness",
    "tempo_normalized",
];

/// Layout metadata recorded alongside every built vector.
///
/// A ranking pass compares this against the current configuration to detect
/// vectors built under a different vocabulary or tempo bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMeta {
    pub embedding_version: String,
    pub feature_order: Vec<String>,
    pub genre_vocab: Vec<String>,
    pub tempo_min: f64,
    pub tempo_max: f64,
}

/// Vocabulary and tempo bounds the builder runs under.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Normalized genre labels, order fixed by configuration.
    pub genre_vocab: Vec<String>,
    pub tempo_min: f64,
    pub tempo_max: f64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            genre_vocab: Vec::new(),
            tempo_min: DEFAULT_TEMPO_MIN,
            tempo_max: DEFAULT_TEMPO_MAX,
        }
    }
}

/// Normalize a genre label for use as an affinity key or vocabulary entry.
pub fn normalize_genre_label(label: &str) -> String {
    label.trim().replace(' ', "_")
}

/// Min-max scale a value into [0, 1].
pub fn normalize_min_max(value: f64, min_value: f64, max_value: f64) -> f64 {
    if max_value <= min_value {
        return 0.0;
    }
    ((value - min_value) / (max_value - min_value)).clamp(0.0, 1.0)
}

/// Build the user embedding vector and its layout metadata.
///
/// Base vector order is [`BASE_FEATURE_ORDER`]; missing averages read as 0.
/// Tempo is min-max normalized, falling back to the default bounds when the
/// configured bounds are degenerate. Each vocabulary genre contributes its
/// share of the profile's total genre count, or 0 when the total is zero.
pub fn build_user_embedding(
    profile: &UserProfile,
    genre_vocab: &[String],
    tempo_min: f64,
    tempo_max: f64,
) -> (Vec<f64>, EmbeddingMeta) {
    let (tempo_min, tempo_max) = if tempo_max <= tempo_min {
        (DEFAULT_TEMPO_MIN, DEFAULT_TEMPO_MAX)
    } else {
        (tempo_min, tempo_max)
    };

    let audio = &profile.audio_profile;
    let mut vector = vec![
        audio.avg_danceability,
        audio.avg_energy,
        audio.avg_valence,
        audio.avg_acousticness,
        normalize_min_max(audio.avg_tempo, tempo_min, tempo_max),
    ];

    let total_genre_count: u64 = profile.genre_affinity.values().sum();
    for genre in genre_vocab {
        let count = profile.genre_affinity.get(genre).copied().unwrap_or(0);
        let share = if total_genre_count > 0 {
            count as f64 / total_genre_count as f64
        } else {
            0.0
        };
        vector.push(share);
    }

    let feature_order = BASE_FEATURE_ORDER
        .iter()
        .map(|name| name.to_string())
        .chain(genre_vocab.iter().map(|genre| format!("genre_{}", genre)))
        .collect();

    let meta = EmbeddingMeta {
        embedding_version: EMBEDDING_VERSION.to_string(),
        feature_order,
        genre_vocab: genre_vocab.to_vec(),
        tempo_min,
        tempo_max,
    };
    (vector, meta)
}
