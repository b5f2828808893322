//! Incremental statistics engine.
//!
//! Folds one track event at a time into the durable profile: running
//! audio-feature averages, genre and artist affinity counters, the bounded
//! recent history, and the rebuilt user embedding. History is never
//! reprocessed; every update is O(1) in the number of past events.

use tracing::debug;

use crate::embedding::{
    build_user_embedding, normalize_genre_label, EmbeddingConfig, EMBEDDING_VERSION,
};
use crate::metadata::{ArtistInfo, AudioFeatures, TrackMetadata};
use crate::session::{TrackEvent, TrackStatus};

use super::models::{ArtistAffinity, AudioProfile, HistoryEntry, UserEmbedding, UserProfile};

/// Apply one track event to the profile.
///
/// Always counts the play, records it in the history, and consumes the track
/// from the recommendation queue if it was pending there. Completed events
/// with metadata additionally update the feature averages and the genre and
/// artist affinity; a missing `metadata` (fetch failed or skipped event)
/// degrades to "play recorded, taste stats unchanged". The embedding is
/// rebuilt at the end and stamped with the event timestamp.
pub fn apply_track_event(
    profile: &mut UserProfile,
    event: &TrackEvent,
    metadata: Option<&TrackMetadata>,
    embedding_config: &EmbeddingConfig,
) {
    let now = event.timestamp;
    profile.updated_at = now;
    profile.last_event_ts = now;
    profile.total_tracks_played += 1;

    match event.status {
        TrackStatus::Completed => {
            profile.total_completions += 1;
            if let Some(metadata) = metadata {
                update_audio_profile(&mut profile.audio_profile, &metadata.audio_features);
                update_genre_affinity(profile, &metadata.genres);
                update_artist_affinity(profile, &metadata.artist, now);
            } else {
                debug!(
                    "No metadata for completed track {}; taste stats unchanged",
                    event.track_id
                );
            }
        }
        TrackStatus::Skipped => {
            profile.total_skips += 1;
        }
    }

    profile.recent_history.record(HistoryEntry {
        track_id: event.track_id.clone(),
        status: event.status,
        ts: now,
    });

    // A played track was a consumed recommendation if it was queued.
    profile
        .recommendation_queue
        .retain(|queued| queued != &event.track_id);

    let (vector, meta) = build_user_embedding(
        profile,
        &embedding_config.genre_vocab,
        embedding_config.tempo_min,
        embedding_config.tempo_max,
    );
    profile.user_embedding = Some(UserEmbedding {
        vector,
        version: EMBEDDING_VERSION.to_string(),
        meta,
        updated_at: now,
    });
}

/// Fold one observation into the running averages.
///
/// Every feature updates against the same pre-increment sample count, then
/// the count increments exactly once, so all averages stay synchronized to
/// one logical observation.
fn update_audio_profile(stats: &mut AudioProfile, features: &AudioFeatures) {
    let samples = stats.samples;
    stats.avg_danceability = streaming_mean(stats.avg_danceability, features.danceability, samples);
    stats.avg_energy = streaming_mean(stats.avg_energy, features.energy, samples);
    stats.avg_valence = streaming_mean(stats.avg_valence, features.valence, samples);
    stats.avg_acousticness =
        streaming_mean(stats.avg_acousticness, features.acousticness, samples);
    stats.avg_tempo = streaming_mean(stats.avg_tempo, features.tempo, samples);
    stats.samples = samples + 1;
}

fn streaming_mean(old_avg: f64, new_value: f64, samples: u64) -> f64 {
    (old_avg * samples as f64 + new_value) / (samples as f64 + 1.0)
}

fn update_genre_affinity(profile: &mut UserProfile, genres: &[String]) {
    for genre in genres {
        let label = normalize_genre_label(genre);
        *profile.genre_affinity.entry(label).or_insert(0) += 1;
    }
}

/// First sighting of an artist appends a new entry; later sightings bump the
/// counter and refresh the last-played timestamp. First-seen order is kept.
fn update_artist_affinity(profile: &mut UserProfile, artist: &ArtistInfo, now: u64) {
    match profile
        .artist_affinity
        .iter_mut()
        .find(|entry| entry.artist_id == artist.id)
    {
        Some(entry) => {
            entry.affinity += 1;
            entry.last_played_ts = now;
        }
        None => {
            profile.artist_affinity.push(ArtistAffinity {
                artist_id: artist.id.clone(),
                name: artist.name.clone(),
                affinity: 1,
                last_played_ts: now,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::models::RECENT_HISTORY_CAPACITY;
    use rand::prelude::*;

    fn make_event(track_id: &str, status: TrackStatus, timestamp: u64) -> TrackEvent {
        TrackEvent {
            user_id: "user-1".to_string(),
            track_id: track_id.to_string(),
            track_name: track_id.to_string(),
            status,
            duration_listened: 180,
            timestamp,
        }
    }

    fn make_metadata(artist_id: &str, genres: &[&str], features: AudioFeatures) -> TrackMetadata {
        TrackMetadata {
            audio_features: features,
            genres: genres.iter().map(|g| g.to_string()).collect(),
            artist: ArtistInfo {
                id: artist_id.to_string(),
                name: format!("artist {}", artist_id),
            },
        }
    }

    fn features(value: f64) -> AudioFeatures {
        AudioFeatures {
            danceability: value,
            energy: value,
            valence: value,
            acousticness: value,
            tempo: value * 200.0,
        }
    }

    #[test]
    fn test_completed_event_updates_all_counters() {
        let mut profile = UserProfile::new("user-1", 0);
        let metadata = make_metadata("a1", &["indie rock"], features(0.5));
        apply_track_event(
            &mut profile,
            &make_event("t1", TrackStatus::Completed, 100),
            Some(&metadata),
            &EmbeddingConfig::default(),
        );

        assert_eq!(profile.total_tracks_played, 1);
        assert_eq!(profile.total_completions, 1);
        assert_eq!(profile.total_skips, 0);
        assert_eq!(profile.audio_profile.samples, 1);
        assert_eq!(profile.audio_profile.avg_danceability, 0.5);
        assert_eq!(profile.genre_affinity.get("indie_rock"), Some(&1));
        assert_eq!(profile.artist_affinity.len(), 1);
        assert_eq!(profile.recent_history.len(), 1);
        assert!(profile.user_embedding.is_some());
        assert_eq!(profile.user_embedding.as_ref().unwrap().updated_at, 100);
    }

    #[test]
    fn test_skipped_event_records_play_only() {
        let mut profile = UserProfile::new("user-1", 0);
        apply_track_event(
            &mut profile,
            &make_event("t1", TrackStatus::Skipped, 100),
            None,
            &EmbeddingConfig::default(),
        );

        assert_eq!(profile.total_tracks_played, 1);
        assert_eq!(profile.total_skips, 1);
        assert_eq!(profile.audio_profile.samples, 0);
        assert!(profile.genre_affinity.is_empty());
        assert_eq!(profile.recent_history.len(), 1);
    }

    #[test]
    fn test_completed_without_metadata_degrades_gracefully() {
        let mut profile = UserProfile::new("user-1", 0);
        apply_track_event(
            &mut profile,
            &make_event("t1", TrackStatus::Completed, 100),
            None,
            &EmbeddingConfig::default(),
        );

        assert_eq!(profile.total_completions, 1);
        // Play recorded, taste stats unchanged.
        assert_eq!(profile.audio_profile.samples, 0);
        assert!(profile.artist_affinity.is_empty());
        assert_eq!(profile.recent_history.len(), 1);
    }

    #[test]
    fn test_streaming_mean_matches_arithmetic_mean() {
        let mut profile = UserProfile::new("user-1", 0);
        let values = [0.1, 0.9, 0.4, 0.7, 0.2];
        for (i, value) in values.iter().enumerate() {
            let metadata = make_metadata("a1", &[], features(*value));
            apply_track_event(
                &mut profile,
                &make_event(&format!("t{}", i), TrackStatus::Completed, 100 + i as u64),
                Some(&metadata),
                &EmbeddingConfig::default(),
            );
        }
        let expected = values.iter().sum::<f64>() / values.len() as f64;
        assert!((profile.audio_profile.avg_energy - expected).abs() < 1e-9);
        assert_eq!(profile.audio_profile.samples, values.len() as u64);
    }

    #[test]
    fn test_random_replay_keeps_samples_and_totals_consistent() {
        let mut rng = rand::rng();
        let mut profile = UserProfile::new("user-1", 0);
        let mut completed_values = Vec::new();

        for i in 0..200 {
            let completed = rng.random_bool(0.6);
            let event = make_event(
                &format!("t{}", i),
                if completed {
                    TrackStatus::Completed
                } else {
                    TrackStatus::Skipped
                },
                1000 + i,
            );
            let metadata = if completed {
                let value: f64 = rng.random_range(0.0..1.0);
                completed_values.push(value);
                Some(make_metadata("a1", &["pop"], features(value)))
            } else {
                None
            };
            apply_track_event(
                &mut profile,
                &event,
                metadata.as_ref(),
                &EmbeddingConfig::default(),
            );
        }

        assert_eq!(profile.audio_profile.samples, completed_values.len() as u64);
        assert_eq!(
            profile.total_tracks_played,
            profile.total_completions + profile.total_skips
        );
        assert_eq!(
            profile.genre_affinity.get("pop").copied().unwrap_or(0),
            completed_values.len() as u64
        );
        if !completed_values.is_empty() {
            let expected =
                completed_values.iter().sum::<f64>() / completed_values.len() as f64;
            assert!((profile.audio_profile.avg_valence - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_genre_labels_accumulate_under_normalization() {
        let mut profile = UserProfile::new("user-1", 0);
        let first = make_metadata("a1", &[" indie rock", "jazz"], features(0.5));
        let second = make_metadata("a2", &["indie rock "], features(0.5));
        apply_track_event(
            &mut profile,
            &make_event("t1", TrackStatus::Completed, 100),
            Some(&first),
            &EmbeddingConfig::default(),
        );
        apply_track_event(
            &mut profile,
            &make_event("t2", TrackStatus::Completed, 200),
            Some(&second),
            &EmbeddingConfig::default(),
        );

        assert_eq!(profile.genre_affinity.get("indie_rock"), Some(&2));
        assert_eq!(profile.genre_affinity.get("jazz"), Some(&1));
        let total: u64 = profile.genre_affinity.values().sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_artist_affinity_keeps_first_seen_order() {
        let mut profile = UserProfile::new("user-1", 0);
        for (i, artist_id) in ["a1", "a2", "a1", "a3", "a2"].iter().enumerate() {
            let metadata = make_metadata(artist_id, &[], features(0.5));
            apply_track_event(
                &mut profile,
                &make_event(&format!("t{}", i), TrackStatus::Completed, 100 + i as u64),
                Some(&metadata),
                &EmbeddingConfig::default(),
            );
        }

        let order: Vec<&str> = profile
            .artist_affinity
            .iter()
            .map(|a| a.artist_id.as_str())
            .collect();
        assert_eq!(order, vec!["a1", "a2", "a3"]);
        assert_eq!(profile.artist_affinity[0].affinity, 2);
        assert_eq!(profile.artist_affinity[0].last_played_ts, 102);
        assert_eq!(profile.artist_affinity[1].affinity, 2);
        assert_eq!(profile.artist_affinity[2].affinity, 1);
    }

    #[test]
    fn test_history_stays_bounded() {
        let mut profile = UserProfile::new("user-1", 0);
        for i in 0..50 {
            apply_track_event(
                &mut profile,
                &make_event(&format!("t{}", i), TrackStatus::Skipped, 100 + i),
                None,
                &EmbeddingConfig::default(),
            );
        }
        assert_eq!(profile.recent_history.len(), RECENT_HISTORY_CAPACITY);
        assert_eq!(profile.recent_history.track_ids().next(), Some("t49"));
    }

    #[test]
    fn test_played_track_is_consumed_from_queue() {
        let mut profile = UserProfile::new("user-1", 0);
        profile.recommendation_queue =
            vec!["t1".to_string(), "t2".to_string(), "t3".to_string()];
        apply_track_event(
            &mut profile,
            &make_event("t2", TrackStatus::Completed, 100),
            None,
            &EmbeddingConfig::default(),
        );
        assert_eq!(profile.recommendation_queue, vec!["t1", "t3"]);
    }

    #[test]
    fn test_embedding_is_restamped_on_every_event() {
        let mut profile = UserProfile::new("user-1", 0);
        apply_track_event(
            &mut profile,
            &make_event("t1", TrackStatus::Skipped, 100),
            None,
            &EmbeddingConfig::default(),
        );
        let first_ts = profile.user_embedding.as_ref().unwrap().updated_at;
        apply_track_event(
            &mut profile,
            &make_event("t2", TrackStatus::Skipped, 200),
            None,
            &EmbeddingConfig::default(),
        );
        let second_ts = profile.user_embedding.as_ref().unwrap().updated_at;
        assert_eq!(first_ts, 100);
        assert_eq!(second_ts, 200);
        assert_eq!(
            profile.user_embedding.as_ref().unwrap().version,
            EMBEDDING_VERSION
        );
    }
}
