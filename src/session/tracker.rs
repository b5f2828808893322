//! Playback session tracker.
//!
//! Turns a stream of "now playing" snapshots into discrete track events.
//! The tracker holds the currently playing track and its start time; when a
//! snapshot reports a different track id, the previous track is closed out
//! as either COMPLETED or SKIPPED depending on how long it was listened to.

use serde::{Deserialize, Serialize};

/// Default minimum listen time in seconds before a track counts as completed.
pub const DEFAULT_MIN_LISTEN_TIME_SECS: u64 = 30;

/// A point-in-time view of what a user is currently playing.
///
/// Snapshots are ephemeral: they are consumed once by the tracker and never
/// persisted. `track_id` is None when nothing is playing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub track_id: Option<String>,
    pub track_name: Option<String>,
    pub artist_name: Option<String>,
    pub album_name: Option<String>,
    /// Playback offset into the track, in seconds.
    pub progress_secs: Option<u64>,
    pub is_playing: bool,
    /// Unix timestamp of the snapshot. The tracker derives all durations
    /// from snapshot timestamps, never from the wall clock.
    pub timestamp: u64,
}

/// Whether a closed-out track was listened to past the minimum threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackStatus {
    Completed,
    Skipped,
}

impl std::fmt::Display for TrackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackStatus::Completed => write!(f, "COMPLETED"),
            TrackStatus::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// A track-change event, produced exactly once per track transition.
///
/// The status is derived by the tracker, never supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackEvent {
    pub user_id: String,
    pub track_id: String,
    pub track_name: String,
    pub status: TrackStatus,
    /// Seconds the track was listened to before the transition.
    pub duration_listened: u64,
    pub timestamp: u64,
}

/// Per-user playback session state machine.
///
/// Two states per slot: nothing tracked, or tracking track T. The transition
/// action on a track-id change is closing out the previous track's event
/// before adopting the new one.
#[derive(Debug)]
pub struct SessionTracker {
    user_id: String,
    current_track_id: Option<String>,
    current_track_name: String,
    start_time: u64,
    min_listen_time: u64,
}

impl SessionTracker {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self::with_min_listen_time(user_id, DEFAULT_MIN_LISTEN_TIME_SECS)
    }

    pub fn with_min_listen_time(user_id: impl Into<String>, min_listen_time: u64) -> Self {
        Self {
            user_id: user_id.into(),
            current_track_id: None,
            current_track_name: String::new(),
            start_time: 0,
            min_listen_time,
        }
    }

    /// The track id currently being tracked, if any.
    pub fn current_track_id(&self) -> Option<&str> {
        self.current_track_id.as_deref()
    }

    /// Feed one snapshot through the state machine.
    ///
    /// Returns at most one event per call: the close-out event for the
    /// *previous* track when the track id changes. The very first observation
    /// never produces an event (there is no prior track to close out), and a
    /// track replaced by itself (e.g. a seek) produces no event either.
    /// A snapshot with no track leaves the state untouched.
    pub fn observe(&mut self, snapshot: &PlaybackSnapshot) -> Option<TrackEvent> {
        let track_id = snapshot.track_id.as_deref()?;

        let mut event = None;
        if let Some(current_id) = &self.current_track_id {
            if current_id != track_id {
                let duration = snapshot.timestamp.saturating_sub(self.start_time);
                let status = if duration < self.min_listen_time {
                    TrackStatus::Skipped
                } else {
                    TrackStatus::Completed
                };
                event = Some(TrackEvent {
                    user_id: self.user_id.clone(),
                    track_id: current_id.clone(),
                    track_name: self.current_track_name.clone(),
                    status,
                    duration_listened: duration,
                    timestamp: snapshot.timestamp,
                });
            }
        }

        if self.current_track_id.as_deref() != Some(track_id) {
            self.current_track_id = Some(track_id.to_string());
            self.current_track_name = snapshot.track_name.clone().unwrap_or_default();
            self.start_time = snapshot.timestamp;
        }

        event
    }
}
