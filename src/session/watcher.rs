//! Poll driver feeding now-playing snapshots through the session tracker.
//!
//! The concrete now-playing source and event destination sit behind traits so
//! the loop can be driven by scripted snapshots in tests.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::tracker::{PlaybackSnapshot, SessionTracker, TrackEvent};

/// Source of now-playing snapshots for a single user.
#[async_trait]
pub trait NowPlayingSource: Send + Sync {
    /// Returns the current snapshot, or Ok(None) when nothing is playing.
    async fn now_playing(&self) -> Result<Option<PlaybackSnapshot>>;
}

/// Destination for track-change events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: &TrackEvent) -> Result<()>;
}

/// Event sink that posts events to the ingest endpoint of a taste server.
pub struct HttpEventSink {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEventSink {
    pub fn new(base_url: String, timeout_sec: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .context("Failed to create HTTP client")?;
        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl EventSink for HttpEventSink {
    async fn publish(&self, event: &TrackEvent) -> Result<()> {
        let url = format!("{}/events", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&vec![event])
            .send()
            .await
            .context("Failed to post track event")?;

        if !response.status().is_success() {
            anyhow::bail!("Event ingest failed with status: {}", response.status());
        }
        Ok(())
    }
}

/// Poll the source once and publish the resulting event, if any.
///
/// Source failures are logged and swallowed: a missed poll loses at most one
/// snapshot, and the tracker state stays consistent either way.
pub async fn watch_once(
    source: &dyn NowPlayingSource,
    tracker: &mut SessionTracker,
    sink: &dyn EventSink,
) -> Option<TrackEvent> {
    let snapshot = match source.now_playing().await {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => {
            debug!("Nothing playing");
            return None;
        }
        Err(e) => {
            warn!("Failed to fetch now-playing snapshot: {}", e);
            return None;
        }
    };

    let event = tracker.observe(&snapshot)?;
    info!(
        "Track change: {} ({}) after {}s",
        event.track_name, event.status, event.duration_listened
    );
    if let Err(e) = sink.publish(&event).await {
        warn!("Failed to publish track event for {}: {}", event.track_id, e);
    }
    Some(event)
}

/// Run the watch loop forever with a fixed poll interval.
pub async fn watch_loop(
    source: &dyn NowPlayingSource,
    tracker: &mut SessionTracker,
    sink: &dyn EventSink,
    poll_interval: Duration,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    loop {
        ticker.tick().await;
        watch_once(source, tracker, sink).await;
    }
}
