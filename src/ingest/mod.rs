//! Batch ingestion of track events.
//!
//! Each record of a batch is decoded, validated and folded into the owning
//! user's profile. A malformed record is dropped with a warning and the
//! rest of the batch continues; a collaborator failure (store, metadata)
//! degrades per record. Nothing here aborts a batch.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::embedding::EmbeddingConfig;
use crate::metadata::MetadataProvider;
use crate::profile::{apply_track_event, ProfileStore, UserProfile};
use crate::session::{TrackEvent, TrackStatus};

/// Why a record was dropped from a batch.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to decode event payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("event is missing required field '{0}'")]
    MissingField(&'static str),
    #[error("unknown track status '{0}'")]
    UnknownStatus(String),
}

/// Outcome counts for one processed batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub received: usize,
    pub processed: usize,
    /// Records rejected during decoding/validation.
    pub dropped: usize,
    /// Records that decoded fine but failed against the profile store.
    pub failed: usize,
}

#[derive(Deserialize)]
struct WireEvent {
    user_id: Option<String>,
    track_id: Option<String>,
    track_name: Option<String>,
    status: Option<String>,
    duration_listened: Option<u64>,
    timestamp: Option<u64>,
}

/// Decode and validate one raw event payload.
fn decode_event(record: &Value) -> Result<TrackEvent, IngestError> {
    let wire: WireEvent = serde_json::from_value(record.clone())?;

    let user_id = wire
        .user_id
        .filter(|id| !id.is_empty())
        .ok_or(IngestError::MissingField("user_id"))?;
    let track_id = wire
        .track_id
        .filter(|id| !id.is_empty())
        .ok_or(IngestError::MissingField("track_id"))?;
    let status = match wire.status.as_deref() {
        Some("COMPLETED") => TrackStatus::Completed,
        Some("SKIPPED") => TrackStatus::Skipped,
        Some(other) => return Err(IngestError::UnknownStatus(other.to_string())),
        None => return Err(IngestError::MissingField("status")),
    };

    Ok(TrackEvent {
        user_id,
        track_id,
        track_name: wire.track_name.unwrap_or_default(),
        status,
        duration_listened: wire.duration_listened.unwrap_or(0),
        timestamp: wire
            .timestamp
            .unwrap_or_else(|| Utc::now().timestamp() as u64),
    })
}

/// Folds batches of incoming track events into user profiles.
pub struct EventIngestor {
    profile_store: Arc<dyn ProfileStore>,
    metadata_provider: Arc<dyn MetadataProvider>,
    embedding_config: EmbeddingConfig,
}

impl EventIngestor {
    pub fn new(
        profile_store: Arc<dyn ProfileStore>,
        metadata_provider: Arc<dyn MetadataProvider>,
        embedding_config: EmbeddingConfig,
    ) -> Self {
        Self {
            profile_store,
            metadata_provider,
            embedding_config,
        }
    }

    /// Process one batch of raw event payloads.
    ///
    /// The profile update is a plain read-modify-write: there is no
    /// conditional-write guard, so two concurrent updates for the same user
    /// (e.g. a duplicate redelivery racing the original) can lose one
    /// update's increments. Per-user ordering is assumed to be enforced by
    /// the upstream transport's partitioning.
    pub async fn process_batch(&self, records: &[Value]) -> BatchSummary {
        let request_id = Uuid::new_v4().simple().to_string();
        let mut summary = BatchSummary {
            received: records.len(),
            ..BatchSummary::default()
        };
        info!(
            "Received event batch. request_id={} record_count={}",
            request_id,
            records.len()
        );

        for record in records {
            let event = match decode_event(record) {
                Ok(event) => event,
                Err(e) => {
                    warn!(
                        "Dropping event record. request_id={} reason={}",
                        request_id, e
                    );
                    summary.dropped += 1;
                    continue;
                }
            };

            match self.process_event(&event).await {
                Ok(()) => {
                    summary.processed += 1;
                    info!(
                        "Updated user profile. request_id={} user_id={} track_id={} status={}",
                        request_id, event.user_id, event.track_id, event.status
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(
                        "Failed to process event. request_id={} user_id={} track_id={} error={:#}",
                        request_id, event.user_id, event.track_id, e
                    );
                }
            }
        }

        summary
    }

    async fn process_event(&self, event: &TrackEvent) -> anyhow::Result<()> {
        let mut profile = self
            .profile_store
            .get_profile(&event.user_id)?
            .unwrap_or_else(|| UserProfile::new(&event.user_id, event.timestamp));

        // Metadata only matters for completed tracks, and its absence only
        // costs the taste-stat update, never the play itself.
        let metadata = match event.status {
            TrackStatus::Completed => {
                match self.metadata_provider.fetch(&event.track_id).await {
                    Ok(metadata) => Some(metadata),
                    Err(e) => {
                        warn!(
                            "Failed to fetch track metadata. user_id={} track_id={} error={:#}",
                            event.user_id, event.track_id, e
                        );
                        None
                    }
                }
            }
            TrackStatus::Skipped => None,
        };

        apply_track_event(&mut profile, event, metadata.as_ref(), &self.embedding_config);
        self.profile_store.put_profile(&profile)?;
        Ok(())
    }
}
