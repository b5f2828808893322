use anyhow::Result;

use super::models::UserProfile;

/// Queue-related fields written by the recommender without touching the
/// rest of the profile document.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueUpdate {
    pub queue: Vec<String>,
    pub queue_updated_at: u64,
    pub queue_embedding_version: String,
    pub queue_embedding_ts: u64,
}

#[cfg_attr(feature = "mock", mockall::automock)]
pub trait ProfileStore: Send + Sync {
    /// Returns the user's profile document.
    /// Returns Ok(None) if no profile exists for the user.
    /// Returns Err if there is a database error.
    fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>>;

    /// Writes the full profile document, creating it if absent.
    fn put_profile(&self, profile: &UserProfile) -> Result<()>;

    /// Updates only the queue fields of an existing profile.
    /// Returns Ok(()) without writing if the profile does not exist.
    fn update_queue(&self, user_id: &str, update: &QueueUpdate) -> Result<()>;
}
