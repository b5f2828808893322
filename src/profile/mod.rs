pub mod models;
pub mod sqlite_profile_store;
pub mod stats;
pub mod store;

pub use models::{
    ArtistAffinity, AudioProfile, HistoryEntry, RecentHistory, UserEmbedding, UserProfile,
    RECENT_HISTORY_CAPACITY,
};
pub use sqlite_profile_store::SqliteProfileStore;
pub use stats::apply_track_event;
pub use store::{ProfileStore, QueueUpdate};
