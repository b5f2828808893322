//! SQLite-backed profile store.
//!
//! Stands in for the external key-value store: one JSON document per user
//! id, with a partial update path for the queue fields so the recommender
//! never rewrites the whole document. No multi-key transaction guarantee is
//! offered beyond single-statement atomicity.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::models::UserProfile;
use super::store::{ProfileStore, QueueUpdate};

const CREATE_PROFILE_TABLE: &str = "
CREATE TABLE IF NOT EXISTS user_profile (
    user_id TEXT PRIMARY KEY NOT NULL,
    document TEXT NOT NULL,
    created INTEGER NOT NULL DEFAULT (cast(strftime('%s','now') as int)),
    updated INTEGER NOT NULL DEFAULT (cast(strftime('%s','now') as int))
)";

pub struct SqliteProfileStore {
    connection: Mutex<Connection>,
}

impl SqliteProfileStore {
    pub fn new(db_file_path: &Path) -> Result<Self> {
        let connection = Connection::open(db_file_path)
            .with_context(|| format!("Failed to open profile database at {:?}", db_file_path))?;
        Self::with_connection(connection)
    }

    /// In-memory store for tests.
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(connection: Connection) -> Result<Self> {
        connection
            .execute(CREATE_PROFILE_TABLE, [])
            .context("Failed to create user_profile table")?;
        info!("Profile store ready");
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }
}

impl ProfileStore for SqliteProfileStore {
    fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let connection = self.connection.lock().unwrap();
        let document: Option<String> = connection
            .query_row(
                "SELECT document FROM user_profile WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query user profile")?;

        match document {
            Some(document) => {
                let profile = serde_json::from_str(&document).with_context(|| {
                    format!("Failed to decode stored profile for user {}", user_id)
                })?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    fn put_profile(&self, profile: &UserProfile) -> Result<()> {
        let document =
            serde_json::to_string(profile).context("Failed to serialize user profile")?;
        let connection = self.connection.lock().unwrap();
        connection
            .execute(
                "INSERT INTO user_profile (user_id, document, created, updated)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id) DO UPDATE SET document = ?2, updated = ?4",
                params![
                    profile.user_id,
                    document,
                    profile.created_at,
                    profile.updated_at
                ],
            )
            .context("Failed to write user profile")?;
        Ok(())
    }

    fn update_queue(&self, user_id: &str, update: &QueueUpdate) -> Result<()> {
        let queue_json =
            serde_json::to_string(&update.queue).context("Failed to serialize queue")?;
        let connection = self.connection.lock().unwrap();
        connection
            .execute(
                "UPDATE user_profile SET document = json_set(
                    document,
                    '$.recommendation_queue', json(?2),
                    '$.queue_updated_at', ?3,
                    '$.queue_embedding_version', ?4,
                    '$.queue_embedding_ts', ?5
                 ), updated = ?3
                 WHERE user_id = ?1",
                params![
                    user_id,
                    queue_json,
                    update.queue_updated_at,
                    update.queue_embedding_version,
                    update.queue_embedding_ts
                ],
            )
            .context("Failed to update recommendation queue")?;
        Ok(())
    }
}
