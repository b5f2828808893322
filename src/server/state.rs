use axum::extract::FromRef;

use crate::ingest::EventIngestor;
use crate::profile::ProfileStore;
use crate::recommender::Recommender;
use std::sync::Arc;
use std::time::Instant;

pub type GuardedProfileStore = Arc<dyn ProfileStore>;
pub type GuardedIngestor = Arc<EventIngestor>;
pub type GuardedRecommender = Arc<Recommender>;

#[derive(Clone)]
pub struct ServerState {
    pub start_time: Instant,
    pub hash: String,
    pub profile_store: GuardedProfileStore,
    pub ingestor: GuardedIngestor,
    pub recommender: GuardedRecommender,
    pub default_queue_size: usize,
}

impl FromRef<ServerState> for GuardedProfileStore {
    fn from_ref(input: &ServerState) -> Self {
        input.profile_store.clone()
    }
}

impl FromRef<ServerState> for GuardedIngestor {
    fn from_ref(input: &ServerState) -> Self {
        input.ingestor.clone()
    }
}

impl FromRef<ServerState> for GuardedRecommender {
    fn from_ref(input: &ServerState) -> Self {
        input.recommender.clone()
    }
}
