//! Thin HTTP adapters over the ingest and recommendation cores.

use anyhow::Result;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::state::*;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct RecommendationsQuery {
    pub size: Option<usize>,
}

#[derive(Serialize)]
struct RecommendationsResponse {
    user_id: String,
    queue: Vec<String>,
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
    };
    Json(stats)
}

async fn post_events(
    State(ingestor): State<GuardedIngestor>,
    Json(records): Json<Vec<Value>>,
) -> Response {
    let summary = ingestor.process_batch(&records).await;
    Json(summary).into_response()
}

async fn get_recommendations(
    State(state): State<ServerState>,
    Path(user_id): Path<String>,
    Query(query): Query<RecommendationsQuery>,
) -> Response {
    let queue_size = query.size.unwrap_or(state.default_queue_size);
    let queue = state.recommender.get_queue(&user_id, queue_size).await;
    Json(RecommendationsResponse { user_id, queue }).into_response()
}

async fn get_profile(
    State(profile_store): State<GuardedProfileStore>,
    Path(user_id): Path<String>,
) -> Response {
    match profile_store.get_profile(&user_id) {
        Ok(Some(profile)) => Json(profile).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, format!("{}", err)).into_response(),
    }
}

pub fn make_app(state: ServerState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/events", post(post_events))
        .route("/users/{user_id}/recommendations", get(get_recommendations))
        .route("/users/{user_id}/profile", get(get_profile))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(state: ServerState, port: u16) -> Result<()> {
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Listening on port {}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecommenderSettings;
    use crate::embedding::EmbeddingConfig;
    use crate::ingest::EventIngestor;
    use crate::metadata::NoopMetadataProvider;
    use crate::profile::{ProfileStore, SqliteProfileStore, UserProfile};
    use crate::recommender::{CatalogIndexLoader, Recommender};
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use std::time::Instant;
    use tower::ServiceExt; // for `oneshot`

    fn make_state(store: Arc<SqliteProfileStore>) -> ServerState {
        let settings = RecommenderSettings::default();
        let catalog = Arc::new(CatalogIndexLoader::new(None, settings.catalog_ttl()));
        let ingestor = Arc::new(EventIngestor::new(
            store.clone(),
            Arc::new(NoopMetadataProvider),
            EmbeddingConfig::default(),
        ));
        let recommender = Arc::new(Recommender::new(
            store.clone(),
            catalog,
            EmbeddingConfig::default(),
        ));
        ServerState {
            start_time: Instant::now(),
            hash: "test".to_string(),
            profile_store: store,
            ingestor,
            recommender,
            default_queue_size: settings.queue_size,
        }
    }

    #[tokio::test]
    async fn test_home_reports_stats() {
        let store = Arc::new(SqliteProfileStore::in_memory().unwrap());
        let app = make_app(make_state(store));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_profile_route_404s_on_unknown_user() {
        let store = Arc::new(SqliteProfileStore::in_memory().unwrap());
        let app = make_app(make_state(store));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/users/nobody/profile")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_events_route_ingests_batch() {
        let store = Arc::new(SqliteProfileStore::in_memory().unwrap());
        let app = make_app(make_state(store.clone()));
        let body = r#"[{"user_id":"u1","track_id":"t1","status":"SKIPPED","timestamp":100}]"#;
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/events")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let profile = store.get_profile("u1").unwrap().unwrap();
        assert_eq!(profile.total_skips, 1);
    }

    #[tokio::test]
    async fn test_recommendations_route_returns_queue() {
        let store = Arc::new(SqliteProfileStore::in_memory().unwrap());
        let mut profile = UserProfile::new("u1", 100);
        profile.recommendation_queue = vec!["t1".to_string(), "t2".to_string()];
        profile.queue_embedding_version = crate::embedding::EMBEDDING_VERSION.to_string();
        store.put_profile(&profile).unwrap();

        let app = make_app(make_state(store));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/users/u1/recommendations?size=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
