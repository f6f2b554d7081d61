#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use podium_api::config::ServerConfig;
use podium_api::router::build_app_router;
use podium_api::state::AppState;
use podium_core::catalog_config::CatalogConfig;
use podium_core::context::PlayerSnapshot;
use podium_core::types::DbId;
use podium_events::engine::default_adapters;
use podium_events::{AchievementEngine, EngineConfig, EngineStores, MemoryStore};

pub const RESET_TOKEN: &str = "confirm-reset";

/// Catalog loaded into every test app: a visible win, a game count revealed
/// by the win, and a hidden shutout.
pub const CATALOG: &str = r#"{
    "achievements": [
        { "key": "first_win", "name": "First Win", "description": "Win a game",
          "points": 10, "criteria": { "category": "win_count", "target": 1 } },
        { "key": "veteran", "name": "Veteran", "description": "Play three games",
          "points": 20, "criteria": { "category": "game_count", "target": 3 } },
        { "key": "secret", "name": "Secret", "description": "Win without conceding",
          "points": 50, "hidden": true,
          "criteria": { "category": "winner_against_zero", "target": 1 } }
    ],
    "dependencies": [
        { "achievement": "veteran", "prerequisite": "first_win", "kind": "unlocks" }
    ]
}"#;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        admin_reset_token: Some(RESET_TOKEN.to_string()),
        achievements_config_path: None,
        run_sweeps: false,
    }
}

pub struct TestApp {
    pub router: Router,
    pub engine: Arc<AchievementEngine>,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    pub fn id_of(&self, key: &str) -> DbId {
        self.engine.registry().snapshot().by_key(key).unwrap().id
    }
}

/// Full router over an in-process store with players 7 (Ada) and 8 (Brook)
/// and [`CATALOG`] loaded. No workers are running; tests that need queued
/// events evaluated spawn them.
pub async fn build_test_app() -> TestApp {
    build_test_app_with(EngineConfig::default()).await
}

pub async fn build_test_app_with(engine_config: EngineConfig) -> TestApp {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    store.upsert_player(PlayerSnapshot::new(7, "Ada")).unwrap();
    store.upsert_player(PlayerSnapshot::new(8, "Brook")).unwrap();

    let adapters = default_adapters(&engine_config).unwrap();
    let engine = AchievementEngine::new(
        EngineStores::from_shared(store.clone()),
        engine_config,
        adapters,
    )
    .await
    .unwrap()
    .with_reset_token(config.admin_reset_token.clone());
    let report = engine
        .load_config(&CatalogConfig::from_json(CATALOG).unwrap())
        .await
        .unwrap();
    assert!(report.is_clean());
    let engine = Arc::new(engine);

    let state = AppState {
        engine: Arc::clone(&engine),
        config: Arc::new(config.clone()),
        pool: None,
    };

    TestApp {
        router: build_app_router(state, &config),
        engine,
        store,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

/// Parse a response body as JSON. Empty bodies yield `Value::Null`.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = send(app, request).await;
    let status = response.status();
    (status, body_json(response).await)
}

async fn with_json(
    app: &Router,
    method: &str,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = send(app, request).await;
    let status = response.status();
    (status, body_json(response).await)
}

pub async fn post_json(
    app: &Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    with_json(app, "POST", uri, body).await
}

pub async fn delete_json(
    app: &Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    with_json(app, "DELETE", uri, body).await
}

/// A finished game between players 7 and 8 as posted by a game server.
pub fn game_json(challenger_score: i32, opponent_score: i32) -> serde_json::Value {
    serde_json::json!({
        "event_type": "game_completed",
        "game_type": "pool",
        "game": {
            "challenger_id": 7,
            "opponent_id": 8,
            "challenger_score": challenger_score,
            "opponent_score": opponent_score,
            "played_at": "2026-10-01T12:00:00Z"
        }
    })
}

/// The view of `key` in a `/players/{id}/achievements` response.
pub fn find_view<'a>(body: &'a serde_json::Value, key: &str) -> &'a serde_json::Value {
    body["data"]["achievements"]
        .as_array()
        .unwrap()
        .iter()
        .find(|v| v["key"] == key)
        .unwrap()
}
