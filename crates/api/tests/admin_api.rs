mod common;

use axum::http::StatusCode;
use podium_events::GameEvent;
use serde_json::json;

use common::{build_test_app, delete_json, find_view, game_json, get, post_json, TestApp, RESET_TOKEN};

async fn play(app: &TestApp, challenger_score: i32, opponent_score: i32) {
    let event: GameEvent =
        serde_json::from_value(game_json(challenger_score, opponent_score)).unwrap();
    app.engine.dispatcher().process_event(&event).await;
}

// ---------------------------------------------------------------------------
// Dependencies
// ---------------------------------------------------------------------------

#[tokio::test]
async fn adding_an_edge_twice_is_created_then_ok() {
    let app = build_test_app().await;
    let edge = json!({
        "achievement_id": app.id_of("secret"),
        "prerequisite_id": app.id_of("first_win"),
    });

    let (created, body) = post_json(&app.router, "/api/v1/admin/dependencies", edge.clone()).await;
    assert_eq!(created, StatusCode::CREATED);
    assert_eq!(body["data"]["kind"], "required");

    let (again, _) = post_json(&app.router, "/api/v1/admin/dependencies", edge).await;
    assert_eq!(again, StatusCode::OK);

    let (_, deps) = get(
        &app.router,
        &format!("/api/v1/achievements/{}/dependencies", app.id_of("secret")),
    )
    .await;
    assert_eq!(deps["data"]["prerequisites"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn reverse_edge_is_rejected_as_cycle() {
    let app = build_test_app().await;

    let (status, json) = post_json(
        &app.router,
        "/api/v1/admin/dependencies",
        json!({
            "achievement_id": app.id_of("first_win"),
            "prerequisite_id": app.id_of("veteran"),
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CYCLE");
}

#[tokio::test]
async fn edge_to_unknown_achievement_is_404() {
    let app = build_test_app().await;

    let (status, json) = post_json(
        &app.router,
        "/api/v1/admin/dependencies",
        json!({ "achievement_id": app.id_of("secret"), "prerequisite_id": 999 }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Achievement with id 999 not found");
}

#[tokio::test]
async fn removing_a_missing_edge_is_404() {
    let app = build_test_app().await;
    let edge = json!({
        "achievement_id": app.id_of("veteran"),
        "prerequisite_id": app.id_of("first_win"),
        "kind": "unlocks",
    });

    let (removed, _) = delete_json(&app.router, "/api/v1/admin/dependencies", edge.clone()).await;
    assert_eq!(removed, StatusCode::NO_CONTENT);

    let (again, json) = delete_json(&app.router, "/api/v1/admin/dependencies", edge).await;
    assert_eq!(again, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Re-evaluation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn removing_a_required_edge_then_reevaluating_unlocks() {
    let app = build_test_app().await;
    let secret = app.id_of("secret");
    let edge = json!({ "achievement_id": secret, "prerequisite_id": app.id_of("veteran") });
    let (created, _) = post_json(&app.router, "/api/v1/admin/dependencies", edge.clone()).await;
    assert_eq!(created, StatusCode::CREATED);

    play(&app, 11, 0).await;
    let (_, body) = get(&app.router, "/api/v1/players/7/achievements").await;
    let view = find_view(&body, "secret");
    assert_eq!(view["achieved"], false);
    assert_eq!(view["eligible"], false);
    assert_eq!(view["progress"], 1);

    let (removed, _) = delete_json(&app.router, "/api/v1/admin/dependencies", edge).await;
    assert_eq!(removed, StatusCode::NO_CONTENT);

    let (status, json) = post_json(&app.router, "/api/v1/admin/reevaluate/7", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["player_id"], 7);
    assert_eq!(json["data"]["unlocked"], json!([secret]));

    let (_, body) = get(&app.router, "/api/v1/players/7/achievements").await;
    assert_eq!(find_view(&body, "secret")["achieved"], true);
}

#[tokio::test]
async fn reevaluating_unknown_player_is_404() {
    let app = build_test_app().await;

    let (status, _) = post_json(&app.router, "/api/v1/admin/reevaluate/999", json!({})).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reevaluate_all_reports_players_with_progress() {
    let app = build_test_app().await;
    play(&app, 11, 4).await;

    let (status, json) = post_json(&app.router, "/api/v1/admin/reevaluate", json!({})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["players"], 2);
    assert_eq!(json["data"]["unlocked"], 0);
}

// ---------------------------------------------------------------------------
// Reset
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reset_requires_the_confirmation_token() {
    let app = build_test_app().await;
    play(&app, 11, 4).await;

    let (wrong, json) = post_json(
        &app.router,
        "/api/v1/admin/reset",
        json!({ "confirmation_token": "nope" }),
    )
    .await;
    assert_eq!(wrong, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "FORBIDDEN");

    let (empty, json) = post_json(
        &app.router,
        "/api/v1/admin/reset",
        json!({ "confirmation_token": "  " }),
    )
    .await;
    assert_eq!(empty, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");

    let (ok, json) = post_json(
        &app.router,
        "/api/v1/admin/reset",
        json!({ "confirmation_token": RESET_TOKEN }),
    )
    .await;
    assert_eq!(ok, StatusCode::OK);
    assert_eq!(json["data"]["progress_deleted"], 3);
    assert_eq!(json["data"]["notifications_deleted"], 1);

    let (_, rows) = get(&app.router, "/api/v1/analytics/progress").await;
    assert!(rows["data"].as_array().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Catalog config
// ---------------------------------------------------------------------------

#[tokio::test]
async fn config_load_applies_valid_entries_and_reports_the_rest() {
    let app = build_test_app().await;

    let (status, json) = post_json(
        &app.router,
        "/api/v1/admin/config",
        json!({
            "achievements": [
                { "key": "regular", "name": "Regular",
                  "criteria": { "category": "game_count", "target": 10 } },
                { "key": "mystery", "name": "Mystery",
                  "criteria": { "category": "teleport" } }
            ],
            "dependencies": [
                { "achievement": "regular", "prerequisite": "veteran" },
                { "achievement": "regular", "prerequisite": "ghost" }
            ]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["loaded"], json!(["regular"]));
    assert_eq!(json["data"]["rejected"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"]["dependencies_added"], 1);
    assert_eq!(json["data"]["dependencies_rejected"].as_array().unwrap().len(), 1);

    let (_, catalog) = get(&app.router, "/api/v1/achievements").await;
    assert_eq!(catalog["data"].as_array().unwrap().len(), 4);
}
