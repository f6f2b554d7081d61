mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};

use common::{build_test_app, get, send};

#[tokio::test]
async fn health_reports_memory_storage() {
    let app = build_test_app().await;

    let (status, json) = get(&app.router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["storage"], "memory");
    assert_eq!(json["db_healthy"], true);
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn health_is_also_served_under_api_prefix() {
    let app = build_test_app().await;

    let (status, json) = get(&app.router, "/api/v1/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let app = build_test_app().await;
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = send(&app.router, request).await;

    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = build_test_app().await;

    let (status, _) = get(&app.router, "/api/v1/nope").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
