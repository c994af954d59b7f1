//! End-to-end tests for the rate-limit guard: a 429 from the backend trips
//! the shared circuit, guarded routes degrade or fail fast while it is
//! tripped, and the window expires on its own.

mod common;

use axum::http::StatusCode;
use common::test_app::{test_config, TestApp};
use serde_json::Value;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn backend_with_rate_limited_games() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/games"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_backend_429_degrades_search_to_empty_results() {
    let backend = backend_with_rate_limited_games().await;
    let app = TestApp::spawn(&test_config("", &backend.uri()));

    let response = app.get("/api/v1/platform/games/search?query=catan").await;

    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["results"], serde_json::json!([]));
}

#[tokio::test]
async fn test_tripped_guard_blocks_other_routes_without_backend_calls() {
    let backend = backend_with_rate_limited_games().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/polls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(0)
        .mount(&backend)
        .await;

    let app = TestApp::spawn(&test_config("", &backend.uri()));

    // First request trips the guard via the 429 signature
    app.get("/api/v1/platform/games/search?query=catan").await;

    // Poll lookup has no fallback, so the tripped guard surfaces a 429
    // and the backend is never called
    let response = app.get("/api/v1/platform/polls/1").await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);

    backend.verify().await;
}

#[tokio::test]
async fn test_guard_reopens_after_the_cooldown_window() {
    let backend = backend_with_rate_limited_games().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/polls"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([{ "id": "1", "question": "Next game?" }])),
        )
        .mount(&backend)
        .await;

    let app = TestApp::spawn_with_cooldown(
        &test_config("", &backend.uri()),
        Duration::from_millis(100),
    );

    app.get("/api/v1/platform/games/search?query=catan").await;
    let blocked = app.get("/api/v1/platform/polls/1").await;
    blocked.assert_status(StatusCode::TOO_MANY_REQUESTS);

    tokio::time::sleep(Duration::from_millis(150)).await;

    let recovered = app.get("/api/v1/platform/polls/1").await;
    recovered.assert_status(StatusCode::OK);
    let body: Value = recovered.json();
    assert_eq!(body["question"], "Next game?");
}

#[tokio::test]
async fn test_writes_fail_fast_while_tripped_instead_of_dropping_data() {
    let backend = backend_with_rate_limited_games().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/polls"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!([{ "id": 1 }])))
        .expect(0)
        .mount(&backend)
        .await;

    let app = TestApp::spawn(&test_config("", &backend.uri()));
    app.get("/api/v1/platform/games/search?query=catan").await;

    let response = app
        .post(
            "/api/v1/platform/polls",
            axum::body::Body::from(r#"{"question":"Next game night?"}"#),
        )
        .await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);

    backend.verify().await;
}

#[tokio::test]
async fn test_non_rate_limit_backend_failure_does_not_trip_the_guard() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/games"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&backend)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/polls"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([{ "id": "1", "question": "Next game?" }])),
        )
        .expect(1)
        .mount(&backend)
        .await;

    let app = TestApp::spawn(&test_config("", &backend.uri()));

    let failed = app.get("/api/v1/platform/games/search?query=catan").await;
    failed.assert_status(StatusCode::BAD_GATEWAY);

    // Guard stays open, so the next route still reaches the backend
    let response = app.get("/api/v1/platform/polls/1").await;
    response.assert_status(StatusCode::OK);

    backend.verify().await;
}
