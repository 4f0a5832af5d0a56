//! Session binding tests: the trust root.

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use uuid::Uuid;

use common::fixtures;
use common::TestContext;

/// A gameplay call without a prior create_session is rejected and mutates
/// nothing.
#[tokio::test]
async fn test_spoofed_answer_is_rejected_without_mutation() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router()).unwrap();

    let response = server
        .post("/api/answer")
        .add_header(
            axum::http::header::AUTHORIZATION,
            TestContext::auth_header_value(&Uuid::new_v4()),
        )
        .json(&fixtures::answer_request(1, 42, 1500))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);

    let world = ctx.state.world();
    assert!(world.raids.is_empty());
    assert!(world.mastery.is_empty());
    assert!(world.players.is_empty());
}

/// Clients cannot mint their own sessions.
#[tokio::test]
async fn test_create_session_requires_verifier_token() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router()).unwrap();

    let response = server
        .post("/api/session")
        .add_header(
            axum::http::header::AUTHORIZATION,
            "Bearer not-the-verifier".to_string(),
        )
        .json(&serde_json::json!({
            "connection_id": Uuid::new_v4(),
            "player_id": "mallory"
        }))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert!(ctx.state.world().sessions.is_empty());
}

/// The verifier path establishes the binding and gameplay calls resolve
/// through it.
#[tokio::test]
async fn test_verifier_creates_session_and_connect_uses_it() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router()).unwrap();
    let connection_id = Uuid::new_v4();

    let response = server
        .post("/api/session")
        .add_header(
            axum::http::header::AUTHORIZATION,
            TestContext::verifier_header_value(),
        )
        .json(&serde_json::json!({
            "connection_id": connection_id,
            "player_id": "p1"
        }))
        .await;
    response.assert_status_ok();

    let response = server
        .post("/api/connect")
        .add_header(
            axum::http::header::AUTHORIZATION,
            TestContext::auth_header_value(&connection_id),
        )
        .json(&fixtures::connect_request("Ada", 3))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    // The profile belongs to the session's player id, not anything the
    // client sent.
    assert_eq!(body["id"], "p1");
    assert_eq!(body["grade"], 3);
}

/// Reconnecting with a new connection evicts the stale binding.
#[tokio::test]
async fn test_reconnect_evicts_stale_session() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router()).unwrap();

    let old = ctx.create_session("p1");
    let new = ctx.create_session("p1");

    let response = server
        .post("/api/connect")
        .add_header(
            axum::http::header::AUTHORIZATION,
            TestContext::auth_header_value(&old),
        )
        .json(&fixtures::connect_request("Ada", 3))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .post("/api/connect")
        .add_header(
            axum::http::header::AUTHORIZATION,
            TestContext::auth_header_value(&new),
        )
        .json(&fixtures::connect_request("Ada", 3))
        .await;
    response.assert_status_ok();
}

/// Malformed bearer tokens fail closed.
#[tokio::test]
async fn test_malformed_token_is_unauthenticated() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router()).unwrap();

    let response = server
        .post("/api/connect")
        .add_header(axum::http::header::AUTHORIZATION, "Bearer not-a-uuid".to_string())
        .json(&fixtures::connect_request("Ada", 3))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}
