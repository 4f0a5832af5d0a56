//! Reward-delivery worker API tests.

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::Utc;

use common::TestContext;

use raid_server::models::RewardEvent;

fn seed_reward(ctx: &TestContext, player_id: &str) -> u64 {
    let mut world = ctx.state.world();
    let id = world.next_reward_id();
    world.rewards.insert(
        id,
        RewardEvent {
            id,
            player_id: player_id.to_string(),
            payload: serde_json::json!({ "credit": 2.5, "track": "mul-0-12" }),
            sent: false,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            sent_at: None,
        },
    );
    id
}

/// Worker endpoints refuse player sessions.
#[tokio::test]
async fn test_worker_endpoints_require_verifier_token() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router()).unwrap();
    let conn = ctx.create_session("p1");

    let response = server
        .get("/api/worker/rewards")
        .add_header(
            axum::http::header::AUTHORIZATION,
            TestContext::auth_header_value(&conn),
        )
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

/// Poll returns unsent events oldest-first; a success ack removes them
/// from the pending view and stamps sent_at.
#[tokio::test]
async fn test_poll_and_ack_success() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router()).unwrap();
    let first = seed_reward(&ctx, "p1");
    let second = seed_reward(&ctx, "p2");

    let body: serde_json::Value = server
        .get("/api/worker/rewards")
        .add_header(
            axum::http::header::AUTHORIZATION,
            TestContext::verifier_header_value(),
        )
        .await
        .json();
    let pending = body.as_array().unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0]["id"].as_u64(), Some(first));
    assert_eq!(pending[1]["id"].as_u64(), Some(second));

    server
        .post("/api/worker/rewards/ack")
        .add_header(
            axum::http::header::AUTHORIZATION,
            TestContext::verifier_header_value(),
        )
        .json(&serde_json::json!({ "event_id": first }))
        .await
        .assert_status_ok();

    let body: serde_json::Value = server
        .get("/api/worker/rewards")
        .add_header(
            axum::http::header::AUTHORIZATION,
            TestContext::verifier_header_value(),
        )
        .await
        .json();
    assert_eq!(body.as_array().unwrap().len(), 1);

    let world = ctx.state.world();
    let event = world.rewards.get(&first).unwrap();
    assert!(event.sent);
    assert!(event.sent_at.is_some());
}

/// A failure ack records the error and keeps the event pending for retry.
#[tokio::test]
async fn test_ack_failure_increments_attempts() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router()).unwrap();
    let id = seed_reward(&ctx, "p1");

    for attempt in 1..=2 {
        server
            .post("/api/worker/rewards/ack")
            .add_header(
                axum::http::header::AUTHORIZATION,
                TestContext::verifier_header_value(),
            )
            .json(&serde_json::json!({ "event_id": id, "error": "ledger 503" }))
            .await
            .assert_status_ok();

        let world = ctx.state.world();
        let event = world.rewards.get(&id).unwrap();
        assert!(!event.sent);
        assert_eq!(event.attempts, attempt);
        assert_eq!(event.last_error.as_deref(), Some("ledger 503"));
    }
}

/// Acking an unknown event is a 404.
#[tokio::test]
async fn test_ack_unknown_event_not_found() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router()).unwrap();

    server
        .post("/api/worker/rewards/ack")
        .add_header(
            axum::http::header::AUTHORIZATION,
            TestContext::verifier_header_value(),
        )
        .json(&serde_json::json!({ "event_id": 999 }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
