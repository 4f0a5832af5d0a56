//! Reward-delivery worker endpoints
//!
//! The engine never performs the ledger network call itself: an external
//! worker polls unsent events, posts them, and acknowledges the outcome.

use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::error::Result;
use crate::models::{RewardAckRequest, RewardEventView};
use crate::services::rewards;
use crate::AppState;

/// GET /api/worker/rewards
pub async fn pending(State(state): State<AppState>) -> Result<Json<Vec<RewardEventView>>> {
    Ok(Json(rewards::pending_rewards(&state)))
}

/// POST /api/worker/rewards/ack
pub async fn ack(
    State(state): State<AppState>,
    Json(payload): Json<RewardAckRequest>,
) -> Result<Json<Value>> {
    rewards::ack_reward(&state, &payload, Utc::now())?;
    Ok(Json(json!({ "ok": true })))
}
