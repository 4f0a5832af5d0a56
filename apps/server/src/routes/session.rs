//! Verifier-gated endpoints: session creation and mastery administration

use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::error::Result;
use crate::models::{CreateSessionRequest, ResetMasteryRequest};
use crate::services::{players, sessions};
use crate::AppState;

/// POST /api/session
/// Called by the identity gateway after verifying the login credential.
pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<Json<Value>> {
    sessions::create_session(&state, &payload, Utc::now())?;
    Ok(Json(json!({ "ok": true })))
}

/// POST /api/admin/reset-mastery
/// The explicit reset: the only operation that lowers a mastery level.
pub async fn reset_mastery(
    State(state): State<AppState>,
    Json(payload): Json<ResetMasteryRequest>,
) -> Result<Json<Value>> {
    let reset = players::reset_mastery(&state, &payload, Utc::now())?;
    Ok(Json(json!({ "reset": reset })))
}
