//! Gameplay endpoints: problem requests and answer submission

use axum::{extract::State, Extension, Json};
use chrono::Utc;

use crate::error::Result;
use crate::models::{AnswerRequest, AnswerResponse, ProblemView};
use crate::routes::auth::AuthenticatedPlayer;
use crate::services::{combat, problems};
use crate::AppState;

/// POST /api/problem
/// Issues the next adaptively selected problem, replacing any outstanding
/// one for the caller.
pub async fn request_problem(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedPlayer>,
) -> Result<Json<ProblemView>> {
    let view = problems::request_problem(&state, &auth.player_id, Utc::now())?;
    Ok(Json(view))
}

/// POST /api/answer
pub async fn submit_answer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedPlayer>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>> {
    let response = combat::submit_answer(&state, &auth.player_id, &payload, Utc::now())?;
    Ok(Json(response))
}
