//! Player profile endpoints

use axum::{extract::State, Extension, Json};
use chrono::Utc;

use crate::error::{ApiError, Result};
use crate::models::{ConnectRequest, PlayerView};
use crate::routes::auth::AuthenticatedPlayer;
use crate::services::players;
use crate::AppState;

/// POST /api/connect
/// Idempotent profile upsert for the player bound to the calling session.
pub async fn connect(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedPlayer>,
    Json(payload): Json<ConnectRequest>,
) -> Result<Json<PlayerView>> {
    let view = players::connect(&state, &auth.player_id, &payload, Utc::now())?;
    Ok(Json(view))
}

/// GET /api/player
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedPlayer>,
) -> Result<Json<PlayerView>> {
    let world = state.world();
    let player = world
        .players
        .get(&auth.player_id)
        .ok_or_else(|| ApiError::NotFound("player profile".to_string()))?;
    Ok(Json(player.to_view()))
}
