//! Raid lifecycle endpoints

use axum::{extract::State, Extension, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::error::Result;
use crate::models::{JoinRoomRequest, LobbyView, RaidView, StartRaidRequest};
use crate::routes::auth::AuthenticatedPlayer;
use crate::services::raids;
use crate::AppState;

/// POST /api/raid/solo
pub async fn start_solo(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedPlayer>,
    Json(payload): Json<StartRaidRequest>,
) -> Result<Json<RaidView>> {
    let view = raids::start_solo(&state, &auth.player_id, &payload, Utc::now())?;
    Ok(Json(view))
}

/// POST /api/raid/room
pub async fn create_room(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedPlayer>,
    Json(payload): Json<StartRaidRequest>,
) -> Result<Json<RaidView>> {
    let view = raids::create_room(&state, &auth.player_id, &payload, Utc::now())?;
    Ok(Json(view))
}

/// POST /api/raid/join
pub async fn join_room(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedPlayer>,
    Json(payload): Json<JoinRoomRequest>,
) -> Result<Json<RaidView>> {
    let view =
        raids::join_room(&state, &auth.player_id, &payload.room_code, payload.track.as_deref())?;
    Ok(Json(view))
}

/// POST /api/raid/ready
pub async fn toggle_ready(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedPlayer>,
) -> Result<Json<RaidView>> {
    let view = raids::toggle_ready(&state, &auth.player_id)?;
    Ok(Json(view))
}

/// POST /api/raid/start
pub async fn start(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedPlayer>,
) -> Result<Json<RaidView>> {
    let view = raids::start(&state, &auth.player_id, Utc::now())?;
    Ok(Json(view))
}

/// POST /api/raid/rematch
pub async fn rematch(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedPlayer>,
) -> Result<Json<RaidView>> {
    let view = raids::rematch(&state, &auth.player_id)?;
    Ok(Json(view))
}

/// POST /api/raid/leave
pub async fn leave(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedPlayer>,
) -> Result<Json<Value>> {
    raids::leave(&state, &auth.player_id, Utc::now())?;
    Ok(Json(json!({ "ok": true })))
}

/// GET /api/raid
pub async fn current(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedPlayer>,
) -> Result<Json<RaidView>> {
    let view = raids::current(&state, &auth.player_id, Utc::now())?;
    Ok(Json(view))
}

/// GET /api/lobby
pub async fn lobby(State(state): State<AppState>) -> Result<Json<LobbyView>> {
    let rooms = state.world().open_rooms();
    Ok(Json(LobbyView { rooms }))
}
