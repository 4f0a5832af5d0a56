//! WebSocket delta stream
//!
//! Clients open one socket per connection; the subscription router decides
//! which deltas reach it (current raid + lobby + private events). Closing
//! the socket tears the session down, which is what marks the participant
//! inactive and lets an emptied raid pause.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::services::sessions;
use crate::AppState;

/// Query parameters for the upgrade request. Browsers cannot set headers
/// on WebSocket handshakes, so the session token rides in the query.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub token: Uuid,
}

/// GET /api/events
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<EventsQuery>,
    State(state): State<AppState>,
) -> Result<Response> {
    let connection_id = query.token;
    let (player_id, raid_id) = {
        let world = state.world();
        let player_id = world
            .player_id_for_connection(&connection_id)
            .map(str::to_string)
            .ok_or_else(|| {
                ApiError::Unauthenticated("no session for this connection".to_string())
            })?;
        let raid_id = world.players.get(&player_id).and_then(|p| p.in_raid);
        (player_id, raid_id)
    };

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, connection_id, player_id, raid_id)))
}

async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    connection_id: Uuid,
    player_id: String,
    raid_id: Option<u64>,
) {
    let mut rx = state.events.register(connection_id, player_id.clone(), raid_id);
    let (mut sender, mut receiver) = socket.split();

    tracing::info!(%connection_id, %player_id, "event stream opened");

    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to serialize event");
                }
            }
        }
    });

    // The stream is push-only; incoming frames just keep the socket alive
    // until the client closes it.
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }

    send_task.abort();
    state.events.unregister(&connection_id);
    sessions::disconnect(&state, connection_id, Utc::now());
    tracing::info!(%connection_id, %player_id, "event stream closed");
}
