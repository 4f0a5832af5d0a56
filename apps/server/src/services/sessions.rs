//! Session binding: the trust root for every other operation.
//!
//! Sessions are created only by the verified gateway path. Every gameplay
//! command resolves the caller through its connection id; a client-supplied
//! player id is never accepted.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{CreateSessionRequest, RaidState, Session};
use crate::services::raids;
use crate::AppState;

/// Upsert the verified connection -> player binding.
///
/// Stale rows for the same player (unclean reconnect) or the same
/// connection id are evicted first.
pub fn create_session(state: &AppState, req: &CreateSessionRequest, now: DateTime<Utc>) -> Result<()> {
    let mut world = state.world();

    world
        .sessions
        .retain(|conn, s| s.player_id != req.player_id && conn != &req.connection_id);

    world.sessions.insert(
        req.connection_id,
        Session {
            connection_id: req.connection_id,
            player_id: req.player_id.clone(),
            connected_at: now,
        },
    );

    tracing::info!(
        player_id = %req.player_id,
        connection_id = %req.connection_id,
        "session created"
    );
    Ok(())
}

/// Tear down a connection. The session row goes away; the player profile
/// and mastery history stay. A raid in matchmaking is left outright, an
/// active raid degrades the slot to inactive and pauses once nobody is
/// left.
pub fn disconnect(state: &AppState, connection_id: Uuid, now: DateTime<Utc>) {
    let mut world = state.world();

    let Some(session) = world.sessions.remove(&connection_id) else {
        return;
    };
    let player_id = session.player_id;

    let Some(raid_id) = world.players.get(&player_id).and_then(|p| p.in_raid) else {
        tracing::info!(player_id = %player_id, "disconnected");
        return;
    };

    let raid_state = world.raids.get(&raid_id).map(|r| r.state);
    tracing::info!(player_id = %player_id, raid_id, ?raid_state, "disconnected mid-raid");

    match raid_state {
        Some(RaidState::Matchmaking) | Some(RaidState::Rematch) => {
            raids::remove_from_roster(&mut world, raid_id, &player_id);
            if world.active_count(raid_id) == 0 {
                raids::cleanup_raid(&mut world, &state.events, raid_id, "emptied");
            }
            state.events.set_raid(&player_id, None);
        }
        Some(_) => {
            // Keep in_raid set so the player can resume on reconnect.
            if let Some(participant) = world.participant_mut(raid_id, &player_id) {
                participant.active = false;
            }
            raids::pause_if_empty(&mut world, &state.events, raid_id, now);
        }
        None => {}
    }
}
