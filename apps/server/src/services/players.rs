//! Player profile upsert and mastery administration.

use chrono::{DateTime, Utc};

use raid_core::mastery;

use crate::error::{ApiError, Result};
use crate::models::{ConnectRequest, Player, PlayerView, RaidState, ResetMasteryRequest};
use crate::services::raids;
use crate::AppState;

/// Idempotent profile upsert for the player bound to the calling session.
///
/// Grade is only overwritten when the caller provides one; a failed
/// upstream grade lookup keeps the stored value. Reconnecting into a
/// paused raid reactivates the slot and resumes the battle.
pub fn connect(
    state: &AppState,
    player_id: &str,
    req: &ConnectRequest,
    now: DateTime<Utc>,
) -> Result<PlayerView> {
    let mut world = state.world();

    let raid_to_resume = {
        let player = world
            .players
            .entry(player_id.to_string())
            .or_insert_with(|| {
                Player::new(player_id.to_string(), req.name.clone(), req.grade.unwrap_or(3), now)
            });

        player.name = req.name.clone();
        if let Some(grade) = req.grade {
            if player.grade != grade.min(5) {
                tracing::info!(
                    player_id = %player.id,
                    from = player.grade,
                    to = grade.min(5),
                    "grade changed"
                );
            }
            player.grade = grade.min(5);
        }
        if req.external_id.is_some() {
            player.external_id = req.external_id.clone();
        }
        if req.email.is_some() {
            player.email = req.email.clone();
        }
        player.last_played = now;
        player.in_raid
    };

    // Reconnect path: pick the battle back up if it was waiting on us.
    if let Some(raid_id) = raid_to_resume {
        match world.raids.get(&raid_id).map(|r| r.state) {
            Some(RaidState::Paused) | Some(RaidState::InProgress) => {
                if let Some(participant) = world.participant_mut(raid_id, player_id) {
                    participant.active = true;
                }
                raids::resume_from_pause(&mut world, &state.events, raid_id, now);
                state.events.set_raid(player_id, Some(raid_id));
                tracing::info!(player_id, raid_id, "rejoined raid on reconnect");
            }
            Some(_) => {}
            None => {
                // Stale reference from a raid the sweep already retired.
                if let Some(player) = world.players.get_mut(player_id) {
                    player.in_raid = None;
                }
            }
        }
    }

    let player = world
        .players
        .get(player_id)
        .ok_or_else(|| ApiError::Internal("player vanished during connect".to_string()))?;
    tracing::info!(player_id = %player.id, grade = player.grade, raids = player.total_raids, "connected");
    Ok(player.to_view())
}

/// Explicit mastery reset: the only path that lowers a level.
pub fn reset_mastery(state: &AppState, req: &ResetMasteryRequest, now: DateTime<Utc>) -> Result<u32> {
    let mut world = state.world();

    let Some(states) = world.mastery.get_mut(&req.player_id) else {
        return Ok(0);
    };

    let mut reset_count = 0u32;
    match &req.fact_key {
        Some(key) => {
            if let Some(fact_state) = states.get_mut(key) {
                mastery::reset(fact_state, now);
                reset_count = 1;
            }
        }
        None => {
            for fact_state in states.values_mut() {
                mastery::reset(fact_state, now);
                reset_count += 1;
            }
        }
    }

    tracing::info!(player_id = %req.player_id, reset_count, "mastery reset");
    Ok(reset_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AppState, ServerConfig};

    fn test_state() -> AppState {
        AppState::new(ServerConfig { verifier_token: "test-verifier".to_string() })
    }

    fn connect_req(name: &str, grade: Option<u8>) -> ConnectRequest {
        ConnectRequest { name: name.to_string(), grade, external_id: None, email: None }
    }

    #[test]
    fn connect_creates_then_updates() {
        let state = test_state();
        let now = Utc::now();

        let view = connect(&state, "p1", &connect_req("Ada", Some(2)), now).unwrap();
        assert_eq!(view.grade, 2);

        // Absent grade keeps the stored one; name refreshes.
        let view = connect(&state, "p1", &connect_req("Ada L", None), now).unwrap();
        assert_eq!(view.grade, 2);
        assert_eq!(view.name, "Ada L");
    }

    #[test]
    fn connect_caps_grade_at_five() {
        let state = test_state();
        let view = connect(&state, "p1", &connect_req("Ada", Some(9)), Utc::now()).unwrap();
        assert_eq!(view.grade, 5);
    }

    #[test]
    fn reset_mastery_clears_levels() {
        let state = test_state();
        let now = Utc::now();
        connect(&state, "p1", &connect_req("Ada", Some(3)), now).unwrap();
        state.world().mastery_state_mut("p1", "4×7", now).level = 5;

        let count = reset_mastery(
            &state,
            &ResetMasteryRequest { player_id: "p1".to_string(), fact_key: None },
            now,
        )
        .unwrap();

        assert_eq!(count, 1);
        assert_eq!(state.world().mastery_state("p1", "4×7").unwrap().level, 0);
    }
}
