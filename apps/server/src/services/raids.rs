//! Raid lifecycle: creation, rooms, the state machine, and timers.
//!
//! Timers are advanced by wall-clock comparison in [`tick`], which runs at
//! the head of every raid-touching command and from the periodic sweep —
//! the engine never blocks waiting on a timer.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use raid_core::{catalog, BossKind};

use crate::error::{ApiError, Result};
use crate::models::{Participant, Raid, RaidState, RaidView, StartRaidRequest};
use crate::services::rewards;
use crate::subscriptions::{Event, SubscriptionRouter};
use crate::world::World;
use crate::AppState;

/// Pre-battle countdown length.
pub const COUNTDOWN_SECS: i64 = 4;

/// Maximum players in a private room.
pub const MAX_PLAYERS_PER_RAID: usize = 10;

/// Room codes avoid glyphs players confuse at a distance.
const ROOM_CODE_CHARS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const ROOM_CODE_LEN: usize = 4;

/// Start a solo raid: straight into countdown, caller is the whole roster.
pub fn start_solo(
    state: &AppState,
    player_id: &str,
    req: &StartRaidRequest,
    now: DateTime<Utc>,
) -> Result<RaidView> {
    let mut world = state.world();
    let (grade, track) = prepare_entry(&world, player_id, req.track.as_deref())?;
    let boss = boss_from_request(req, grade)?;

    let raid_id = world.next_raid_id();
    let hp = boss.base_hp(); // one participant
    world.raids.insert(
        raid_id,
        Raid {
            id: raid_id,
            boss,
            boss_hp: hp,
            boss_max_hp: hp,
            state: RaidState::Countdown,
            room_code: None,
            created_at: now,
            countdown_started_at: Some(now),
            started_at: None,
            pause_started_at: None,
            duration_seconds: None,
        },
    );
    world
        .participants
        .insert(raid_id, vec![Participant::new(raid_id, player_id.to_string(), track.clone(), true)]);
    enter_raid(&mut world, state, player_id, raid_id, &track);

    tracing::info!(raid_id, player_id, %track, ?boss, hp, "solo raid created");
    raid_view(&world, raid_id)
}

/// Open a private room in matchmaking with a shareable code.
pub fn create_room(
    state: &AppState,
    player_id: &str,
    req: &StartRaidRequest,
    now: DateTime<Utc>,
) -> Result<RaidView> {
    let mut world = state.world();
    let (grade, track) = prepare_entry(&world, player_id, req.track.as_deref())?;
    let boss = boss_from_request(req, grade)?;

    let mut code = generate_room_code();
    while world.room_code_in_use(&code) {
        code = generate_room_code();
    }

    let raid_id = world.next_raid_id();
    let hp = boss.base_hp(); // rescaled to the roster when the raid starts
    world.raids.insert(
        raid_id,
        Raid {
            id: raid_id,
            boss,
            boss_hp: hp,
            boss_max_hp: hp,
            state: RaidState::Matchmaking,
            room_code: Some(code.clone()),
            created_at: now,
            countdown_started_at: None,
            started_at: None,
            pause_started_at: None,
            duration_seconds: None,
        },
    );
    world
        .participants
        .insert(raid_id, vec![Participant::new(raid_id, player_id.to_string(), track.clone(), true)]);
    enter_raid(&mut world, state, player_id, raid_id, &track);

    publish_room(&world, state, raid_id);
    tracing::info!(raid_id, player_id, code = %code, "room created");
    raid_view(&world, raid_id)
}

/// Join an open room by code.
pub fn join_room(
    state: &AppState,
    player_id: &str,
    room_code: &str,
    track: Option<&str>,
) -> Result<RaidView> {
    let code = room_code.to_uppercase();
    if code.len() != ROOM_CODE_LEN || !code.bytes().all(|b| ROOM_CODE_CHARS.contains(&b)) {
        return Err(ApiError::Validation(format!("malformed room code: {room_code}")));
    }

    let mut world = state.world();
    let (_, track) = prepare_entry(&world, player_id, track)?;

    let raid_id = world
        .raids
        .values()
        .find(|r| r.state == RaidState::Matchmaking && r.room_code.as_deref() == Some(code.as_str()))
        .map(|r| r.id)
        .ok_or_else(|| ApiError::NotFound(format!("room {code}")))?;

    if world.active_count(raid_id) >= MAX_PLAYERS_PER_RAID {
        return Err(ApiError::StateConflict(format!("room {code} is full")));
    }

    // A stale slot from an earlier disconnect is reactivated, never duplicated.
    if let Some(existing) = world.participant_mut(raid_id, player_id) {
        existing.active = true;
        existing.ready = false;
        existing.leader = false;
    } else if let Some(roster) = world.participants.get_mut(&raid_id) {
        roster.push(Participant::new(raid_id, player_id.to_string(), track.clone(), false));
    }
    enter_raid(&mut world, state, player_id, raid_id, &track);

    publish_room(&world, state, raid_id);
    publish_roster(&world, state, raid_id);
    tracing::info!(raid_id, player_id, code = %code, "joined room");
    raid_view(&world, raid_id)
}

/// Flip the caller's ready flag while the room is forming.
pub fn toggle_ready(state: &AppState, player_id: &str) -> Result<RaidView> {
    let mut world = state.world();
    let raid_id = current_raid_id(&world, player_id)?;

    let raid_state =
        world.raids.get(&raid_id).map(|r| r.state).ok_or_else(raid_missing)?;
    if !matches!(raid_state, RaidState::Matchmaking | RaidState::Rematch) {
        return Err(ApiError::StateConflict("raid is not waiting to start".to_string()));
    }

    let participant = world
        .participant_mut(raid_id, player_id)
        .ok_or_else(|| ApiError::StateConflict("not a participant".to_string()))?;
    participant.ready = !participant.ready;

    publish_roster(&world, state, raid_id);
    raid_view(&world, raid_id)
}

/// Leader starts a formed room (or a rematch) once everyone is ready.
pub fn start(state: &AppState, player_id: &str, now: DateTime<Utc>) -> Result<RaidView> {
    let mut world = state.world();
    let raid_id = current_raid_id(&world, player_id)?;

    let raid_state =
        world.raids.get(&raid_id).map(|r| r.state).ok_or_else(raid_missing)?;
    if !matches!(raid_state, RaidState::Matchmaking | RaidState::Rematch) {
        return Err(ApiError::StateConflict("raid is not waiting to start".to_string()));
    }

    let active: Vec<Participant> =
        world.roster(raid_id).iter().filter(|p| p.active).cloned().collect();
    let leader_ok = active.iter().any(|p| p.player_id == player_id && p.leader);
    if !leader_ok {
        return Err(ApiError::StateConflict("only the leader can start the raid".to_string()));
    }
    if active.len() < 2 {
        return Err(ApiError::StateConflict(
            "multiplayer raids need at least 2 players".to_string(),
        ));
    }
    if !active.iter().all(|p| p.ready) {
        return Err(ApiError::StateConflict("not all players are ready".to_string()));
    }

    let started_id = match raid_state {
        RaidState::Matchmaking => {
            begin_countdown(&mut world, raid_id, active.len() as u32, now);
            raid_id
        }
        // A rematch spawns a fresh raid record; the old one is terminal.
        _ => spawn_rematch_raid(&mut world, state, raid_id, &active, now),
    };

    if let Some(raid) = world.raids.get(&started_id) {
        state.events.publish_raid(
            started_id,
            &Event::RaidStateChanged { raid_id: started_id, state: raid.state },
        );
        tracing::info!(
            raid_id = started_id,
            players = active.len(),
            hp = raid.boss_max_hp,
            "raid countdown started"
        );
    }
    // Starting removes the room from the open-lobbies view.
    let had_room = world.raids.get(&raid_id).and_then(|r| r.room_code.as_deref()).is_some();
    if had_room {
        state.events.publish_lobby(&Event::RoomClosed { raid_id });
    }
    raid_view(&world, started_id)
}

/// Move a finished raid into the rematch lobby.
pub fn rematch(state: &AppState, player_id: &str) -> Result<RaidView> {
    let mut world = state.world();
    let raid_id = current_raid_id(&world, player_id)?;

    let raid = world.raids.get_mut(&raid_id).ok_or_else(raid_missing)?;
    if !matches!(raid.state, RaidState::Victory | RaidState::Failed) {
        return Err(ApiError::StateConflict("raid is not finished".to_string()));
    }
    raid.state = RaidState::Rematch;

    if let Some(roster) = world.participants.get_mut(&raid_id) {
        for p in roster.iter_mut().filter(|p| p.active) {
            p.ready = false;
        }
    }

    state
        .events
        .publish_raid(raid_id, &Event::RaidStateChanged { raid_id, state: RaidState::Rematch });
    publish_roster(&world, state, raid_id);
    raid_view(&world, raid_id)
}

/// Leave the current raid. Emptied matchmaking rooms close immediately;
/// an emptied battle pauses for the reconnect grace window.
pub fn leave(state: &AppState, player_id: &str, now: DateTime<Utc>) -> Result<()> {
    let mut world = state.world();
    let raid_id = current_raid_id(&world, player_id)?;
    tick(&mut world, &state.events, raid_id, now);

    remove_from_roster(&mut world, raid_id, player_id);

    let raid_state = world.raids.get(&raid_id).map(|r| r.state);
    match raid_state {
        Some(RaidState::Matchmaking) | Some(RaidState::Rematch) => {
            if world.active_count(raid_id) == 0 {
                cleanup_raid(&mut world, &state.events, raid_id, "left");
            } else {
                publish_room(&world, state, raid_id);
                publish_roster(&world, state, raid_id);
            }
        }
        Some(RaidState::Countdown) | Some(RaidState::InProgress) => {
            pause_if_empty(&mut world, &state.events, raid_id, now);
            publish_roster(&world, state, raid_id);
        }
        _ => {}
    }

    state.events.set_raid(player_id, None);
    state.events.publish_player(player_id, &Event::RaidLeft { raid_id });
    tracing::info!(raid_id, player_id, "left raid");
    Ok(())
}

/// Snapshot of the caller's current raid.
pub fn current(state: &AppState, player_id: &str, now: DateTime<Utc>) -> Result<RaidView> {
    let mut world = state.world();
    let raid_id = current_raid_id(&world, player_id)?;
    tick(&mut world, &state.events, raid_id, now);
    raid_view(&world, raid_id)
}

// === State machine internals (called with the world already locked) ===

/// Advance wall-clock driven transitions for one raid.
pub(crate) fn tick(world: &mut World, events: &SubscriptionRouter, raid_id: u64, now: DateTime<Utc>) {
    let Some(raid) = world.raids.get_mut(&raid_id) else {
        return;
    };
    match raid.state {
        RaidState::Countdown => {
            let done = raid
                .countdown_started_at
                .map_or(true, |t| now - t >= Duration::seconds(COUNTDOWN_SECS));
            if done {
                raid.state = RaidState::InProgress;
                raid.started_at = Some(now);
                raid.countdown_started_at = None;
                events.publish_raid(
                    raid_id,
                    &Event::RaidStateChanged { raid_id, state: RaidState::InProgress },
                );
            }
        }
        RaidState::InProgress => {
            let deadline_passed = raid.started_at.map_or(false, |t| {
                (now - t).num_seconds() >= raid.boss.duration_secs() as i64
            });
            if deadline_passed && raid.boss_hp > 0 {
                end_raid(world, events, raid_id, false, now);
            }
        }
        _ => {}
    }
}

/// Terminal transition plus settlement. Idempotent: a raid already ended
/// stays ended.
pub(crate) fn end_raid(
    world: &mut World,
    events: &SubscriptionRouter,
    raid_id: u64,
    victory: bool,
    now: DateTime<Utc>,
) {
    let Some(raid) = world.raids.get_mut(&raid_id) else {
        return;
    };
    if raid.state.is_terminal() {
        return;
    }

    let duration_seconds = raid
        .started_at
        .map(|t| (now - t).num_seconds().max(1) as u32)
        .unwrap_or(1);
    raid.state = if victory { RaidState::Victory } else { RaidState::Failed };
    raid.duration_seconds = Some(duration_seconds);

    // Outstanding problems die with the battle.
    let roster_ids: Vec<String> =
        world.roster(raid_id).iter().map(|p| p.player_id.clone()).collect();
    for pid in &roster_ids {
        world.problems.remove(pid);
    }

    let state = if victory { RaidState::Victory } else { RaidState::Failed };
    events.publish_raid(raid_id, &Event::RaidStateChanged { raid_id, state });
    events.publish_raid(raid_id, &Event::RaidEnded { raid_id, victory, duration_seconds });

    tracing::info!(
        raid_id,
        outcome = if victory { "victory" } else { "defeat" },
        duration_seconds,
        players = roster_ids.len(),
        "raid ended"
    );

    rewards::settle(world, events, raid_id, victory, duration_seconds, now);
}

/// Pause when the last active participant is gone.
pub(crate) fn pause_if_empty(
    world: &mut World,
    events: &SubscriptionRouter,
    raid_id: u64,
    now: DateTime<Utc>,
) {
    if world.active_count(raid_id) > 0 {
        return;
    }
    let Some(raid) = world.raids.get_mut(&raid_id) else {
        return;
    };
    if !matches!(raid.state, RaidState::InProgress | RaidState::Countdown) {
        return;
    }
    raid.state = RaidState::Paused;
    raid.pause_started_at = Some(now);
    events.publish_raid(raid_id, &Event::RaidStateChanged { raid_id, state: RaidState::Paused });
    tracing::info!(raid_id, "raid paused, all participants disconnected");
}

/// Resume a paused raid, shifting the start so paused time never counts
/// against the battle timer. Resuming past the deadline fails the raid.
pub(crate) fn resume_from_pause(
    world: &mut World,
    events: &SubscriptionRouter,
    raid_id: u64,
    now: DateTime<Utc>,
) {
    let remaining = {
        let Some(raid) = world.raids.get_mut(&raid_id) else {
            return;
        };
        if raid.state != RaidState::Paused {
            return;
        }

        let paused_at = raid.pause_started_at.unwrap_or(now);
        let pause_duration = now - paused_at;
        let started_at = raid.started_at.map(|t| t + pause_duration).unwrap_or(now);

        let elapsed = (now - started_at).num_seconds().max(0);
        let remaining = raid.boss.duration_secs() as i64 - elapsed;

        raid.started_at = Some(started_at);
        raid.pause_started_at = None;
        if remaining > 0 {
            raid.state = RaidState::InProgress;
        }
        remaining
    };

    if remaining <= 0 {
        end_raid(world, events, raid_id, false, now);
        return;
    }

    events
        .publish_raid(raid_id, &Event::RaidStateChanged { raid_id, state: RaidState::InProgress });
    tracing::info!(raid_id, remaining_secs = remaining, "raid resumed");
}

/// Deactivate a slot, hand leadership on, and clear the player's raid
/// reference. Stats stay for the results screen.
pub(crate) fn remove_from_roster(world: &mut World, raid_id: u64, player_id: &str) {
    let mut was_leader = false;
    if let Some(participant) = world.participant_mut(raid_id, player_id) {
        was_leader = participant.leader;
        participant.active = false;
        participant.leader = false;
    }

    if was_leader {
        if let Some(roster) = world.participants.get_mut(&raid_id) {
            if let Some(next_leader) = roster.iter_mut().find(|p| p.active) {
                next_leader.leader = true;
                tracing::info!(raid_id, to = %next_leader.player_id, "leadership transferred");
            }
        }
    }

    world.problems.remove(player_id);
    if let Some(player) = world.players.get_mut(player_id) {
        if player.in_raid == Some(raid_id) {
            player.in_raid = None;
        }
    }
}

/// Retire a raid record and everything hanging off it.
pub(crate) fn cleanup_raid(
    world: &mut World,
    events: &SubscriptionRouter,
    raid_id: u64,
    reason: &str,
) {
    let had_room = world.raids.get(&raid_id).and_then(|r| r.room_code.clone()).is_some();
    let roster = world.participants.remove(&raid_id).unwrap_or_default();
    for participant in &roster {
        world.problems.remove(&participant.player_id);
        if let Some(player) = world.players.get_mut(&participant.player_id) {
            if player.in_raid == Some(raid_id) {
                player.in_raid = None;
            }
        }
        events.set_raid(&participant.player_id, None);
    }
    world.raids.remove(&raid_id);

    if had_room {
        events.publish_lobby(&Event::RoomClosed { raid_id });
    }
    tracing::info!(raid_id, reason, players = roster.len(), "raid retired");
}

// === Helpers ===

fn raid_missing() -> ApiError {
    ApiError::Internal("raid referenced by player does not exist".to_string())
}

fn current_raid_id(world: &World, player_id: &str) -> Result<u64> {
    world
        .players
        .get(player_id)
        .and_then(|p| p.in_raid)
        .ok_or_else(|| ApiError::StateConflict("not in a raid".to_string()))
}

/// Shared entry validation: profile exists, not already raiding, track known.
fn prepare_entry(world: &World, player_id: &str, track: Option<&str>) -> Result<(u8, String)> {
    let player = world
        .players
        .get(player_id)
        .ok_or_else(|| ApiError::StateConflict("no player profile; call connect first".to_string()))?;
    if player.in_raid.is_some() {
        return Err(ApiError::StateConflict("already in a raid".to_string()));
    }

    let track_id = track
        .map(str::to_string)
        .or_else(|| player.track.clone())
        .unwrap_or_else(|| catalog::default_track_for_grade(player.grade).id.to_string());
    if catalog::track(&track_id).is_none() {
        return Err(ApiError::Validation(format!("unknown track: {track_id}")));
    }
    Ok((player.grade, track_id))
}

fn boss_from_request(req: &StartRaidRequest, _grade: u8) -> Result<BossKind> {
    BossKind::from_level(req.boss_level).ok_or_else(|| {
        ApiError::Validation(format!(
            "invalid boss level {} (expected 0-8)",
            req.boss_level.unwrap_or_default()
        ))
    })
}

fn enter_raid(world: &mut World, state: &AppState, player_id: &str, raid_id: u64, track: &str) {
    if let Some(player) = world.players.get_mut(player_id) {
        player.in_raid = Some(raid_id);
        player.track = Some(track.to_string());
    }
    state.events.set_raid(player_id, Some(raid_id));
    state.events.publish_player(player_id, &Event::RaidJoined { raid_id });
}

/// Scale HP to the roster and enter countdown.
fn begin_countdown(world: &mut World, raid_id: u64, active_players: u32, now: DateTime<Utc>) {
    if let Some(raid) = world.raids.get_mut(&raid_id) {
        let hp = raid.boss.base_hp() * active_players.max(1);
        raid.boss_hp = hp;
        raid.boss_max_hp = hp;
        raid.state = RaidState::Countdown;
        raid.countdown_started_at = Some(now);
        raid.started_at = None;
        raid.pause_started_at = None;
    }
}

/// Fresh raid for a rematch, migrating the active roster.
fn spawn_rematch_raid(
    world: &mut World,
    state: &AppState,
    old_raid_id: u64,
    active: &[Participant],
    now: DateTime<Utc>,
) -> u64 {
    let (boss, room_code) = world
        .raids
        .get(&old_raid_id)
        .map(|r| (r.boss, r.room_code.clone()))
        .unwrap_or((BossKind::Adaptive, None));

    let new_id = world.next_raid_id();
    let hp = boss.base_hp() * (active.len() as u32).max(1);
    world.raids.insert(
        new_id,
        Raid {
            id: new_id,
            boss,
            boss_hp: hp,
            boss_max_hp: hp,
            state: RaidState::Countdown,
            room_code,
            created_at: now,
            countdown_started_at: Some(now),
            started_at: None,
            pause_started_at: None,
            duration_seconds: None,
        },
    );

    let roster: Vec<Participant> = active
        .iter()
        .map(|old| {
            let mut p =
                Participant::new(new_id, old.player_id.clone(), old.track.clone(), old.leader);
            p.ready = true; // everyone just readied up for the rematch
            p
        })
        .collect();
    world.participants.insert(new_id, roster);

    // The old record is terminal; deactivate its roster and move players over.
    if let Some(old_roster) = world.participants.get_mut(&old_raid_id) {
        for p in old_roster.iter_mut() {
            p.active = false;
        }
    }
    for p in active {
        if let Some(player) = world.players.get_mut(&p.player_id) {
            player.in_raid = Some(new_id);
        }
        state.events.set_raid(&p.player_id, Some(new_id));
        state.events.publish_player(&p.player_id, &Event::RaidJoined { raid_id: new_id });
    }

    new_id
}

fn generate_room_code() -> String {
    let mut rng = rand::thread_rng();
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_CHARS[rng.gen_range(0..ROOM_CODE_CHARS.len())] as char)
        .collect()
}

fn publish_room(world: &World, state: &AppState, raid_id: u64) {
    if let Some(room) = world.open_rooms().into_iter().find(|r| r.raid_id == raid_id) {
        state.events.publish_lobby(&Event::RoomUpdated { room });
    }
}

fn publish_roster(world: &World, state: &AppState, raid_id: u64) {
    let participants = world.roster(raid_id).iter().map(|p| p.to_view()).collect();
    state.events.publish_raid(raid_id, &Event::RosterChanged { raid_id, participants });
}

fn raid_view(world: &World, raid_id: u64) -> Result<RaidView> {
    let raid = world.raids.get(&raid_id).ok_or_else(raid_missing)?;
    Ok(raid.to_view(world.roster(raid_id)))
}
