//! Problem issue: the stateful half of adaptive selection.
//!
//! The pure draw lives in `raid_core::selection`; this module builds the
//! candidate pool from the caller's mastery table and enforces the
//! one-outstanding-problem rule by keying problems on the player id.

use chrono::{DateTime, Utc};

use raid_core::selection::{self, Candidate};

use crate::error::{ApiError, Result};
use crate::models::{Problem, ProblemView, RaidState};
use crate::services::raids;
use crate::subscriptions::Event;
use crate::AppState;

/// Issue the next problem for the caller, replacing any outstanding one.
pub fn request_problem(state: &AppState, player_id: &str, now: DateTime<Utc>) -> Result<ProblemView> {
    let mut world = state.world();

    let (raid_id, grade) = {
        let player = world.players.get(player_id).ok_or_else(|| {
            ApiError::StateConflict("no player profile; call connect first".to_string())
        })?;
        let raid_id = player
            .in_raid
            .ok_or_else(|| ApiError::StateConflict("not in a raid".to_string()))?;
        (raid_id, player.grade)
    };

    raids::tick(&mut world, &state.events, raid_id, now);

    let boss = {
        let raid = world
            .raids
            .get(&raid_id)
            .ok_or_else(|| ApiError::Internal("raid referenced by player does not exist".to_string()))?;
        if raid.state != RaidState::InProgress {
            return Err(ApiError::StateConflict(format!(
                "raid is not in progress (state: {:?})",
                raid.state
            )));
        }
        raid.boss
    };

    let (track, last_fact) = {
        let participant = world
            .participant(raid_id, player_id)
            .filter(|p| p.active)
            .ok_or_else(|| ApiError::StateConflict("not active in this raid".to_string()))?;
        (participant.track.clone(), participant.last_fact.clone())
    };

    let facts = state.catalog.facts(&track)?;
    let mastered = world.mastered_count(player_id, facts);
    let mastery_percent = mastered as f32 / facts.len() as f32;

    let candidates: Vec<Candidate> = facts
        .iter()
        .map(|fact| {
            let mastery = world.mastery_state(player_id, &fact.key());
            Candidate {
                fact: *fact,
                level: mastery.map_or(0, |m| m.level),
                attempted: mastery.map_or(false, |m| m.attempted()),
            }
        })
        .collect();

    let mut rng = rand::thread_rng();
    let fact = selection::choose_fact(
        &candidates,
        mastery_percent,
        boss.restricts_pool(),
        last_fact.as_deref(),
        &track,
        &mut rng,
    )?;
    let (left, right) = fact.presented_operands(&mut rng);

    let id = world.next_problem_id();
    let problem = Problem {
        id,
        raid_id,
        player_id: player_id.to_string(),
        fact,
        left,
        right,
        issued_at: now,
    };
    let view = problem.to_view();
    // Keyed by player: inserting replaces whatever was outstanding.
    world.problems.insert(player_id.to_string(), problem);
    if let Some(participant) = world.participant_mut(raid_id, player_id) {
        participant.last_fact = Some(fact.key());
    }

    state.events.publish_player(player_id, &Event::ProblemIssued { problem: view.clone() });
    Ok(view)
}
