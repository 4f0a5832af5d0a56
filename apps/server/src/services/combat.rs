//! Answer submission: validation, damage, mastery, and the killing blow.

use chrono::{DateTime, Utc};

use raid_core::{combat, mastery};

use crate::error::{ApiError, Result};
use crate::models::{AnswerRequest, AnswerResponse, RaidState};
use crate::services::raids;
use crate::subscriptions::Event;
use crate::AppState;

/// Resolve one submitted answer as a single transaction.
///
/// Concurrent submissions against the same boss are serialized by the
/// world lock; damage applies in lock-acquisition order and whichever
/// answer drives HP to zero takes the killing blow.
pub fn submit_answer(
    state: &AppState,
    player_id: &str,
    req: &AnswerRequest,
    now: DateTime<Utc>,
) -> Result<AnswerResponse> {
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

    {
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
    }

    // Validate before mutating anything: a rejected call leaves no trace.
    let (fact, correct) = {
        let problem = world
            .problems
            .get(player_id)
            .ok_or_else(|| ApiError::Validation("no outstanding problem".to_string()))?;
        if problem.id != req.problem_id {
            return Err(ApiError::Validation(format!("stale problem id {}", req.problem_id)));
        }
        if problem.raid_id != raid_id {
            return Err(ApiError::Validation("problem belongs to another raid".to_string()));
        }
        (problem.fact, req.value == problem.fact.answer())
    };
    let response_ms = combat::clamp_response_ms(req.response_ms);

    world.problems.remove(player_id);
    let fact_key = fact.key();

    // Remediation answers touch last_seen only: no damage, no score, and
    // never a mastery advance. Fluency is proven on the timed path.
    if req.firmup {
        mastery::practice_touch(world.mastery_state_mut(player_id, &fact_key, now), now);
        let (boss_hp, raid_state) = world
            .raids
            .get(&raid_id)
            .map(|r| (r.boss_hp, r.state))
            .unwrap_or((0, RaidState::Failed));
        return Ok(AnswerResponse { correct, damage: 0, crit: false, boss_hp, raid_state });
    }

    let level = mastery::record_attempt(
        world.mastery_state_mut(player_id, &fact_key, now),
        grade,
        correct,
        response_ms,
        now,
    );
    update_player_stats(&mut world, player_id, correct, response_ms, now);

    let roll = if correct {
        combat::resolve_damage(response_ms, grade, &mut rand::thread_rng())
    } else {
        combat::DamageRoll { amount: 0, crit: false }
    };

    // Damage never overshoots: the final blow is clamped to remaining HP.
    let remaining = world.raids.get(&raid_id).map(|r| r.boss_hp).unwrap_or(0);
    let damage = roll.amount.min(remaining);

    if let Some(participant) = world.participant_mut(raid_id, player_id) {
        participant.problems_answered = participant.problems_answered.saturating_add(1);
        if correct {
            participant.correct_answers = participant.correct_answers.saturating_add(1);
            participant.fastest_answer_ms = Some(
                participant.fastest_answer_ms.map_or(response_ms, |f| f.min(response_ms)),
            );
        }
        participant.damage_dealt = participant.damage_dealt.saturating_add(damage);
    }

    let mut boss_hp = remaining;
    if damage > 0 {
        if let Some(raid) = world.raids.get_mut(&raid_id) {
            raid.boss_hp = raid.boss_hp.saturating_sub(damage);
            boss_hp = raid.boss_hp;
        }
        state.events.publish_raid(
            raid_id,
            &Event::BossDamaged {
                raid_id,
                player_id: player_id.to_string(),
                damage,
                crit: roll.crit,
                boss_hp,
            },
        );
        if boss_hp == 0 {
            tracing::info!(raid_id, player_id, "killing blow landed");
            raids::end_raid(&mut world, &state.events, raid_id, true, now);
        }
    }

    tracing::debug!(
        raid_id,
        player_id,
        fact = %fact_key,
        correct,
        response_ms,
        damage,
        level,
        "answer resolved"
    );

    let raid_state = world.raids.get(&raid_id).map(|r| r.state).unwrap_or(RaidState::Victory);
    Ok(AnswerResponse { correct, damage, crit: roll.crit, boss_hp, raid_state })
}

/// Lifetime stats: rolling average over correct answers, overflow-safe.
fn update_player_stats(
    world: &mut crate::world::World,
    player_id: &str,
    correct: bool,
    response_ms: u32,
    now: DateTime<Utc>,
) {
    let Some(player) = world.players.get_mut(player_id) else {
        return;
    };
    player.total_problems = player.total_problems.saturating_add(1);
    if correct {
        player.total_correct = player.total_correct.saturating_add(1);
        if player.total_correct == 1 {
            player.avg_response_ms = response_ms;
        } else {
            let prior = u64::from(player.avg_response_ms)
                * u64::from(player.total_correct.saturating_sub(1));
            let total = prior.saturating_add(u64::from(response_ms));
            player.avg_response_ms =
                (total / u64::from(player.total_correct)).min(u64::from(u32::MAX)) as u32;
        }
        player.best_response_ms =
            Some(player.best_response_ms.map_or(response_ms, |b| b.min(response_ms)));
    }
    player.last_played = now;
}
