//! Raid settlement: engagement-gated rewards and the ledger event queue.

use chrono::{DateTime, Utc};
use serde_json::json;

use raid_core::engagement;

use crate::error::{ApiError, Result};
use crate::models::{PerformanceSnapshot, RewardAckRequest, RewardEvent, RewardEventView};
use crate::subscriptions::{Event, SubscriptionRouter};
use crate::world::World;
use crate::AppState;

/// In-game currency granted per credit-minute.
pub const CURRENCY_PER_CREDIT: f32 = 100.0;

/// Settle every participant of a finished raid.
///
/// The engagement baseline is the participant's best CQPM *before* this
/// session: the snapshot is inserted only after the reward is computed, so
/// a session can never inflate the baseline used to judge itself.
pub(crate) fn settle(
    world: &mut World,
    events: &SubscriptionRouter,
    raid_id: u64,
    victory: bool,
    duration_seconds: u32,
    now: DateTime<Utc>,
) {
    let roster: Vec<_> = world
        .roster(raid_id)
        .iter()
        .filter(|p| p.problems_answered > 0 || p.damage_dealt > 0)
        .cloned()
        .collect();

    for participant in roster {
        let best_cqpm = world.best_cqpm(&participant.player_id, &participant.track);
        let session_cqpm =
            engagement::session_cqpm(participant.correct_answers, duration_seconds);
        let credit = engagement::session_reward(
            duration_seconds,
            participant.correct_answers,
            participant.problems_answered,
            best_cqpm,
        );

        world.snapshots.push(PerformanceSnapshot {
            player_id: participant.player_id.clone(),
            track: participant.track.clone(),
            session_seconds: duration_seconds,
            problems_attempted: participant.problems_answered,
            problems_correct: participant.correct_answers,
            damage_dealt: participant.damage_dealt,
            victory,
            timestamp: now,
        });

        let granted = (credit * CURRENCY_PER_CREDIT).round() as u32;
        let (external_id, email, currency) = match world.players.get_mut(&participant.player_id) {
            Some(player) => {
                player.total_raids = player.total_raids.saturating_add(1);
                if granted > 0 {
                    player.currency = player.currency.saturating_add(granted);
                }
                (player.external_id.clone(), player.email.clone(), player.currency)
            }
            None => (None, None, 0),
        };

        if credit > 0.0 {
            let id = world.next_reward_id();
            world.rewards.insert(
                id,
                RewardEvent {
                    id,
                    player_id: participant.player_id.clone(),
                    payload: json!({
                        "playerId": participant.player_id,
                        "externalId": external_id,
                        "email": email,
                        "track": participant.track,
                        "raidId": raid_id,
                        "victory": victory,
                        "durationMinutes": duration_seconds as f32 / 60.0,
                        "credit": credit,
                        "totalQuestions": participant.problems_answered,
                        "correctQuestions": participant.correct_answers,
                    }),
                    sent: false,
                    attempts: 0,
                    last_error: None,
                    created_at: now,
                    sent_at: None,
                },
            );
            events.publish_player(
                &participant.player_id,
                &Event::RewardGranted { credit, currency },
            );
        }

        tracing::info!(
            raid_id,
            player_id = %participant.player_id,
            track = %participant.track,
            victory,
            duration_seconds,
            attempted = participant.problems_answered,
            correct = participant.correct_answers,
            cqpm = session_cqpm,
            best_cqpm,
            credit,
            "raid settled"
        );
    }
}

/// Unsent ledger events, oldest first, for the external delivery worker.
pub fn pending_rewards(state: &AppState) -> Vec<RewardEventView> {
    state.world().unsent_rewards().into_iter().map(RewardEvent::to_view).collect()
}

/// Worker acknowledgement: mark sent, or record the failure for retry.
pub fn ack_reward(state: &AppState, req: &RewardAckRequest, now: DateTime<Utc>) -> Result<()> {
    let mut world = state.world();
    let event = world
        .rewards
        .get_mut(&req.event_id)
        .ok_or_else(|| ApiError::NotFound(format!("reward event {}", req.event_id)))?;

    match &req.error {
        None => {
            event.sent = true;
            event.sent_at = Some(now);
            event.last_error = None;
            tracing::info!(event_id = event.id, "reward event delivered");
        }
        Some(message) => {
            event.attempts = event.attempts.saturating_add(1);
            event.last_error = Some(message.clone());
            tracing::warn!(
                event_id = event.id,
                attempts = event.attempts,
                error = %message,
                "reward delivery failed"
            );
        }
    }
    Ok(())
}
