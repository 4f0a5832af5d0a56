//! Periodic sweep: timer advancement, abandoned-raid cleanup, and reward
//! queue retention.

use chrono::{DateTime, Duration, Utc};

use crate::models::RaidState;
use crate::services::raids;
use crate::AppState;

/// Sweep cadence; also the resolution of the raid timer when no command
/// arrives to tick it sooner.
pub const SWEEP_INTERVAL_SECS: u64 = 5;

/// How long an empty raid may linger before it is abandoned. Generous so
/// a rebooted Chromebook can still make it back.
pub const ABANDON_GRACE_SECS: i64 = 480;

/// Audit window for delivered reward events, and the dead-letter age for
/// undelivered ones.
pub const REWARD_RETENTION_DAYS: i64 = 7;

/// Background task driving the sweep.
pub async fn run(state: AppState) {
    let mut interval =
        tokio::time::interval(std::time::Duration::from_secs(SWEEP_INTERVAL_SECS));
    loop {
        interval.tick().await;
        sweep(&state, Utc::now());
    }
}

/// One sweep pass. Separated from the task loop so tests can drive it with
/// a chosen clock.
pub fn sweep(state: &AppState, now: DateTime<Utc>) {
    let mut world = state.world();

    // Advance every raid's wall-clock transitions.
    let raid_ids: Vec<u64> = world.raids.keys().copied().collect();
    for raid_id in raid_ids {
        raids::tick(&mut world, &state.events, raid_id, now);
    }

    // Abandon raids nobody is coming back to.
    let stale: Vec<u64> = world
        .raids
        .values()
        .filter(|raid| {
            if world.active_count(raid.id) > 0 {
                return false;
            }
            let anchor = match raid.state {
                RaidState::Paused => raid.pause_started_at.unwrap_or(raid.created_at),
                RaidState::Victory | RaidState::Failed | RaidState::Rematch => raid
                    .started_at
                    .map(|t| t + Duration::seconds(i64::from(raid.duration_seconds.unwrap_or(0))))
                    .unwrap_or(raid.created_at),
                _ => raid.created_at,
            };
            now - anchor > Duration::seconds(ABANDON_GRACE_SECS)
        })
        .map(|raid| raid.id)
        .collect();
    for raid_id in stale {
        raids::cleanup_raid(&mut world, &state.events, raid_id, "abandoned");
    }

    // Reward queue retention.
    let retention = Duration::days(REWARD_RETENTION_DAYS);
    let expired: Vec<u64> = world
        .rewards
        .values()
        .filter(|event| {
            if event.sent {
                event.sent_at.map_or(false, |sent_at| now - sent_at > retention)
            } else {
                now - event.created_at > retention
            }
        })
        .map(|event| event.id)
        .collect();
    for id in expired {
        if let Some(event) = world.rewards.remove(&id) {
            if event.sent {
                // Delivered and past the audit window: drop silently.
                continue;
            }
            // Dead letter: log the full payload for external replay, then
            // delete rather than retrying forever.
            tracing::error!(
                event_id = event.id,
                player_id = %event.player_id,
                attempts = event.attempts,
                last_error = event.last_error.as_deref().unwrap_or("none"),
                payload = %event.payload,
                "reward event dead-lettered"
            );
        }
    }
}
