//! Anti-gaming reward formula.
//!
//! Reward is play time scaled by an engagement multiplier in [0, 1]. The
//! multiplier compares the session's CQPM against a floor derived from the
//! player's own proven best on the same track, so slow grinding against an
//! idle screen earns nothing and a player cannot sandbag the baseline.

/// Best CQPM assumed for a player with no qualifying history.
pub const DEFAULT_BEST_CQPM: f32 = 10.0;

/// A session must run at least this long to count toward "best".
pub const QUALIFYING_SESSION_SECS: u32 = 30;

/// The floor never drops below this, whatever the player's history.
pub const FLOOR_MIN_CQPM: f32 = 2.0;

/// Fraction of the personal best that sets the engagement floor.
pub const FLOOR_RATIO: f32 = 0.25;

/// Below this fraction of the floor the session is treated as idle.
pub const IDLE_CUTOFF: f32 = 0.30;

/// Rewarded minutes are capped per session.
pub const REWARD_CAP_MINUTES: f32 = 2.5;

/// Minimum accuracy for any reward.
pub const MIN_ACCURACY: f32 = 0.80;

/// Correct questions per minute for a session.
pub fn session_cqpm(correct: u32, session_seconds: u32) -> f32 {
    if session_seconds == 0 {
        return 0.0;
    }
    correct as f32 * 60.0 / session_seconds as f32
}

/// Engagement multiplier in [0.0, 1.0].
pub fn calculate_engagement(session_cqpm: f32, best_cqpm: f32) -> f32 {
    let floor = f32::max(FLOOR_MIN_CQPM, best_cqpm * FLOOR_RATIO);
    let raw = session_cqpm / floor;

    if raw < IDLE_CUTOFF {
        0.0
    } else {
        f32::min(1.0, raw)
    }
}

/// Credit minutes for a completed session.
///
/// `best_cqpm` must be the pre-session best: the session being settled may
/// not inflate the baseline used to judge it.
pub fn session_reward(
    session_seconds: u32,
    correct: u32,
    attempted: u32,
    best_cqpm: f32,
) -> f32 {
    if attempted == 0 {
        return 0.0;
    }
    let accuracy = correct as f32 / attempted as f32;
    if accuracy < MIN_ACCURACY {
        return 0.0;
    }

    let engagement = calculate_engagement(session_cqpm(correct, session_seconds), best_cqpm);
    let minutes = session_seconds as f32 / 60.0;
    minutes.min(REWARD_CAP_MINUTES) * engagement
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn engagement_stays_in_unit_interval() {
        for cqpm in [0.0, 0.5, 1.0, 3.0, 10.0, 40.0, 500.0] {
            for best in [0.0, 2.0, 10.0, 60.0] {
                let e = calculate_engagement(cqpm, best);
                assert!((0.0..=1.0).contains(&e), "cqpm {} best {} -> {}", cqpm, best, e);
            }
        }
    }

    #[test]
    fn idle_sessions_earn_zero() {
        // Floor for best=10 is max(2.0, 2.5) = 2.5; 30% of that is 0.75.
        assert_eq!(calculate_engagement(0.7, 10.0), 0.0);
        assert!(calculate_engagement(0.75, 10.0) > 0.0);
    }

    #[test]
    fn hitting_the_floor_saturates_engagement() {
        assert_eq!(calculate_engagement(2.5, 10.0), 1.0);
        assert_eq!(calculate_engagement(30.0, 10.0), 1.0);
    }

    #[test]
    fn floor_never_drops_below_minimum() {
        // A sandbagged best of 4 would give a 1.0 floor; the 2.0 minimum
        // still applies.
        assert_eq!(calculate_engagement(1.9, 4.0), 0.95);
        assert_eq!(calculate_engagement(2.0, 4.0), 1.0);
    }

    #[test]
    fn fast_players_need_proportional_speed() {
        // Best of 40 sets the floor at 10 CQPM.
        assert_eq!(calculate_engagement(5.0, 40.0), 0.5);
        assert_eq!(calculate_engagement(10.0, 40.0), 1.0);
    }

    #[test]
    fn reward_is_capped_at_two_and_a_half_minutes() {
        // 10 minutes at 95% accuracy, fast enough for engagement 1.0.
        let reward = session_reward(600, 95, 100, DEFAULT_BEST_CQPM);
        assert_eq!(reward, 2.5);
    }

    #[test]
    fn short_sessions_earn_their_minutes() {
        // 2 minutes, engagement 1.0.
        let reward = session_reward(120, 40, 42, DEFAULT_BEST_CQPM);
        assert!((reward - 2.0).abs() < 1e-6);
    }

    #[test]
    fn low_accuracy_earns_nothing() {
        let reward = session_reward(600, 79, 100, DEFAULT_BEST_CQPM);
        assert_eq!(reward, 0.0);
    }

    #[test]
    fn no_attempts_earns_nothing() {
        assert_eq!(session_reward(600, 0, 0, DEFAULT_BEST_CQPM), 0.0);
    }

    #[test]
    fn cqpm_handles_zero_duration() {
        assert_eq!(session_cqpm(10, 0), 0.0);
        assert_eq!(session_cqpm(30, 60), 30.0);
    }
}
