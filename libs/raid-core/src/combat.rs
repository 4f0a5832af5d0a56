//! Damage resolution from response latency.
//!
//! Grade changes the speed threshold, not the damage table: a kindergartner
//! at 3.0s deals the same damage as a fifth-grader at 1.5s, which keeps the
//! CQPM-to-damage mapping uniform across grades.

use rand::Rng;

use crate::mastery::fast_threshold_ms;

/// Upper bound for a client-reported latency; anything outside [0, max] is
/// treated as maximal rather than rejected.
pub const MAX_RESPONSE_MS: u32 = 60_000;

/// Damage for an answer at or under the fast threshold.
pub const FAST_DAMAGE: u32 = 75;

/// Critical hit damage.
pub const CRIT_DAMAGE: u32 = 150;

/// Independent critical chance on fast answers, in percent.
pub const CRIT_CHANCE_PERCENT: u32 = 15;

/// Outcome of a damage roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageRoll {
    pub amount: u32,
    pub crit: bool,
}

/// Clamp a client-reported latency into the accepted range.
pub fn clamp_response_ms(reported_ms: i64) -> u32 {
    if (0..=i64::from(MAX_RESPONSE_MS)).contains(&reported_ms) {
        reported_ms as u32
    } else {
        MAX_RESPONSE_MS
    }
}

/// Resolve damage for a correct answer at the given latency.
pub fn resolve_damage(response_ms: u32, grade: u8, rng: &mut impl Rng) -> DamageRoll {
    let fast = fast_threshold_ms(grade);

    if response_ms <= fast {
        if rng.gen_range(0..100) < CRIT_CHANCE_PERCENT {
            DamageRoll { amount: CRIT_DAMAGE, crit: true }
        } else {
            DamageRoll { amount: FAST_DAMAGE, crit: false }
        }
    } else if response_ms <= fast + 1000 {
        DamageRoll { amount: 60, crit: false }
    } else if response_ms <= fast + 2000 {
        DamageRoll { amount: 45, crit: false }
    } else if response_ms <= fast + 3000 {
        DamageRoll { amount: 30, crit: false }
    } else if response_ms < fast + 5000 {
        DamageRoll { amount: 23, crit: false }
    } else {
        DamageRoll { amount: 15, crit: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn fast_answer_deals_base_or_crit() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let roll = resolve_damage(1500, 3, &mut rng);
            assert!(roll.amount == FAST_DAMAGE || roll.amount == CRIT_DAMAGE);
            assert_eq!(roll.crit, roll.amount == CRIT_DAMAGE);
        }
    }

    #[test]
    fn crit_rate_is_near_fifteen_percent() {
        let mut rng = StdRng::seed_from_u64(42);
        let crits = (0..10_000)
            .filter(|_| resolve_damage(100, 3, &mut rng).crit)
            .count();
        assert!((1300..=1700).contains(&crits), "crit count {} out of band", crits);
    }

    #[test]
    fn slow_tiers_are_deterministic_for_grade_three() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(resolve_damage(2500, 3, &mut rng).amount, 60);
        assert_eq!(resolve_damage(3500, 3, &mut rng).amount, 45);
        assert_eq!(resolve_damage(4500, 3, &mut rng).amount, 30);
        assert_eq!(resolve_damage(6000, 3, &mut rng).amount, 23);
        assert_eq!(resolve_damage(7000, 3, &mut rng).amount, 15);
        assert_eq!(resolve_damage(60_000, 3, &mut rng).amount, 15);
    }

    #[test]
    fn tier_boundaries_shift_with_grade() {
        let mut rng = StdRng::seed_from_u64(0);
        // 2500ms is slow for grade 3 (F=2000) but fast for grade 0 (F=3000).
        let roll = resolve_damage(2500, 0, &mut rng);
        assert!(roll.amount == FAST_DAMAGE || roll.amount == CRIT_DAMAGE);
        // Grade 5 threshold is 1500ms.
        assert_eq!(resolve_damage(2400, 5, &mut rng).amount, 60);
    }

    #[test]
    fn out_of_range_latency_is_treated_as_maximal() {
        assert_eq!(clamp_response_ms(-5), MAX_RESPONSE_MS);
        assert_eq!(clamp_response_ms(90_000), MAX_RESPONSE_MS);
        assert_eq!(clamp_response_ms(0), 0);
        assert_eq!(clamp_response_ms(60_000), 60_000);
        assert_eq!(clamp_response_ms(1234), 1234);
    }
}
