//! Adaptive problem selection: tier gating plus a weighted category draw.
//!
//! The caller builds one [`Candidate`] per fact in the player's track pool;
//! this module restricts the pool by mastery percentage (adaptive raids
//! only) and draws with 70/20/10 weak/developing/mastered proportions.

use rand::Rng;

use crate::error::{EngineError, Result};
use crate::types::{Fact, MasteryBand};

/// Target draw proportions for weak / developing / mastered facts.
const BAND_WEIGHTS: [u32; 3] = [70, 20, 10];

/// One fact annotated with the player's state on it.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub fact: Fact,
    pub level: u8,
    pub attempted: bool,
}

impl Candidate {
    fn band(&self) -> MasteryBand {
        MasteryBand::from_level(self.level)
    }
}

/// Highest difficulty tier allowed at a given track mastery percentage.
/// `None` means the full pool is open.
pub fn tier_ceiling(mastery_percent: f32) -> Option<u8> {
    if mastery_percent < 0.10 {
        Some(0)
    } else if mastery_percent < 0.25 {
        Some(1)
    } else if mastery_percent < 0.50 {
        Some(2)
    } else {
        None
    }
}

/// Draw the next fact for a player.
///
/// `restrict` applies the mastery-percentage tier ceiling (adaptive raids);
/// fixed-boss raids pass `false` and draw from the whole track. The
/// previously issued fact is excluded whenever the pool allows it.
pub fn choose_fact(
    candidates: &[Candidate],
    mastery_percent: f32,
    restrict: bool,
    exclude_key: Option<&str>,
    track: &str,
    rng: &mut impl Rng,
) -> Result<Fact> {
    if candidates.is_empty() {
        return Err(EngineError::EmptyPool { track: track.to_string() });
    }

    let ceiling = if restrict { tier_ceiling(mastery_percent) } else { None };
    let mut pool: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| ceiling.map_or(true, |t| c.fact.tier <= t))
        .collect();
    if pool.is_empty() {
        return Err(EngineError::EmptyPool { track: track.to_string() });
    }

    if let Some(key) = exclude_key {
        let without_last: Vec<&Candidate> =
            pool.iter().copied().filter(|c| c.fact.key() != key).collect();
        if !without_last.is_empty() {
            pool = without_last;
        }
    }

    let weak: Vec<&Candidate> =
        pool.iter().copied().filter(|c| c.band() == MasteryBand::Weak).collect();
    let developing: Vec<&Candidate> =
        pool.iter().copied().filter(|c| c.band() == MasteryBand::Developing).collect();
    let mastered: Vec<&Candidate> =
        pool.iter().copied().filter(|c| c.band() == MasteryBand::Mastered).collect();

    // Empty categories forfeit their share; the remaining weights keep
    // their relative proportions.
    let bands = [&weak, &developing, &mastered];
    let total: u32 = bands
        .iter()
        .zip(BAND_WEIGHTS)
        .filter(|(band, _)| !band.is_empty())
        .map(|(_, w)| w)
        .sum();

    let mut roll = rng.gen_range(0..total);
    let mut chosen_band: &[&Candidate] = &pool;
    for (band, weight) in bands.iter().zip(BAND_WEIGHTS) {
        if band.is_empty() {
            continue;
        }
        if roll < weight {
            chosen_band = band.as_slice();
            break;
        }
        roll -= weight;
    }

    // Inside the weak band, facts the player has actually struggled with
    // take precedence over facts they have simply never seen.
    let final_pool: Vec<&Candidate> = {
        let attempted: Vec<&Candidate> =
            chosen_band.iter().copied().filter(|c| c.attempted).collect();
        if !attempted.is_empty() && chosen_band.iter().any(|c| !c.attempted) {
            attempted
        } else {
            chosen_band.to_vec()
        }
    };

    let index = rng.gen_range(0..final_pool.len());
    Ok(final_pool[index].fact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FactCatalog;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn candidates_with_levels(levels: &[(u8, bool)]) -> Vec<Candidate> {
        let catalog = FactCatalog::standard();
        catalog
            .facts("mul-0-12")
            .unwrap()
            .iter()
            .enumerate()
            .map(|(i, fact)| {
                let (level, attempted) = levels[i % levels.len()];
                Candidate { fact: *fact, level, attempted }
            })
            .collect()
    }

    #[test]
    fn ceiling_follows_mastery_bands() {
        assert_eq!(tier_ceiling(0.05), Some(0));
        assert_eq!(tier_ceiling(0.10), Some(1));
        assert_eq!(tier_ceiling(0.24), Some(1));
        assert_eq!(tier_ceiling(0.25), Some(2));
        assert_eq!(tier_ceiling(0.49), Some(2));
        assert_eq!(tier_ceiling(0.50), None);
        assert_eq!(tier_ceiling(1.0), None);
    }

    #[test]
    fn restricted_draws_stay_at_tier_zero() {
        let candidates = candidates_with_levels(&[(0, false)]);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let fact = choose_fact(&candidates, 0.05, true, None, "mul-0-12", &mut rng).unwrap();
            assert_eq!(fact.tier, 0, "{} escaped the ceiling", fact.key());
        }
    }

    #[test]
    fn unrestricted_draws_reach_every_tier() {
        let candidates = candidates_with_levels(&[(0, false)]);
        let mut rng = StdRng::seed_from_u64(3);
        let mut seen = [false; 4];
        for _ in 0..500 {
            let fact = choose_fact(&candidates, 0.05, false, None, "mul-0-12", &mut rng).unwrap();
            seen[usize::from(fact.tier)] = true;
        }
        assert_eq!(seen, [true; 4]);
    }

    #[test]
    fn draw_proportions_favor_weak_facts() {
        // Alternate weak / developing / mastered across the pool.
        let candidates = candidates_with_levels(&[(0, true), (3, true), (5, true)]);
        let mut rng = StdRng::seed_from_u64(9);
        let mut weak_draws = 0;
        let rounds = 2000;
        for _ in 0..rounds {
            let fact = choose_fact(&candidates, 1.0, true, None, "mul-0-12", &mut rng).unwrap();
            let candidate = candidates.iter().find(|c| c.fact == fact).unwrap();
            if MasteryBand::from_level(candidate.level) == MasteryBand::Weak {
                weak_draws += 1;
            }
        }
        let share = f64::from(weak_draws) / f64::from(rounds);
        assert!((0.62..=0.78).contains(&share), "weak share {}", share);
    }

    #[test]
    fn empty_categories_redistribute_their_share() {
        // No mastered facts at all: the draw still succeeds every time.
        let candidates = candidates_with_levels(&[(0, true), (3, true)]);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            choose_fact(&candidates, 1.0, true, None, "mul-0-12", &mut rng).unwrap();
        }
    }

    #[test]
    fn attempted_weak_facts_outrank_unseen_ones() {
        let catalog = FactCatalog::standard();
        let facts = catalog.facts("mul-0-10").unwrap();
        // Exactly one attempted weak fact among many unseen ones.
        let candidates: Vec<Candidate> = facts
            .iter()
            .enumerate()
            .map(|(i, fact)| Candidate { fact: *fact, level: 0, attempted: i == 0 })
            .collect();
        let attempted_key = candidates[0].fact.key();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let fact =
                choose_fact(&candidates, 0.9, false, None, "mul-0-10", &mut rng).unwrap();
            assert_eq!(fact.key(), attempted_key);
        }
    }

    #[test]
    fn previous_fact_is_excluded_when_pool_allows() {
        let candidates = candidates_with_levels(&[(0, true)]);
        let skip = candidates[0].fact.key();
        let mut rng = StdRng::seed_from_u64(8);
        for _ in 0..200 {
            let fact =
                choose_fact(&candidates, 1.0, false, Some(&skip), "mul-0-12", &mut rng).unwrap();
            assert_ne!(fact.key(), skip);
        }
    }

    #[test]
    fn single_fact_pool_may_repeat_rather_than_fail() {
        let candidates = vec![candidates_with_levels(&[(0, true)])[0]];
        let only = candidates[0].fact.key();
        let mut rng = StdRng::seed_from_u64(2);
        let fact =
            choose_fact(&candidates, 0.0, true, Some(&only), "mul-0-12", &mut rng).unwrap();
        assert_eq!(fact.key(), only);
    }

    #[test]
    fn empty_pool_fails_loudly() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = choose_fact(&[], 0.0, true, None, "mul-0-12", &mut rng).unwrap_err();
        assert!(matches!(err, EngineError::EmptyPool { .. }));
    }
}
