//! Core types for the raid engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Arithmetic operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    /// Apply the operation. Division is exact for catalog facts; a zero
    /// divisor yields zero rather than panicking.
    pub fn compute(&self, left: u8, right: u8) -> i32 {
        match self {
            Self::Add => i32::from(left) + i32::from(right),
            Self::Subtract => i32::from(left) - i32::from(right),
            Self::Multiply => i32::from(left) * i32::from(right),
            Self::Divide => {
                if right == 0 {
                    0
                } else {
                    i32::from(left) / i32::from(right)
                }
            }
        }
    }

    /// Display symbol used in canonical fact keys.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "×",
            Self::Divide => "÷",
        }
    }

    /// Whether operand order is interchangeable.
    pub fn is_commutative(&self) -> bool {
        matches!(self, Self::Add | Self::Multiply)
    }
}

/// One arithmetic fact with its cognitive difficulty tier.
///
/// Tier 0 facts follow a pattern (×0, ×1, +0); tier 3 facts are the
/// pure-memorization "killer" facts (7×8 and friends).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub operation: Operation,
    pub left: u8,
    pub right: u8,
    pub tier: u8,
}

impl Fact {
    /// Canonical key. Commutative operations normalize to smaller operand
    /// first so 7×4 and 4×7 share one mastery record.
    pub fn key(&self) -> String {
        if self.operation.is_commutative() && self.left > self.right {
            format!("{}{}{}", self.right, self.operation.symbol(), self.left)
        } else {
            format!("{}{}{}", self.left, self.operation.symbol(), self.right)
        }
    }

    pub fn answer(&self) -> i32 {
        self.operation.compute(self.left, self.right)
    }

    /// Operands as presented to the player. Commutative facts are swapped
    /// half the time so both orders get practiced.
    pub fn presented_operands(&self, rng: &mut impl rand::Rng) -> (u8, u8) {
        if self.operation.is_commutative() && rng.gen_bool(0.5) {
            (self.right, self.left)
        } else {
            (self.left, self.right)
        }
    }
}

/// Boss flavor for a raid.
///
/// Adaptive bosses ("Quick Play") restrict the fact pool by track mastery;
/// fixed-tier bosses ("Mastery Trial") certify full-track readiness and
/// always draw from the unrestricted pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "level", rename_all = "snake_case")]
pub enum BossKind {
    Adaptive,
    Fixed(u8),
}

/// Base HP per fixed boss level (index 1-8). Index 0 is the adaptive base.
const BASE_HP: [u32; 9] = [500, 900, 1750, 2600, 3500, 4200, 5000, 5500, 6000];

impl BossKind {
    /// Decode a client-supplied level. 0 or absent means adaptive.
    pub fn from_level(level: Option<u8>) -> Option<Self> {
        match level {
            None | Some(0) => Some(Self::Adaptive),
            Some(l @ 1..=8) => Some(Self::Fixed(l)),
            Some(_) => None,
        }
    }

    /// Per-player base HP; total boss HP is this times the participant count.
    pub fn base_hp(&self) -> u32 {
        match self {
            Self::Adaptive => BASE_HP[0],
            Self::Fixed(level) => BASE_HP[usize::from(*level).min(8)],
        }
    }

    /// Raid duration: adaptive raids get the more forgiving timer.
    pub fn duration_secs(&self) -> u64 {
        match self {
            Self::Adaptive => 150,
            Self::Fixed(_) => 120,
        }
    }

    /// Only adaptive raids gate the fact pool by mastery percentage.
    pub fn restricts_pool(&self) -> bool {
        matches!(self, Self::Adaptive)
    }
}

/// One timed outcome for a (player, fact) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub response_ms: u32,
    pub correct: bool,
    pub at: DateTime<Utc>,
}

/// Per-player learning state for one fact.
///
/// `level` is monotonic: it only moves up through timed, server-validated
/// answers, and only an explicit reset brings it back down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasteryState {
    pub level: u8,
    /// Rolling window of the most recent outcomes (at most 3).
    pub window: Vec<AttemptRecord>,
    pub total_attempts: u32,
    pub total_correct: u32,
    pub fastest_ms: Option<u32>,
    pub last_seen: DateTime<Utc>,
}

impl MasteryState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            level: 0,
            window: Vec::new(),
            total_attempts: 0,
            total_correct: 0,
            fastest_ms: None,
            last_seen: now,
        }
    }

    pub fn attempted(&self) -> bool {
        self.total_attempts > 0
    }
}

/// Mastery bands used by the problem selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasteryBand {
    Weak,
    Developing,
    Mastered,
}

impl MasteryBand {
    pub fn from_level(level: u8) -> Self {
        match level {
            0 | 1 => Self::Weak,
            2..=4 => Self::Developing,
            _ => Self::Mastered,
        }
    }
}
