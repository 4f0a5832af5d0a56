//! Core raid-engine library shared by the server and tooling.
//!
//! Provides:
//! - Fact catalog with per-fact difficulty tiers (0-3) and track definitions
//! - Mastery leveling over rolling timed-outcome windows
//! - Adaptive problem selection (tier gating + weighted category draw)
//! - Combat damage resolution from response latency
//! - Engagement/reward formula (anti-gaming multiplier)
//!
//! Everything here is pure and deterministic: callers pass in the clock and
//! the random source.

pub mod catalog;
pub mod combat;
pub mod engagement;
pub mod error;
pub mod mastery;
pub mod selection;
pub mod types;

pub use catalog::{default_track_for_grade, track, FactCatalog, TrackDef, TRACKS};
pub use combat::{clamp_response_ms, resolve_damage, DamageRoll};
pub use engagement::{calculate_engagement, session_cqpm, session_reward};
pub use error::{EngineError, Result};
pub use mastery::{fast_threshold_ms, level_from_window, record_attempt};
pub use selection::{choose_fact, tier_ceiling, Candidate};
pub use types::{AttemptRecord, BossKind, Fact, MasteryBand, MasteryState, Operation};
