//! In-memory world tables.
//!
//! All entities live in flat tables keyed by id; relationships are id
//! fields, never owning references. The whole struct sits behind one mutex
//! in [`crate::AppState`], so every operation that locks it is an atomic,
//! serialized transaction — two concurrent answers against the same boss
//! are applied in lock-acquisition order, never lost or double-applied.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use raid_core::engagement;
use raid_core::types::MasteryState;
use raid_core::Fact;

use crate::models::*;

/// The shared mutable game state.
#[derive(Debug, Default)]
pub struct World {
    /// Connection id -> verified session.
    pub sessions: HashMap<Uuid, Session>,
    /// Player id -> profile.
    pub players: HashMap<String, Player>,
    /// Raid id -> raid record.
    pub raids: HashMap<u64, Raid>,
    /// Raid id -> roster.
    pub participants: HashMap<u64, Vec<Participant>>,
    /// Player id -> the single outstanding problem.
    pub problems: HashMap<String, Problem>,
    /// Player id -> fact key -> learning state.
    pub mastery: HashMap<String, HashMap<String, MasteryState>>,
    /// Append-only raid summaries.
    pub snapshots: Vec<PerformanceSnapshot>,
    /// Reward event queue, polled by the external worker.
    pub rewards: HashMap<u64, RewardEvent>,

    next_raid_id: u64,
    next_problem_id: u64,
    next_reward_id: u64,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_raid_id(&mut self) -> u64 {
        self.next_raid_id += 1;
        self.next_raid_id
    }

    pub fn next_problem_id(&mut self) -> u64 {
        self.next_problem_id += 1;
        self.next_problem_id
    }

    pub fn next_reward_id(&mut self) -> u64 {
        self.next_reward_id += 1;
        self.next_reward_id
    }

    // === Sessions ===

    /// Resolve a connection to its verified player id.
    pub fn player_id_for_connection(&self, connection_id: &Uuid) -> Option<&str> {
        self.sessions.get(connection_id).map(|s| s.player_id.as_str())
    }

    // === Rosters ===

    pub fn roster(&self, raid_id: u64) -> &[Participant] {
        self.participants.get(&raid_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn participant(&self, raid_id: u64, player_id: &str) -> Option<&Participant> {
        self.roster(raid_id).iter().find(|p| p.player_id == player_id)
    }

    pub fn participant_mut(&mut self, raid_id: u64, player_id: &str) -> Option<&mut Participant> {
        self.participants
            .get_mut(&raid_id)?
            .iter_mut()
            .find(|p| p.player_id == player_id)
    }

    pub fn active_count(&self, raid_id: u64) -> usize {
        self.roster(raid_id).iter().filter(|p| p.active).count()
    }

    /// Open rooms visible in the lobby.
    pub fn open_rooms(&self) -> Vec<LobbyRoomView> {
        let mut rooms: Vec<LobbyRoomView> = self
            .raids
            .values()
            .filter(|r| r.state == RaidState::Matchmaking)
            .filter_map(|r| {
                let code = r.room_code.clone()?;
                Some(LobbyRoomView {
                    raid_id: r.id,
                    room_code: code,
                    boss: r.boss,
                    players: self.active_count(r.id),
                })
            })
            .collect();
        rooms.sort_by_key(|r| r.raid_id);
        rooms
    }

    pub fn room_code_in_use(&self, code: &str) -> bool {
        self.raids.values().any(|r| {
            r.state == RaidState::Matchmaking && r.room_code.as_deref() == Some(code)
        })
    }

    // === Mastery ===

    pub fn mastery_state(&self, player_id: &str, fact_key: &str) -> Option<&MasteryState> {
        self.mastery.get(player_id)?.get(fact_key)
    }

    /// Lazily create the learning state on first exposure to a fact.
    pub fn mastery_state_mut(
        &mut self,
        player_id: &str,
        fact_key: &str,
        now: DateTime<Utc>,
    ) -> &mut MasteryState {
        self.mastery
            .entry(player_id.to_string())
            .or_default()
            .entry(fact_key.to_string())
            .or_insert_with(|| MasteryState::new(now))
    }

    /// Count of level-5 facts a player holds within the given pool.
    pub fn mastered_count(&self, player_id: &str, facts: &[Fact]) -> usize {
        let Some(states) = self.mastery.get(player_id) else {
            return 0;
        };
        facts
            .iter()
            .filter(|f| states.get(&f.key()).map_or(false, |s| s.level >= 5))
            .count()
    }

    // === Snapshots ===

    /// Best historical CQPM on a track, from qualifying sessions only.
    /// Returns the default for players with no qualifying history.
    pub fn best_cqpm(&self, player_id: &str, track: &str) -> f32 {
        self.snapshots
            .iter()
            .filter(|s| {
                s.player_id == player_id
                    && s.track == track
                    && s.session_seconds >= engagement::QUALIFYING_SESSION_SECS
            })
            .map(|s| engagement::session_cqpm(s.problems_correct, s.session_seconds))
            .fold(None, |best: Option<f32>, cqpm| {
                Some(best.map_or(cqpm, |b| b.max(cqpm)))
            })
            .unwrap_or(engagement::DEFAULT_BEST_CQPM)
    }

    // === Rewards ===

    pub fn unsent_rewards(&self) -> Vec<&RewardEvent> {
        let mut events: Vec<&RewardEvent> =
            self.rewards.values().filter(|e| !e.sent).collect();
        events.sort_by_key(|e| e.id);
        events
    }
}
