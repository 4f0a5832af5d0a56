//! World table rows and API types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Re-export shared types from raid-core
pub use raid_core::types::{AttemptRecord, BossKind, Fact, MasteryState, Operation};

// === World Rows ===

/// Binding of one live connection to a verified player identity.
/// Created only through the verifier-gated path, never by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub connection_id: Uuid,
    pub player_id: String,
    pub connected_at: DateTime<Utc>,
}

/// Persistent learner profile. The id is externally issued and stable
/// across reconnects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    /// Grade level (0 = K, 1-5).
    pub grade: u8,
    /// Last track the player selected for a raid.
    pub track: Option<String>,
    pub external_id: Option<String>,
    pub email: Option<String>,
    pub total_problems: u32,
    pub total_correct: u32,
    /// Rolling average response time over correct answers.
    pub avg_response_ms: u32,
    pub best_response_ms: Option<u32>,
    pub total_raids: u32,
    /// In-game currency balance, credited at raid settlement.
    pub currency: u32,
    pub in_raid: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub last_played: DateTime<Utc>,
}

impl Player {
    pub fn new(id: String, name: String, grade: u8, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name,
            grade: grade.min(5),
            track: None,
            external_id: None,
            email: None,
            total_problems: 0,
            total_correct: 0,
            avg_response_ms: 0,
            best_response_ms: None,
            total_raids: 0,
            currency: 0,
            in_raid: None,
            created_at: now,
            last_played: now,
        }
    }
}

/// Raid lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaidState {
    Matchmaking,
    Countdown,
    InProgress,
    Paused,
    Victory,
    Failed,
    Rematch,
}

impl RaidState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Victory | Self::Failed | Self::Rematch)
    }
}

/// One battle instance. Boss HP is the only field mutated by multiple
/// players; all mutation happens under the world lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Raid {
    pub id: u64,
    pub boss: BossKind,
    pub boss_hp: u32,
    pub boss_max_hp: u32,
    pub state: RaidState,
    pub room_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub countdown_started_at: Option<DateTime<Utc>>,
    /// Set when countdown completes; shifted forward on resume so paused
    /// time never counts against the battle timer.
    pub started_at: Option<DateTime<Utc>>,
    pub pause_started_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<u32>,
}

/// A player's membership in a raid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub raid_id: u64,
    pub player_id: String,
    pub track: String,
    pub active: bool,
    pub ready: bool,
    pub leader: bool,
    pub damage_dealt: u32,
    pub problems_answered: u32,
    pub correct_answers: u32,
    pub fastest_answer_ms: Option<u32>,
    /// Canonical key of the last fact issued, excluded from the next draw.
    pub last_fact: Option<String>,
}

impl Participant {
    pub fn new(raid_id: u64, player_id: String, track: String, leader: bool) -> Self {
        Self {
            raid_id,
            player_id,
            track,
            active: true,
            ready: leader, // solo creators and room leaders start ready
            leader,
            damage_dealt: 0,
            problems_answered: 0,
            correct_answers: 0,
            fastest_answer_ms: None,
            last_fact: None,
        }
    }
}

/// An in-flight question for one player. At most one outstanding per
/// player; the world keys these by player id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub id: u64,
    pub raid_id: u64,
    pub player_id: String,
    pub fact: Fact,
    /// Operands in presentation order (commutative facts may be swapped).
    pub left: u8,
    pub right: u8,
    pub issued_at: DateTime<Utc>,
}

/// Immutable summary of one completed raid for one player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub player_id: String,
    pub track: String,
    pub session_seconds: u32,
    pub problems_attempted: u32,
    pub problems_correct: u32,
    pub damage_dealt: u32,
    pub victory: bool,
    pub timestamp: DateTime<Utc>,
}

/// A pending grant to the external ledger, delivered by the reward worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardEvent {
    pub id: u64,
    pub player_id: String,
    pub payload: serde_json::Value,
    pub sent: bool,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

// === API Request Types ===

/// POST /api/session (verifier only)
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub connection_id: Uuid,
    pub player_id: String,
}

/// POST /api/connect
#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub name: String,
    pub grade: Option<u8>,
    pub external_id: Option<String>,
    pub email: Option<String>,
}

/// POST /api/raid/solo and /api/raid/room
#[derive(Debug, Default, Deserialize)]
pub struct StartRaidRequest {
    pub track: Option<String>,
    /// 0 or absent = adaptive, 1-8 = fixed boss tier.
    pub boss_level: Option<u8>,
}

/// POST /api/raid/join
#[derive(Debug, Deserialize)]
pub struct JoinRoomRequest {
    pub room_code: String,
    pub track: Option<String>,
}

/// POST /api/answer
#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub problem_id: u64,
    pub value: i32,
    pub response_ms: i64,
    /// Remediation-phase answer: checked for correctness but never scored,
    /// never damaging, never mastery-advancing.
    #[serde(default)]
    pub firmup: bool,
}

/// POST /api/admin/reset-mastery (verifier only)
#[derive(Debug, Deserialize)]
pub struct ResetMasteryRequest {
    pub player_id: String,
    /// Reset a single fact, or the whole history when absent.
    pub fact_key: Option<String>,
}

/// POST /api/worker/rewards/ack (verifier only)
#[derive(Debug, Deserialize)]
pub struct RewardAckRequest {
    pub event_id: u64,
    pub error: Option<String>,
}

// === API Response Types ===

#[derive(Debug, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: String,
    pub name: String,
    pub grade: u8,
    pub track: Option<String>,
    pub total_problems: u32,
    pub total_correct: u32,
    pub total_raids: u32,
    pub currency: u32,
    pub in_raid: Option<u64>,
}

impl Player {
    pub fn to_view(&self) -> PlayerView {
        PlayerView {
            id: self.id.clone(),
            name: self.name.clone(),
            grade: self.grade,
            track: self.track.clone(),
            total_problems: self.total_problems,
            total_correct: self.total_correct,
            total_raids: self.total_raids,
            currency: self.currency,
            in_raid: self.in_raid,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantView {
    pub player_id: String,
    pub active: bool,
    pub ready: bool,
    pub leader: bool,
    pub damage_dealt: u32,
    pub problems_answered: u32,
    pub correct_answers: u32,
}

impl Participant {
    pub fn to_view(&self) -> ParticipantView {
        ParticipantView {
            player_id: self.player_id.clone(),
            active: self.active,
            ready: self.ready,
            leader: self.leader,
            damage_dealt: self.damage_dealt,
            problems_answered: self.problems_answered,
            correct_answers: self.correct_answers,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaidView {
    pub id: u64,
    pub boss: BossKind,
    pub boss_hp: u32,
    pub boss_max_hp: u32,
    pub state: RaidState,
    pub room_code: Option<String>,
    pub duration_seconds: Option<u32>,
    pub participants: Vec<ParticipantView>,
}

impl Raid {
    pub fn to_view(&self, participants: &[Participant]) -> RaidView {
        RaidView {
            id: self.id,
            boss: self.boss,
            boss_hp: self.boss_hp,
            boss_max_hp: self.boss_max_hp,
            state: self.state,
            room_code: self.room_code.clone(),
            duration_seconds: self.duration_seconds,
            participants: participants.iter().map(Participant::to_view).collect(),
        }
    }
}

/// The question as shown to the player; the answer stays server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemView {
    pub id: u64,
    pub left: u8,
    pub right: u8,
    pub operation: Operation,
    pub symbol: String,
}

impl Problem {
    pub fn to_view(&self) -> ProblemView {
        ProblemView {
            id: self.id,
            left: self.left,
            right: self.right,
            operation: self.fact.operation,
            symbol: self.fact.operation.symbol().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub correct: bool,
    pub damage: u32,
    pub crit: bool,
    pub boss_hp: u32,
    pub raid_state: RaidState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyRoomView {
    pub raid_id: u64,
    pub room_code: String,
    pub boss: BossKind,
    pub players: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LobbyView {
    pub rooms: Vec<LobbyRoomView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RewardEventView {
    pub id: u64,
    pub player_id: String,
    pub payload: serde_json::Value,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
}

impl RewardEvent {
    pub fn to_view(&self) -> RewardEventView {
        RewardEventView {
            id: self.id,
            player_id: self.player_id.clone(),
            payload: self.payload.clone(),
            attempts: self.attempts,
            created_at: self.created_at,
        }
    }
}
