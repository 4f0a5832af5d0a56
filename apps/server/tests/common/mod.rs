//! Common test utilities and fixtures for integration tests.
//!
//! World state is in-memory, so these tests need no external services:
//! each TestContext gets its own engine. Helpers reach into the world
//! directly to rewind timers (the engine advances them by wall-clock
//! comparison) and to read server-side state the API deliberately hides,
//! like the answer to an outstanding problem.

#![allow(dead_code)]

pub mod fixtures;

use axum::Router;
use chrono::{Duration, Utc};
use uuid::Uuid;

use raid_server::models::CreateSessionRequest;
use raid_server::services::{raids, sessions, sweep};
use raid_server::{AppState, ServerConfig};

pub const TEST_VERIFIER_TOKEN: &str = "test-verifier-token";

/// Test context owning one engine instance.
pub struct TestContext {
    pub state: AppState,
}

impl TestContext {
    pub fn new() -> Self {
        let state = AppState::new(ServerConfig {
            verifier_token: TEST_VERIFIER_TOKEN.to_string(),
        });
        Self { state }
    }

    /// Router for use with axum-test.
    pub fn router(&self) -> Router {
        raid_server::router(self.state.clone())
    }

    /// Bind a fresh connection to a player the way the gateway would.
    pub fn create_session(&self, player_id: &str) -> Uuid {
        let connection_id = Uuid::new_v4();
        sessions::create_session(
            &self.state,
            &CreateSessionRequest { connection_id, player_id: player_id.to_string() },
            Utc::now(),
        )
        .expect("failed to create test session");
        connection_id
    }

    /// Format a session bearer header.
    pub fn auth_header_value(connection_id: &Uuid) -> String {
        format!("Bearer {}", connection_id)
    }

    /// Format the verifier bearer header.
    pub fn verifier_header_value() -> String {
        format!("Bearer {}", TEST_VERIFIER_TOKEN)
    }

    /// The raid the player is currently in.
    pub fn raid_id_of(&self, player_id: &str) -> u64 {
        self.state
            .world()
            .players
            .get(player_id)
            .and_then(|p| p.in_raid)
            .expect("player is not in a raid")
    }

    /// Shift the countdown start into the past so the next tick promotes
    /// the raid to InProgress.
    pub fn rewind_countdown(&self, raid_id: u64, secs: i64) {
        let mut world = self.state.world();
        if let Some(raid) = world.raids.get_mut(&raid_id) {
            raid.countdown_started_at =
                raid.countdown_started_at.map(|t| t - Duration::seconds(secs));
        }
    }

    /// Shift the battle start into the past, aging the raid timer.
    pub fn rewind_battle(&self, raid_id: u64, secs: i64) {
        let mut world = self.state.world();
        if let Some(raid) = world.raids.get_mut(&raid_id) {
            raid.started_at = raid.started_at.map(|t| t - Duration::seconds(secs));
        }
    }

    /// Rewind the countdown and run a sweep so the raid is battling.
    pub fn force_in_progress(&self, raid_id: u64) {
        self.rewind_countdown(raid_id, raids::COUNTDOWN_SECS + 1);
        sweep::sweep(&self.state, Utc::now());
    }

    pub fn set_boss_hp(&self, raid_id: u64, hp: u32) {
        let mut world = self.state.world();
        if let Some(raid) = world.raids.get_mut(&raid_id) {
            raid.boss_hp = hp;
        }
    }

    pub fn boss_hp(&self, raid_id: u64) -> u32 {
        self.state.world().raids.get(&raid_id).map(|r| r.boss_hp).expect("raid missing")
    }

    /// Server-side answer for the player's outstanding problem.
    pub fn outstanding_answer(&self, player_id: &str) -> i32 {
        self.state
            .world()
            .problems
            .get(player_id)
            .map(|p| p.fact.answer())
            .expect("no outstanding problem")
    }

    /// Difficulty tier of the player's outstanding problem.
    pub fn outstanding_tier(&self, player_id: &str) -> u8 {
        self.state
            .world()
            .problems
            .get(player_id)
            .map(|p| p.fact.tier)
            .expect("no outstanding problem")
    }

    pub fn outstanding_problem_id(&self, player_id: &str) -> u64 {
        self.state
            .world()
            .problems
            .get(player_id)
            .map(|p| p.id)
            .expect("no outstanding problem")
    }
}
