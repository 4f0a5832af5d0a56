//! Subscription router: scoped delivery of state deltas.
//!
//! Each WebSocket connection registers a bounded channel here. Deltas are
//! published to a scope — one raid, the lobby, or one player — and only
//! connections inside that scope receive them. Raid membership is updated
//! by the engine whenever a player joins or leaves, so fan-out always
//! follows current membership. This is a fan-out concern, not a security
//! boundary; writes are guarded by session binding.

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::{LobbyRoomView, ParticipantView, ProblemView, RaidState};

/// Buffer size for each per-connection delta channel.
const SUBSCRIBER_CHANNEL_BUFFER: usize = 256;

/// State deltas pushed to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Lobby scope: a private room opened or changed headcount.
    RoomUpdated { room: LobbyRoomView },
    /// Lobby scope: a room left matchmaking.
    RoomClosed { raid_id: u64 },
    /// Raid scope: state machine transition.
    RaidStateChanged { raid_id: u64, state: RaidState },
    /// Raid scope: roster or ready-flag change.
    RosterChanged { raid_id: u64, participants: Vec<ParticipantView> },
    /// Raid scope: damage landed.
    BossDamaged { raid_id: u64, player_id: String, damage: u32, crit: bool, boss_hp: u32 },
    /// Raid scope: terminal outcome.
    RaidEnded { raid_id: u64, victory: bool, duration_seconds: u32 },
    /// Player scope: a fresh problem was issued.
    ProblemIssued { problem: ProblemView },
    /// Player scope: membership changed.
    RaidJoined { raid_id: u64 },
    RaidLeft { raid_id: u64 },
    /// Player scope: settlement credited currency.
    RewardGranted { credit: f32, currency: u32 },
}

#[derive(Debug)]
struct Subscriber {
    player_id: String,
    raid_id: Option<u64>,
    tx: mpsc::Sender<Event>,
}

/// Per-connection subscriber registry with scope-filtered publish.
#[derive(Debug, Default)]
pub struct SubscriptionRouter {
    subscribers: DashMap<Uuid, Subscriber>,
}

impl SubscriptionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and return the receiving end of its channel.
    pub fn register(
        &self,
        connection_id: Uuid,
        player_id: String,
        raid_id: Option<u64>,
    ) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_BUFFER);
        self.subscribers.insert(connection_id, Subscriber { player_id, raid_id, tx });
        rx
    }

    pub fn unregister(&self, connection_id: &Uuid) {
        self.subscribers.remove(connection_id);
    }

    /// Point every connection of a player at its new raid (or none).
    pub fn set_raid(&self, player_id: &str, raid_id: Option<u64>) {
        for mut entry in self.subscribers.iter_mut() {
            if entry.player_id == player_id {
                entry.raid_id = raid_id;
            }
        }
    }

    /// Deliver to participants of one raid only.
    pub fn publish_raid(&self, raid_id: u64, event: &Event) {
        self.publish_where(|s| s.raid_id == Some(raid_id), event);
    }

    /// Deliver to every connected client (the open-lobbies view).
    pub fn publish_lobby(&self, event: &Event) {
        self.publish_where(|_| true, event);
    }

    /// Deliver to one player's connections.
    pub fn publish_player(&self, player_id: &str, event: &Event) {
        self.publish_where(|s| s.player_id == player_id, event);
    }

    fn publish_where(&self, predicate: impl Fn(&Subscriber) -> bool, event: &Event) {
        for entry in self.subscribers.iter() {
            if predicate(entry.value()) {
                // A slow consumer drops deltas rather than stalling the
                // publisher; clients resync via the snapshot endpoints.
                if entry.value().tx.try_send(event.clone()).is_err() {
                    tracing::warn!(
                        player_id = %entry.value().player_id,
                        "subscriber channel full, dropping delta"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut mpsc::Receiver<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(e) = rx.try_recv() {
            out.push(e);
        }
        out
    }

    #[test]
    fn raid_events_only_reach_members() {
        let router = SubscriptionRouter::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut rx_a = router.register(a, "alice".to_string(), Some(7));
        let mut rx_b = router.register(b, "bob".to_string(), Some(8));

        router.publish_raid(7, &Event::RaidStateChanged { raid_id: 7, state: RaidState::InProgress });

        assert_eq!(drain(&mut rx_a).len(), 1);
        assert!(drain(&mut rx_b).is_empty());
    }

    #[test]
    fn membership_changes_redirect_delivery() {
        let router = SubscriptionRouter::new();
        let a = Uuid::new_v4();
        let mut rx = router.register(a, "alice".to_string(), None);

        router.publish_raid(7, &Event::RaidLeft { raid_id: 7 });
        assert!(drain(&mut rx).is_empty());

        router.set_raid("alice", Some(7));
        router.publish_raid(7, &Event::RaidJoined { raid_id: 7 });
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn lobby_events_reach_everyone() {
        let router = SubscriptionRouter::new();
        let mut rx_a = router.register(Uuid::new_v4(), "alice".to_string(), Some(7));
        let mut rx_b = router.register(Uuid::new_v4(), "bob".to_string(), None);

        router.publish_lobby(&Event::RoomClosed { raid_id: 3 });

        assert_eq!(drain(&mut rx_a).len(), 1);
        assert_eq!(drain(&mut rx_b).len(), 1);
    }

    #[test]
    fn player_events_are_private() {
        let router = SubscriptionRouter::new();
        let mut rx_a = router.register(Uuid::new_v4(), "alice".to_string(), Some(7));
        let mut rx_b = router.register(Uuid::new_v4(), "bob".to_string(), Some(7));

        router.publish_player("alice", &Event::RewardGranted { credit: 2.5, currency: 250 });

        assert_eq!(drain(&mut rx_a).len(), 1);
        assert!(drain(&mut rx_b).is_empty());
    }
}
