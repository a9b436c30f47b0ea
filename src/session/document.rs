use std::ops::{Index, IndexMut};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{Health, Move, Outcome, MAX_HEALTH};
use crate::room::RoomCode;

/// Seat in a room: A created it, B joined it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    A,
    B,
}

impl Role {
    pub fn other(self) -> Role {
        match self {
            Role::A => Role::B,
            Role::B => Role::A,
        }
    }

    /// Key of this seat inside the shared document.
    pub fn key(self) -> &'static str {
        match self {
            Role::A => "a",
            Role::B => "b",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::A => f.write_str("A"),
            Role::B => f.write_str("B"),
        }
    }
}

/// One value per seat.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct PerRole<T> {
    pub a: T,
    pub b: T,
}

impl<T> PerRole<T> {
    pub fn new(a: T, b: T) -> Self {
        Self { a, b }
    }
}

impl<T> Index<Role> for PerRole<T> {
    type Output = T;

    fn index(&self, role: Role) -> &T {
        match role {
            Role::A => &self.a,
            Role::B => &self.b,
        }
    }
}

impl<T> IndexMut<Role> for PerRole<T> {
    fn index_mut(&mut self, role: Role) -> &mut T {
        match role {
            Role::A => &mut self.a,
            Role::B => &mut self.b,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Waiting,
    Playing,
    GameOver,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSlot {
    pub display_name: String,
    pub health: Health,
    /// Committed for the current round.
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub client_id: Option<Uuid>,
}

impl PlayerSlot {
    pub fn new(display_name: impl Into<String>, client_id: Uuid) -> Self {
        Self {
            display_name: display_name.into(),
            health: MAX_HEALTH,
            ready: false,
            client_id: Some(client_id),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    /// `None` when the deadline committed an empty hand.
    #[serde(default)]
    pub selection: Option<Move>,
    #[serde(default)]
    pub message: String,
    pub committed_at: DateTime<Utc>,
}

/// Frozen result of a resolved round, written by whichever client won the
/// resolution transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundRecord {
    pub round: u32,
    pub selections: PerRole<Option<Move>>,
    pub messages: PerRole<String>,
    pub health_before: PerRole<Health>,
    pub health_after: PerRole<Health>,
    /// Verdict from A's seat.
    pub outcome_for_a: Outcome,
    pub game_over: bool,
}

impl RoundRecord {
    pub fn outcome_for(&self, role: Role) -> Outcome {
        match role {
            Role::A => self.outcome_for_a,
            Role::B => self.outcome_for_a.flip(),
        }
    }
}

/// The shared aggregate stored at `rooms/<code>`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDocument {
    pub code: String,
    pub status: SessionStatus,
    /// Monotonic round counter, bumped by the reset transaction.
    pub round: u32,
    /// Highest round whose resolution has been applied.
    #[serde(default)]
    pub resolved_round: u32,
    #[serde(default)]
    pub players: PerRole<Option<PlayerSlot>>,
    #[serde(default)]
    pub moves: PerRole<Option<MoveRecord>>,
    #[serde(default)]
    pub next_round_ready: PerRole<bool>,
    #[serde(default)]
    pub last_round: Option<RoundRecord>,
    pub created_at: DateTime<Utc>,
    pub last_update_time: DateTime<Utc>,
}

impl SessionDocument {
    /// Fresh room with the creator seated as A.
    pub fn new(code: &RoomCode, host: PlayerSlot, now: DateTime<Utc>) -> Self {
        Self {
            code: code.as_str().to_string(),
            status: SessionStatus::Waiting,
            round: 1,
            resolved_round: 0,
            players: PerRole::new(Some(host), None),
            moves: PerRole::default(),
            next_round_ready: PerRole::default(),
            last_round: None,
            created_at: now,
            last_update_time: now,
        }
    }

    pub fn seat_guest(&mut self, guest: PlayerSlot, now: DateTime<Utc>) {
        self.players.b = Some(guest);
        self.status = SessionStatus::Playing;
        self.touch(now);
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_update_time = now;
    }

    pub fn player(&self, role: Role) -> Option<&PlayerSlot> {
        self.players[role].as_ref()
    }

    pub fn health(&self, role: Role) -> Health {
        self.player(role).map_or(MAX_HEALTH, |p| p.health)
    }

    pub fn is_ready(&self, role: Role) -> bool {
        self.player(role).is_some_and(|p| p.ready)
    }

    pub fn both_ready(&self) -> bool {
        self.is_ready(Role::A) && self.is_ready(Role::B)
    }

    pub fn both_next_round_ready(&self) -> bool {
        self.next_round_ready.a && self.next_round_ready.b
    }

    pub fn selection(&self, role: Role) -> Option<Move> {
        self.moves[role].as_ref().and_then(|m| m.selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn documents_tolerate_pruned_fields() {
        // The realtime database drops empty objects and nulls on write.
        let doc: SessionDocument = serde_json::from_value(json!({
            "code": "AB12",
            "status": "waiting",
            "round": 1,
            "players": { "a": { "displayName": "Ann", "health": 5 } },
            "createdAt": "2026-01-01T00:00:00Z",
            "lastUpdateTime": "2026-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(doc.status, SessionStatus::Waiting);
        assert_eq!(doc.resolved_round, 0);
        assert!(doc.players.b.is_none());
        assert!(doc.moves.a.is_none());
        assert!(!doc.both_next_round_ready());
        assert_eq!(doc.health(Role::A), 5);
        assert!(!doc.is_ready(Role::A));
    }

    #[test]
    fn status_uses_camel_case_on_the_wire() {
        assert_eq!(
            serde_json::to_value(SessionStatus::GameOver).unwrap(),
            json!("gameOver")
        );
    }

    #[test]
    fn roles_index_per_role_values() {
        let mut flags = PerRole::new(false, false);
        flags[Role::B] = true;
        assert!(!flags[Role::A]);
        assert!(flags[Role::A.other()]);
        assert_eq!(Role::B.key(), "b");
    }
}
