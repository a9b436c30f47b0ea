use chrono::{DateTime, Utc};

use crate::engine::{Health, Move, Outcome};

use super::document::{MoveRecord, PlayerSlot, Role, RoundRecord, SessionDocument, SessionStatus};

/// A session document seen from one seat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionView {
    pub code: String,
    pub role: Role,
    pub status: SessionStatus,
    pub round: u32,
    pub resolved_round: u32,
    pub own: Option<PlayerSlot>,
    pub opponent: Option<PlayerSlot>,
    pub own_move: Option<MoveRecord>,
    pub opponent_move: Option<MoveRecord>,
    pub own_next_round_ready: bool,
    pub opponent_next_round_ready: bool,
    pub last_round: Option<RoundView>,
    pub last_update_time: DateTime<Utc>,
}

/// A resolved round seen from one seat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundView {
    pub round: u32,
    pub own_selection: Option<Move>,
    pub opponent_selection: Option<Move>,
    pub own_message: String,
    pub opponent_message: String,
    pub outcome: Outcome,
    pub own_health_before: Health,
    pub opponent_health_before: Health,
    pub own_health_after: Health,
    pub opponent_health_after: Health,
    pub game_over: bool,
}

impl RoundView {
    pub fn from_record(record: &RoundRecord, role: Role) -> Self {
        let other = role.other();
        Self {
            round: record.round,
            own_selection: record.selections[role],
            opponent_selection: record.selections[other],
            own_message: record.messages[role].clone(),
            opponent_message: record.messages[other].clone(),
            outcome: record.outcome_for(role),
            own_health_before: record.health_before[role],
            opponent_health_before: record.health_before[other],
            own_health_after: record.health_after[role],
            opponent_health_after: record.health_after[other],
            game_over: record.game_over,
        }
    }
}

/// What moved between two consecutive views. Used for logging and for
/// deciding which transitions a snapshot can trigger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewChanges {
    pub status: bool,
    pub opponent_joined: bool,
    pub opponent_committed: bool,
    pub round_resolved: bool,
    pub round_advanced: bool,
    pub opponent_next_round_ready: bool,
    pub health: bool,
}

impl ViewChanges {
    pub fn any(&self) -> bool {
        self.status
            || self.opponent_joined
            || self.opponent_committed
            || self.round_resolved
            || self.round_advanced
            || self.opponent_next_round_ready
            || self.health
    }
}

impl SessionView {
    pub fn from_document(doc: &SessionDocument, role: Role) -> Self {
        let other = role.other();
        Self {
            code: doc.code.clone(),
            role,
            status: doc.status,
            round: doc.round,
            resolved_round: doc.resolved_round,
            own: doc.players[role].clone(),
            opponent: doc.players[other].clone(),
            own_move: doc.moves[role].clone(),
            opponent_move: doc.moves[other].clone(),
            own_next_round_ready: doc.next_round_ready[role],
            opponent_next_round_ready: doc.next_round_ready[other],
            last_round: doc
                .last_round
                .as_ref()
                .map(|record| RoundView::from_record(record, role)),
            last_update_time: doc.last_update_time,
        }
    }

    pub fn own_ready(&self) -> bool {
        self.own.as_ref().is_some_and(|p| p.ready)
    }

    pub fn opponent_ready(&self) -> bool {
        self.opponent.as_ref().is_some_and(|p| p.ready)
    }

    pub fn both_ready(&self) -> bool {
        self.own_ready() && self.opponent_ready()
    }

    pub fn both_next_round_ready(&self) -> bool {
        self.own_next_round_ready && self.opponent_next_round_ready
    }

    pub fn opponent_name(&self) -> Option<&str> {
        self.opponent.as_ref().map(|p| p.display_name.as_str())
    }

    pub fn own_health(&self) -> Option<Health> {
        self.own.as_ref().map(|p| p.health)
    }

    pub fn opponent_health(&self) -> Option<Health> {
        self.opponent.as_ref().map(|p| p.health)
    }

    pub fn is_resolved(&self, round: u32) -> bool {
        self.resolved_round >= round
    }

    /// The resolution record for `round`, once it has been written.
    pub fn record_for(&self, round: u32) -> Option<&RoundView> {
        self.last_round.as_ref().filter(|r| r.round == round)
    }

    pub fn changes_since(&self, previous: Option<&SessionView>) -> ViewChanges {
        let Some(prev) = previous else {
            return ViewChanges {
                status: true,
                opponent_joined: self.opponent.is_some(),
                ..ViewChanges::default()
            };
        };
        ViewChanges {
            status: self.status != prev.status,
            opponent_joined: prev.opponent.is_none() && self.opponent.is_some(),
            opponent_committed: !prev.opponent_ready() && self.opponent_ready(),
            round_resolved: self.resolved_round > prev.resolved_round,
            round_advanced: self.round > prev.round,
            opponent_next_round_ready: !prev.opponent_next_round_ready
                && self.opponent_next_round_ready,
            health: self.own_health() != prev.own_health()
                || self.opponent_health() != prev.opponent_health(),
        }
    }
}
