use serde::Serialize;

use crate::engine::{Health, Move, Outcome};
use crate::session::Role;

use super::reveal::{DisclosedMessages, RevealStep};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    #[default]
    Login,
    Waiting,
    Selecting,
    Revealing,
    RoundOver,
    GameOver,
}

/// A committed hand as shown to a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Shown {
    Played(Move),
    NoSelection,
}

impl From<Option<Move>> for Shown {
    fn from(selection: Option<Move>) -> Self {
        selection.map_or(Shown::NoSelection, Shown::Played)
    }
}

impl std::fmt::Display for Shown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Shown::Played(m) => write!(f, "{m}"),
            Shown::NoSelection => f.write_str("nothing"),
        }
    }
}

/// Facts of the current round that the reveal has reached so far.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RevealDisclosure {
    pub step: Option<RevealStep>,
    pub own_move: Option<Shown>,
    pub opponent_move: Option<Shown>,
    pub verdict: Option<Outcome>,
    pub messages: Option<DisclosedMessages>,
    pub health: Option<(Health, Health)>,
}

/// Out-of-band information for the player. The latest one stays on the
/// snapshot until replaced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Notice {
    SessionExpired,
    OpponentLeft,
    /// The confirm arrived after the round had already been frozen.
    CommitTooLate,
    StoreWriteFailed { operation: &'static str, error: String },
    StoreUnavailable { error: String },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::SessionExpired => f.write_str("session expired"),
            Notice::OpponentLeft => f.write_str("opponent left the room"),
            Notice::CommitTooLate => f.write_str("round closed before your choice was saved"),
            Notice::StoreWriteFailed { operation, error } => {
                write!(f, "failed to {operation}: {error}")
            }
            Notice::StoreUnavailable { error } => write!(f, "lost connection to room: {error}"),
        }
    }
}

/// Everything the presentation layer needs to draw one frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MatchSnapshot {
    pub phase: Phase,
    pub room_code: Option<String>,
    pub role: Option<Role>,
    pub display_name: Option<String>,
    pub opponent_name: Option<String>,
    pub round: u32,
    pub own_health: Option<Health>,
    pub opponent_health: Option<Health>,
    pub pending_selection: Option<Move>,
    pub pending_message: String,
    pub own_ready: bool,
    pub opponent_ready: bool,
    pub selection_countdown: Option<u32>,
    pub reveal_countdown: Option<u32>,
    pub reveal: RevealDisclosure,
    pub own_next_round_ready: bool,
    pub opponent_next_round_ready: bool,
    pub impact_pulses: u32,
    /// Final verdict from this seat once the session is over.
    pub final_outcome: Option<Outcome>,
    pub notice: Option<Notice>,
}
