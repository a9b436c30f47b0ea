//! Next-round handshake: each seat raises `nextRoundReady`, and the round is
//! reset only once both flags are up.

use chrono::{DateTime, Utc};

use crate::session::{Apply, PerRole, Role, SessionDocument, SessionStatus, SessionView};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalAck {
    Raised,
    AlreadyRaised,
    /// The session is not on a resolved `round` any more.
    Stale,
}

/// Raises this seat's `nextRoundReady` flag for `round` only. A signal that
/// arrives after the session moved on is dropped, so a flag never carries
/// over into the following round.
pub fn apply_next_round_signal(
    doc: Option<SessionDocument>,
    role: Role,
    round: u32,
    now: DateTime<Utc>,
) -> Apply<SignalAck> {
    let Some(mut doc) = doc else {
        return Apply::Skip(SignalAck::Stale);
    };
    if doc.round != round || doc.resolved_round < round || doc.status != SessionStatus::Playing {
        return Apply::Skip(SignalAck::Stale);
    }
    if doc.next_round_ready[role] {
        return Apply::Skip(SignalAck::AlreadyRaised);
    }
    doc.next_round_ready[role] = true;
    doc.touch(now);
    Apply::Commit(doc, SignalAck::Raised)
}

pub fn reset_ready(view: &SessionView, round: u32) -> bool {
    view.round == round
        && view.is_resolved(round)
        && view.status == SessionStatus::Playing
        && view.both_next_round_ready()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetAck {
    Applied { next_round: u32 },
    /// The other client already moved the session past `round`.
    AlreadyReset,
    NotReady,
    GameOver,
}

/// Clears per-round state and advances the round counter. Keyed on `round` so
/// a late attempt cannot wipe commits of the following round.
pub fn apply_reset(
    doc: Option<SessionDocument>,
    round: u32,
    now: DateTime<Utc>,
) -> Apply<ResetAck> {
    let Some(mut doc) = doc else {
        return Apply::Skip(ResetAck::NotReady);
    };
    if doc.round > round {
        return Apply::Skip(ResetAck::AlreadyReset);
    }
    if doc.status == SessionStatus::GameOver {
        return Apply::Skip(ResetAck::GameOver);
    }
    if doc.round != round || doc.resolved_round < round || !doc.both_next_round_ready() {
        return Apply::Skip(ResetAck::NotReady);
    }
    for role in [Role::A, Role::B] {
        if let Some(slot) = doc.players[role].as_mut() {
            slot.ready = false;
        }
    }
    doc.moves = PerRole::default();
    doc.next_round_ready = PerRole::default();
    doc.status = SessionStatus::Playing;
    doc.round = round + 1;
    doc.touch(now);
    Apply::Commit(
        doc,
        ResetAck::Applied {
            next_round: round + 1,
        },
    )
}
