//! Commit and resolution steps of a round, as pure transaction bodies over
//! the session document.

use chrono::{DateTime, Utc};

use crate::engine::{resolve, Move};
use crate::session::{
    Apply, MoveRecord, PerRole, Role, RoundRecord, SessionDocument, SessionStatus, SessionView,
};

/// Local, unshared choice for the current round.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PendingSelection {
    pub selection: Option<Move>,
    pub message: String,
}

impl PendingSelection {
    pub fn to_record(&self, now: DateTime<Utc>) -> MoveRecord {
        MoveRecord {
            selection: self.selection,
            message: self.message.clone(),
            committed_at: now,
        }
    }
}

/// Where the local commit for the current round stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitState {
    /// Selection may still change.
    Open,
    /// Commit written, waiting for the store to acknowledge.
    InFlight,
    Committed,
    /// The round was resolved without this client's commit.
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitAck {
    Accepted,
    AlreadyCommitted,
    /// The round moved on or was resolved first.
    RoundClosed,
}

pub fn apply_commit(
    doc: Option<SessionDocument>,
    role: Role,
    round: u32,
    record: &MoveRecord,
    now: DateTime<Utc>,
) -> Apply<CommitAck> {
    let Some(mut doc) = doc else {
        return Apply::Skip(CommitAck::RoundClosed);
    };
    if doc.round != round || doc.resolved_round >= round || doc.status != SessionStatus::Playing {
        return Apply::Skip(CommitAck::RoundClosed);
    }
    let Some(slot) = doc.players[role].as_mut() else {
        return Apply::Skip(CommitAck::RoundClosed);
    };
    if slot.ready {
        return Apply::Skip(CommitAck::AlreadyCommitted);
    }
    slot.ready = true;
    doc.moves[role] = Some(record.clone());
    doc.touch(now);
    Apply::Commit(doc, CommitAck::Accepted)
}

/// Both seats have committed, or somebody already froze the round.
pub fn resolution_ready(view: &SessionView, round: u32) -> bool {
    view.round == round && (view.both_ready() || view.is_resolved(round))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolveAck {
    Applied { game_over: bool },
    AlreadyResolved,
    /// Document gone or no longer on this round.
    Stale,
}

/// Freezes `round`: applies damage once, records the outcome and ends the
/// session when a health pool is empty. Safe for both clients to attempt.
pub fn apply_resolution(
    doc: Option<SessionDocument>,
    round: u32,
    now: DateTime<Utc>,
) -> Apply<ResolveAck> {
    let Some(mut doc) = doc else {
        return Apply::Skip(ResolveAck::Stale);
    };
    if doc.resolved_round >= round {
        return Apply::Skip(ResolveAck::AlreadyResolved);
    }
    if doc.round != round || doc.status != SessionStatus::Playing {
        return Apply::Skip(ResolveAck::Stale);
    }
    let (Some(_), Some(_)) = (doc.player(Role::A), doc.player(Role::B)) else {
        return Apply::Skip(ResolveAck::Stale);
    };

    let selections = PerRole::new(doc.selection(Role::A), doc.selection(Role::B));
    let health_before = PerRole::new(doc.health(Role::A), doc.health(Role::B));
    let resolution = resolve(
        selections.a,
        selections.b,
        health_before.a,
        health_before.b,
    );
    let message = |role: Role| {
        doc.moves[role]
            .as_ref()
            .map(|m| m.message.clone())
            .unwrap_or_default()
    };
    let messages = PerRole::new(message(Role::A), message(Role::B));

    if let Some(a) = doc.players.a.as_mut() {
        a.health = resolution.self_health;
    }
    if let Some(b) = doc.players.b.as_mut() {
        b.health = resolution.opp_health;
    }
    doc.last_round = Some(RoundRecord {
        round,
        selections,
        messages,
        health_before,
        health_after: PerRole::new(resolution.self_health, resolution.opp_health),
        outcome_for_a: resolution.outcome,
        game_over: resolution.game_over,
    });
    doc.resolved_round = round;
    if resolution.game_over {
        doc.status = SessionStatus::GameOver;
    }
    doc.touch(now);
    Apply::Commit(
        doc,
        ResolveAck::Applied {
            game_over: resolution.game_over,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Outcome;
    use crate::game::testing::playing_document;

    fn commit(
        doc: SessionDocument,
        role: Role,
        selection: Option<Move>,
        msg: &str,
    ) -> SessionDocument {
        let record = PendingSelection {
            selection,
            message: msg.to_string(),
        }
        .to_record(Utc::now());
        match apply_commit(Some(doc), role, 1, &record, Utc::now()) {
            Apply::Commit(doc, CommitAck::Accepted) => doc,
            other => panic!("commit rejected: {other:?}"),
        }
    }

    #[test]
    fn a_commit_is_final_for_the_round() {
        let doc = commit(playing_document(), Role::A, Some(Move::Rock), "");
        assert!(doc.is_ready(Role::A));
        let record = PendingSelection::default().to_record(Utc::now());
        assert!(matches!(
            apply_commit(Some(doc), Role::A, 1, &record, Utc::now()),
            Apply::Skip(CommitAck::AlreadyCommitted)
        ));
    }

    #[test]
    fn commits_after_resolution_are_refused() {
        let mut doc = playing_document();
        doc.resolved_round = 1;
        let record = PendingSelection::default().to_record(Utc::now());
        assert!(matches!(
            apply_commit(Some(doc), Role::B, 1, &record, Utc::now()),
            Apply::Skip(CommitAck::RoundClosed)
        ));
    }

    #[test]
    fn resolution_applies_damage_exactly_once() {
        let doc = commit(playing_document(), Role::A, Some(Move::Rock), "rock on");
        let doc = commit(doc, Role::B, Some(Move::Paper), "wrapped");
        assert!(resolution_ready(&SessionView::from_document(&doc, Role::A), 1));

        let Apply::Commit(resolved, ResolveAck::Applied { game_over: false }) =
            apply_resolution(Some(doc), 1, Utc::now())
        else {
            panic!("resolution should apply");
        };
        assert_eq!(resolved.health(Role::A), 4);
        assert_eq!(resolved.health(Role::B), 5);
        assert_eq!(resolved.resolved_round, 1);
        let record = resolved.last_round.as_ref().unwrap();
        assert_eq!(record.outcome_for_a, Outcome::Lose);
        assert_eq!(record.messages.b, "wrapped");
        assert_eq!(record.health_before, PerRole::new(5, 5));

        assert!(matches!(
            apply_resolution(Some(resolved), 1, Utc::now()),
            Apply::Skip(ResolveAck::AlreadyResolved)
        ));
    }

    #[test]
    fn deadline_resolution_treats_the_missing_commit_as_a_loss() {
        let doc = commit(playing_document(), Role::B, Some(Move::Scissors), "");
        let view = SessionView::from_document(&doc, Role::B);
        assert!(!resolution_ready(&view, 1));

        let Apply::Commit(resolved, _) = apply_resolution(Some(doc), 1, Utc::now()) else {
            panic!("resolution should apply");
        };
        assert_eq!(resolved.health(Role::A), 4);
        assert_eq!(resolved.health(Role::B), 5);
        assert_eq!(resolved.last_round.unwrap().selections.a, None);
    }

    #[test]
    fn emptying_a_pool_ends_the_session() {
        let mut doc = playing_document();
        doc.players.b.as_mut().unwrap().health = 1;
        let doc = commit(doc, Role::A, Some(Move::Scissors), "");
        let doc = commit(doc, Role::B, Some(Move::Paper), "");

        let Apply::Commit(resolved, ResolveAck::Applied { game_over: true }) =
            apply_resolution(Some(doc), 1, Utc::now())
        else {
            panic!("resolution should end the game");
        };
        assert_eq!(resolved.status, SessionStatus::GameOver);
        assert_eq!(resolved.health(Role::B), 0);
    }
}
