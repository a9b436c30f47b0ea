//! Match state machine for one client.
//!
//! The machine is a plain reducer: remote snapshots, timer firings, user
//! commands and store acknowledgements all arrive as [`Event`]s through one
//! queue, and every side effect leaves as an [`Effect`] for the coordinator
//! to execute. Timers carry the epoch they were scheduled in; a timer from an
//! earlier phase or session is ignored, so leaving a phase cancels it even if
//! the sleep has already completed.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::MatchConfig;
use crate::engine::{Move, Outcome};
use crate::room::{RoomCode, RoomEntry};
use crate::session::{MoveRecord, Role, RoundView, SessionDocument, SessionStatus, SessionView};

use super::expiry::ExpiryMonitor;
use super::handshake::{resolution_ready, CommitAck, CommitState, PendingSelection, ResolveAck};
use super::presentation::{MatchSnapshot, Notice, Phase, RevealDisclosure};
use super::reset::{reset_ready, ResetAck, SignalAck};
use super::reveal::{disclosed_messages, RevealSequencer, RevealStep, RevealTick};

const LOG_TARGET: &str = "rps_duel::game::machine";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerKind {
    SelectionTick,
    RevealTick,
    ExpiryCheck,
}

impl TimerKind {
    /// Session timers survive phase changes; the rest die with their phase.
    pub fn is_session_scoped(self) -> bool {
        matches!(self, TimerKind::ExpiryCheck)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timer {
    pub kind: TimerKind,
    pub epoch: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delay {
    Units(u32),
    ExpiryInterval,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    SelectMove(Move),
    SetMessage(String),
    Confirm,
    RequestNextRound,
    LeaveAndReset,
}

/// Result of a store effect, reported back by the coordinator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Settled {
    Commit(Result<CommitAck, String>),
    Resolve(Result<ResolveAck, String>),
    NextRound(Result<SignalAck, String>),
    Reset(Result<ResetAck, String>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Entered(RoomEntry),
    Command(Command),
    Remote {
        session: u64,
        document: Option<SessionDocument>,
    },
    SubscriptionLost {
        session: u64,
        error: String,
    },
    Timer(Timer),
    Settled {
        session: u64,
        round: u32,
        result: Settled,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    Subscribe {
        session: u64,
        code: RoomCode,
    },
    Commit {
        session: u64,
        code: RoomCode,
        role: Role,
        round: u32,
        record: MoveRecord,
    },
    Resolve {
        session: u64,
        code: RoomCode,
        round: u32,
    },
    SignalNextRound {
        session: u64,
        code: RoomCode,
        role: Role,
        round: u32,
    },
    Reset {
        session: u64,
        code: RoomCode,
        round: u32,
    },
    Schedule {
        timer: Timer,
        delay: Delay,
    },
    CancelPhaseTimers,
    Teardown {
        code: RoomCode,
        delete: bool,
    },
}

struct ActiveSession {
    code: RoomCode,
    role: Role,
    display_name: String,
    opponent_name: Option<String>,
    view: SessionView,
    round: u32,
    pending: PendingSelection,
    commit: CommitState,
    selection_remaining: u32,
    resolve_requested: bool,
    reveal: Option<RevealSequencer>,
    next_round_requested: bool,
    reset_requested: bool,
    impact_pulses: u32,
}

impl ActiveSession {
    fn new(entry: RoomEntry) -> Self {
        let view = SessionView::from_document(&entry.document, entry.role);
        Self {
            round: entry.document.round,
            code: entry.code,
            role: entry.role,
            display_name: entry.display_name,
            opponent_name: entry.opponent_name,
            view,
            pending: PendingSelection::default(),
            commit: CommitState::Open,
            selection_remaining: 0,
            resolve_requested: false,
            reveal: None,
            next_round_requested: false,
            reset_requested: false,
            impact_pulses: 0,
        }
    }

    fn start_round(&mut self, round: u32, selection_units: u32) {
        self.round = round;
        self.pending = PendingSelection::default();
        self.commit = CommitState::Open;
        self.selection_remaining = selection_units;
        self.resolve_requested = false;
        self.reveal = None;
        self.next_round_requested = false;
        self.reset_requested = false;
    }

    fn record(&self) -> Option<&RoundView> {
        self.view.record_for(self.round)
    }
}

pub struct MatchMachine {
    selection_units: u32,
    reveal_countdown_units: u32,
    auto_next_round: bool,
    expiry: ExpiryMonitor,
    phase: Phase,
    phase_epoch: u64,
    session_id: u64,
    active: Option<ActiveSession>,
    notice: Option<Notice>,
}

impl MatchMachine {
    pub fn new(config: &MatchConfig) -> Self {
        Self {
            selection_units: config.selection_units.max(1),
            reveal_countdown_units: config.reveal_countdown_units,
            auto_next_round: config.auto_next_round,
            expiry: ExpiryMonitor::new(config.session_ttl),
            phase: Phase::Login,
            phase_epoch: 0,
            session_id: 0,
            active: None,
            notice: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn in_session(&self) -> bool {
        self.active.is_some()
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn handle(&mut self, event: Event, now: DateTime<Utc>) -> Vec<Effect> {
        let mut fx = Vec::new();
        match event {
            Event::Entered(entry) => self.on_entered(entry, &mut fx),
            Event::Command(command) => self.on_command(command, now, &mut fx),
            Event::Remote { session, document } if session == self.session_id => {
                self.on_remote(document, now, &mut fx)
            }
            Event::SubscriptionLost { session, error } if session == self.session_id => {
                warn!(target: LOG_TARGET, %error, "room subscription lost");
                self.teardown(false, Some(Notice::StoreUnavailable { error }), &mut fx);
            }
            Event::Timer(timer) => self.on_timer(timer, now, &mut fx),
            Event::Settled {
                session,
                round,
                result,
            } if session == self.session_id => self.on_settled(round, result, &mut fx),
            Event::Remote { session, .. }
            | Event::SubscriptionLost { session, .. }
            | Event::Settled { session, .. } => {
                debug!(
                    target: LOG_TARGET,
                    session,
                    current = self.session_id,
                    "dropping event from a previous session"
                );
            }
        }
        fx
    }

    fn enter(&mut self, phase: Phase, fx: &mut Vec<Effect>) {
        if self.phase != phase {
            info!(target: LOG_TARGET, from = ?self.phase, to = ?phase, "phase transition");
        }
        self.phase = phase;
        self.phase_epoch += 1;
        fx.push(Effect::CancelPhaseTimers);
    }

    fn schedule(&self, kind: TimerKind, delay: Delay, fx: &mut Vec<Effect>) {
        let epoch = if kind.is_session_scoped() {
            self.session_id
        } else {
            self.phase_epoch
        };
        fx.push(Effect::Schedule {
            timer: Timer { kind, epoch },
            delay,
        });
    }

    fn on_entered(&mut self, entry: RoomEntry, fx: &mut Vec<Effect>) {
        if self.active.is_some() {
            warn!(
                target: LOG_TARGET,
                room = %entry.code,
                "already in a session; ignoring room entry"
            );
            return;
        }
        self.session_id += 1;
        self.notice = None;
        let waiting = entry.document.status == SessionStatus::Waiting;
        let round = entry.document.round;
        info!(
            target: LOG_TARGET,
            room = %entry.code,
            role = %entry.role,
            session = self.session_id,
            "entered room"
        );
        fx.push(Effect::Subscribe {
            session: self.session_id,
            code: entry.code.clone(),
        });
        self.active = Some(ActiveSession::new(entry));
        self.schedule(TimerKind::ExpiryCheck, Delay::ExpiryInterval, fx);
        if waiting {
            self.enter(Phase::Waiting, fx);
        } else {
            self.begin_round(round, fx);
        }
    }

    fn begin_round(&mut self, round: u32, fx: &mut Vec<Effect>) {
        let Some(session) = self.active.as_mut() else {
            return;
        };
        session.start_round(round, self.selection_units);
        info!(target: LOG_TARGET, room = %session.code, round, "round started");
        self.enter(Phase::Selecting, fx);
        self.schedule(TimerKind::SelectionTick, Delay::Units(1), fx);
    }

    fn on_remote(
        &mut self,
        document: Option<SessionDocument>,
        now: DateTime<Utc>,
        fx: &mut Vec<Effect>,
    ) {
        let Some(session) = self.active.as_mut() else {
            return;
        };
        let Some(doc) = document else {
            info!(target: LOG_TARGET, room = %session.code, "room document removed");
            self.teardown(false, Some(Notice::OpponentLeft), fx);
            return;
        };
        if doc.code != session.code.as_str() {
            warn!(
                target: LOG_TARGET,
                expected = %session.code,
                got = %doc.code,
                "snapshot for another room"
            );
            return;
        }
        if self.expiry.is_expired(doc.last_update_time, now) {
            self.expire(fx);
            return;
        }

        let view = SessionView::from_document(&doc, session.role);
        let changes = view.changes_since(Some(&session.view));
        if changes.any() {
            debug!(
                target: LOG_TARGET,
                room = %session.code,
                round = view.round,
                resolved_round = view.resolved_round,
                ?changes,
                "session changed"
            );
        }
        if session.opponent_name.is_none() {
            session.opponent_name = view.opponent_name().map(str::to_string);
        }
        session.view = view;
        self.advance(fx);
    }

    /// Re-evaluates the counterpart conditions of the current phase against
    /// the latest view.
    fn advance(&mut self, fx: &mut Vec<Effect>) {
        let Some(session) = self.active.as_ref() else {
            return;
        };
        let view = &session.view;
        let round = session.round;
        let moved_on = view.round > round && view.status == SessionStatus::Playing;
        let opponent_arrived = view.status != SessionStatus::Waiting && view.opponent.is_some();
        let frozen = resolution_ready(view, round);
        let resettable = reset_ready(view, round) && !session.reset_requested;
        let view_round = view.round;

        match self.phase {
            Phase::Waiting if opponent_arrived => self.begin_round(view_round, fx),
            Phase::Selecting | Phase::RoundOver if moved_on => self.begin_round(view_round, fx),
            Phase::Selecting if frozen => self.enter_revealing(fx),
            Phase::Revealing => {
                self.request_resolve(fx);
                self.finish_reveal(fx);
            }
            Phase::RoundOver if resettable => self.request_reset(fx),
            _ => {}
        }
    }

    fn enter_revealing(&mut self, fx: &mut Vec<Effect>) {
        let countdown = self.reveal_countdown_units;
        let Some(session) = self.active.as_mut() else {
            return;
        };
        if session.commit == CommitState::Open {
            session.commit = CommitState::Closed;
        }
        session.reveal = Some(RevealSequencer::new(countdown));
        info!(target: LOG_TARGET, room = %session.code, round = session.round, "selection closed");
        self.enter(Phase::Revealing, fx);
        self.request_resolve(fx);
        self.schedule(TimerKind::RevealTick, Delay::Units(1), fx);
    }

    /// Asks the store to freeze the round once both commits are visible. A
    /// missing commit only forfeits after the reveal countdown has run out,
    /// which gives the other client's deadline commit time to land.
    fn request_resolve(&mut self, fx: &mut Vec<Effect>) {
        let session_id = self.session_id;
        let Some(session) = self.active.as_mut() else {
            return;
        };
        let grace_over = session
            .reveal
            .as_ref()
            .is_some_and(|reveal| reveal.countdown() == 0);
        let view = &session.view;
        if session.resolve_requested
            || view.is_resolved(session.round)
            || !(view.both_ready() || grace_over)
        {
            return;
        }
        session.resolve_requested = true;
        debug!(
            target: LOG_TARGET,
            round = session.round,
            both_ready = view.both_ready(),
            "requesting resolution"
        );
        fx.push(Effect::Resolve {
            session: session_id,
            code: session.code.clone(),
            round: session.round,
        });
    }

    fn finish_reveal(&mut self, fx: &mut Vec<Effect>) {
        if self.phase != Phase::Revealing {
            return;
        }
        let Some(session) = self.active.as_ref() else {
            return;
        };
        let complete = session
            .reveal
            .as_ref()
            .is_some_and(RevealSequencer::is_complete);
        if !complete {
            return;
        }
        let Some(record) = session.record() else {
            debug!(
                target: LOG_TARGET,
                round = session.round,
                "reveal done; waiting for resolution record"
            );
            return;
        };
        if record.game_over {
            info!(
                target: LOG_TARGET,
                room = %session.code,
                own_health = record.own_health_after,
                opponent_health = record.opponent_health_after,
                "game over"
            );
            self.enter(Phase::GameOver, fx);
        } else {
            self.enter(Phase::RoundOver, fx);
            if self.auto_next_round {
                self.request_next_round(fx);
            }
        }
    }

    fn request_next_round(&mut self, fx: &mut Vec<Effect>) {
        if self.phase != Phase::RoundOver {
            debug!(target: LOG_TARGET, phase = ?self.phase, "next round request ignored");
            return;
        }
        let session_id = self.session_id;
        let Some(session) = self.active.as_mut() else {
            return;
        };
        if session.next_round_requested {
            return;
        }
        session.next_round_requested = true;
        fx.push(Effect::SignalNextRound {
            session: session_id,
            code: session.code.clone(),
            role: session.role,
            round: session.round,
        });
    }

    fn request_reset(&mut self, fx: &mut Vec<Effect>) {
        let session_id = self.session_id;
        let Some(session) = self.active.as_mut() else {
            return;
        };
        session.reset_requested = true;
        fx.push(Effect::Reset {
            session: session_id,
            code: session.code.clone(),
            round: session.round,
        });
    }

    fn on_timer(&mut self, timer: Timer, now: DateTime<Utc>, fx: &mut Vec<Effect>) {
        let current = if timer.kind.is_session_scoped() {
            self.session_id
        } else {
            self.phase_epoch
        };
        if timer.epoch != current {
            debug!(target: LOG_TARGET, ?timer, current, "stale timer");
            return;
        }
        match timer.kind {
            TimerKind::ExpiryCheck => self.check_expiry(now, fx),
            TimerKind::SelectionTick => self.on_selection_tick(now, fx),
            TimerKind::RevealTick => self.on_reveal_tick(fx),
        }
    }

    fn check_expiry(&mut self, now: DateTime<Utc>, fx: &mut Vec<Effect>) {
        let Some(session) = self.active.as_ref() else {
            return;
        };
        if self.expiry.is_expired(session.view.last_update_time, now) {
            self.expire(fx);
        } else {
            self.schedule(TimerKind::ExpiryCheck, Delay::ExpiryInterval, fx);
        }
    }

    fn on_selection_tick(&mut self, now: DateTime<Utc>, fx: &mut Vec<Effect>) {
        if self.phase != Phase::Selecting {
            return;
        }
        let session_id = self.session_id;
        let Some(session) = self.active.as_mut() else {
            return;
        };
        session.selection_remaining = session.selection_remaining.saturating_sub(1);
        if session.selection_remaining > 0 {
            self.schedule(TimerKind::SelectionTick, Delay::Units(1), fx);
            return;
        }

        info!(
            target: LOG_TARGET,
            room = %session.code,
            round = session.round,
            pending = ?session.pending.selection,
            "selection deadline reached"
        );
        if session.commit == CommitState::Open {
            session.commit = CommitState::InFlight;
            fx.push(Effect::Commit {
                session: session_id,
                code: session.code.clone(),
                role: session.role,
                round: session.round,
                record: session.pending.to_record(now),
            });
        }
        self.enter_revealing(fx);
    }

    fn on_reveal_tick(&mut self, fx: &mut Vec<Effect>) {
        if self.phase != Phase::Revealing {
            return;
        }
        let Some(session) = self.active.as_mut() else {
            return;
        };
        let Some(reveal) = session.reveal.as_mut() else {
            return;
        };
        let tick = reveal.tick();
        let complete = reveal.is_complete();
        match tick {
            RevealTick::Countdown(left) => {
                debug!(target: LOG_TARGET, left, "reveal countdown");
                self.request_resolve(fx);
                self.schedule(TimerKind::RevealTick, Delay::Units(1), fx);
            }
            RevealTick::Disclosed(step) => {
                session.impact_pulses += 1;
                debug!(target: LOG_TARGET, ?step, "reveal step");
                if complete {
                    self.finish_reveal(fx);
                } else {
                    self.schedule(TimerKind::RevealTick, Delay::Units(1), fx);
                }
            }
            RevealTick::Done => {}
        }
    }

    fn on_command(&mut self, command: Command, now: DateTime<Utc>, fx: &mut Vec<Effect>) {
        match command {
            Command::SelectMove(choice) => match self.selectable() {
                Some(session) => session.pending.selection = Some(choice),
                None => debug!(target: LOG_TARGET, ?choice, "selection ignored"),
            },
            Command::SetMessage(text) => match self.selectable() {
                Some(session) => session.pending.message = text,
                None => debug!(target: LOG_TARGET, "message ignored"),
            },
            Command::Confirm => self.confirm(now, fx),
            Command::RequestNextRound => self.request_next_round(fx),
            Command::LeaveAndReset => {
                if self.active.is_some() {
                    self.teardown(true, None, fx);
                } else if self.phase != Phase::Login {
                    self.enter(Phase::Login, fx);
                }
            }
        }
    }

    fn selectable(&mut self) -> Option<&mut ActiveSession> {
        if self.phase != Phase::Selecting {
            return None;
        }
        self.active
            .as_mut()
            .filter(|session| session.commit == CommitState::Open)
    }

    fn confirm(&mut self, now: DateTime<Utc>, fx: &mut Vec<Effect>) {
        let session_id = self.session_id;
        let Some(session) = self.selectable() else {
            debug!(target: LOG_TARGET, "confirm ignored");
            return;
        };
        if session.pending.selection.is_none() {
            debug!(target: LOG_TARGET, "confirm without a selection ignored");
            return;
        }
        session.commit = CommitState::InFlight;
        info!(
            target: LOG_TARGET,
            room = %session.code,
            round = session.round,
            "confirming selection"
        );
        fx.push(Effect::Commit {
            session: session_id,
            code: session.code.clone(),
            role: session.role,
            round: session.round,
            record: session.pending.to_record(now),
        });
    }

    fn on_settled(&mut self, round: u32, result: Settled, fx: &mut Vec<Effect>) {
        let phase = self.phase;
        let Some(session) = self.active.as_mut() else {
            return;
        };
        if round != session.round {
            debug!(
                target: LOG_TARGET,
                round,
                current = session.round,
                ?result,
                "late store result"
            );
            return;
        }
        match result {
            Settled::Commit(Ok(CommitAck::Accepted | CommitAck::AlreadyCommitted)) => {
                session.commit = CommitState::Committed;
            }
            Settled::Commit(Ok(CommitAck::RoundClosed)) => {
                session.commit = CommitState::Closed;
                self.notice = Some(Notice::CommitTooLate);
            }
            Settled::Commit(Err(error)) => {
                session.commit = if phase == Phase::Selecting {
                    CommitState::Open
                } else {
                    CommitState::Closed
                };
                warn!(target: LOG_TARGET, round, %error, "commit failed");
                self.notice = Some(Notice::StoreWriteFailed {
                    operation: "confirm",
                    error,
                });
            }
            Settled::Resolve(Ok(ack)) => {
                debug!(target: LOG_TARGET, round, ?ack, "resolution settled");
            }
            Settled::Resolve(Err(error)) => {
                warn!(target: LOG_TARGET, round, %error, "resolution failed");
                session.resolve_requested = false;
                self.notice = Some(Notice::StoreWriteFailed {
                    operation: "resolve round",
                    error,
                });
                if phase == Phase::Revealing {
                    self.request_resolve(fx);
                }
            }
            Settled::NextRound(Ok(ack)) => {
                debug!(target: LOG_TARGET, round, ?ack, "next round signal settled");
            }
            Settled::NextRound(Err(error)) => {
                warn!(target: LOG_TARGET, round, %error, "next round signal failed");
                session.next_round_requested = false;
                self.notice = Some(Notice::StoreWriteFailed {
                    operation: "request next round",
                    error,
                });
                if self.auto_next_round {
                    self.request_next_round(fx);
                }
            }
            Settled::Reset(Ok(ack)) => {
                debug!(target: LOG_TARGET, round, ?ack, "reset settled");
            }
            Settled::Reset(Err(error)) => {
                warn!(target: LOG_TARGET, round, %error, "reset failed");
                session.reset_requested = false;
                self.notice = Some(Notice::StoreWriteFailed {
                    operation: "start next round",
                    error,
                });
                self.advance(fx);
            }
        }
    }

    fn expire(&mut self, fx: &mut Vec<Effect>) {
        info!(target: LOG_TARGET, "session expired");
        self.teardown(true, Some(Notice::SessionExpired), fx);
    }

    /// Leaves the session: drops local state, invalidates every timer and
    /// subscription event of this session and returns to Login.
    fn teardown(&mut self, delete: bool, notice: Option<Notice>, fx: &mut Vec<Effect>) {
        let Some(session) = self.active.take() else {
            return;
        };
        info!(
            target: LOG_TARGET,
            room = %session.code,
            round = session.round,
            delete,
            "leaving session"
        );
        self.session_id += 1;
        self.notice = notice;
        self.enter(Phase::Login, fx);
        fx.push(Effect::Teardown {
            code: session.code,
            delete,
        });
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        let mut snapshot = MatchSnapshot {
            phase: self.phase,
            notice: self.notice.clone(),
            ..MatchSnapshot::default()
        };
        let Some(session) = self.active.as_ref() else {
            return snapshot;
        };
        let view = &session.view;
        let record = session.record();

        snapshot.room_code = Some(session.code.to_string());
        snapshot.role = Some(session.role);
        snapshot.display_name = Some(session.display_name.clone());
        snapshot.opponent_name = session
            .opponent_name
            .clone()
            .or_else(|| view.opponent_name().map(str::to_string));
        snapshot.round = session.round;
        snapshot.own_health = view.own_health();
        snapshot.opponent_health = view.opponent_health();
        snapshot.pending_selection = session.pending.selection;
        snapshot.pending_message = session.pending.message.clone();
        snapshot.own_ready = view.own_ready();
        snapshot.opponent_ready = view.opponent_ready();
        snapshot.own_next_round_ready = view.own_next_round_ready;
        snapshot.opponent_next_round_ready = view.opponent_next_round_ready;
        snapshot.impact_pulses = session.impact_pulses;

        if self.phase == Phase::Selecting {
            snapshot.selection_countdown = Some(session.selection_remaining);
        }
        if let Some(reveal) = session.reveal.as_ref() {
            if self.phase == Phase::Revealing {
                snapshot.reveal_countdown = Some(reveal.countdown());
                if let Some(record) = record.filter(|_| !reveal.is_disclosed(RevealStep::Health)) {
                    snapshot.own_health = Some(record.own_health_before);
                    snapshot.opponent_health = Some(record.opponent_health_before);
                }
            }
            snapshot.reveal = disclosure(reveal, record);
        }
        if self.phase == Phase::GameOver {
            snapshot.final_outcome = match (snapshot.own_health, snapshot.opponent_health) {
                (Some(0), Some(0)) => Some(Outcome::Tie),
                (Some(0), _) => Some(Outcome::Lose),
                (_, Some(0)) => Some(Outcome::Win),
                _ => None,
            };
        }
        snapshot
    }
}

fn disclosure(reveal: &RevealSequencer, record: Option<&RoundView>) -> RevealDisclosure {
    let mut out = RevealDisclosure {
        step: reveal.disclosed(),
        ..RevealDisclosure::default()
    };
    let Some(record) = record else {
        return out;
    };
    if reveal.is_disclosed(RevealStep::OwnMove) {
        out.own_move = Some(record.own_selection.into());
    }
    if reveal.is_disclosed(RevealStep::OpponentMove) {
        out.opponent_move = Some(record.opponent_selection.into());
    }
    if reveal.is_disclosed(RevealStep::Verdict) {
        out.verdict = Some(record.outcome);
    }
    if reveal.is_disclosed(RevealStep::Messages) {
        out.messages = Some(disclosed_messages(record));
    }
    if reveal.is_disclosed(RevealStep::Health) {
        out.health = Some((record.own_health_after, record.opponent_health_after));
    }
    out
}
