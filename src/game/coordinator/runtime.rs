use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MatchConfig;
use crate::game::machine::{Command, Delay, Effect, Event, MatchMachine, Timer};
use crate::game::presentation::MatchSnapshot;
use crate::room::{RoomCode, RoomEntry, RoomError, RoomLobby};
use crate::session::SessionRepository;
use crate::store::StoreError;
use crate::tokio_tools::spawn_room_task;

use super::worker::StoreJob;

const LOG_TARGET: &str = "rps_duel::game::coordinator::runtime";

pub(super) type RoomReply = oneshot::Sender<Result<RoomEntry, RoomError>>;

pub(super) enum Request {
    Create {
        name: String,
        code: String,
        reply: RoomReply,
    },
    Join {
        name: String,
        code: String,
        reply: RoomReply,
    },
    Command(Command),
    Shutdown,
}

/// Owns the machine and turns its effects into tasks. Timers and the room
/// subscription hang off cancellation tokens: phase timers off `phase`,
/// everything of the current session off `session`.
pub(super) struct MatchRuntime {
    machine: MatchMachine,
    config: MatchConfig,
    lobby: RoomLobby,
    repo: SessionRepository,
    events_tx: mpsc::UnboundedSender<Event>,
    store_jobs: mpsc::UnboundedSender<StoreJob>,
    snapshots: watch::Sender<MatchSnapshot>,
    stop: CancellationToken,
    session: CancellationToken,
    phase: CancellationToken,
}

impl MatchRuntime {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        machine: MatchMachine,
        config: MatchConfig,
        lobby: RoomLobby,
        repo: SessionRepository,
        events_tx: mpsc::UnboundedSender<Event>,
        store_jobs: mpsc::UnboundedSender<StoreJob>,
        snapshots: watch::Sender<MatchSnapshot>,
        stop: CancellationToken,
    ) -> Self {
        let session = stop.child_token();
        let phase = session.child_token();
        Self {
            machine,
            config,
            lobby,
            repo,
            events_tx,
            store_jobs,
            snapshots,
            stop,
            session,
            phase,
        }
    }

    pub(super) async fn run(
        mut self,
        mut requests: mpsc::Receiver<Request>,
        mut events: mpsc::UnboundedReceiver<Event>,
    ) {
        info!(target: LOG_TARGET, client = %self.lobby.client_id(), "match runtime started");
        loop {
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                Some(event) = events.recv() => self.dispatch(event),
                request = requests.recv() => match request {
                    Some(Request::Shutdown) | None => break,
                    Some(request) => self.on_request(request).await,
                },
            }
        }
        self.session.cancel();
        info!(target: LOG_TARGET, "match runtime stopped");
    }

    async fn on_request(&mut self, request: Request) {
        match request {
            Request::Create { name, code, reply } => {
                self.flush_store().await;
                let result = if self.machine.in_session() {
                    Err(RoomError::AlreadyInSession)
                } else {
                    self.lobby.create_room(&name, &code).await
                };
                self.settle_entry(result, reply);
            }
            Request::Join { name, code, reply } => {
                self.flush_store().await;
                let result = if self.machine.in_session() {
                    Err(RoomError::AlreadyInSession)
                } else {
                    self.lobby.join_room(&name, &code).await
                };
                self.settle_entry(result, reply);
            }
            Request::Command(command) => self.dispatch(Event::Command(command)),
            Request::Shutdown => {}
        }
    }

    fn settle_entry(&mut self, result: Result<RoomEntry, RoomError>, reply: RoomReply) {
        match &result {
            Ok(entry) => self.dispatch(Event::Entered(entry.clone())),
            Err(err) => warn!(target: LOG_TARGET, error = %err, "room request failed"),
        }
        if reply.send(result).is_err() {
            debug!(target: LOG_TARGET, "room request caller went away");
        }
    }

    fn dispatch(&mut self, event: Event) {
        let effects = self.machine.handle(event, Utc::now());
        for effect in effects {
            self.apply(effect);
        }
        let snapshot = self.machine.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Subscribe { session, code } => self.subscribe(session, code),
            Effect::Schedule { timer, delay } => self.schedule(timer, delay),
            Effect::CancelPhaseTimers => {
                self.phase.cancel();
                self.phase = self.session.child_token();
            }
            Effect::Teardown { code, delete } => {
                self.session.cancel();
                self.session = self.stop.child_token();
                self.phase = self.session.child_token();
                if delete {
                    self.queue(Effect::Teardown { code, delete });
                }
            }
            store @ (Effect::Commit { .. }
            | Effect::Resolve { .. }
            | Effect::SignalNextRound { .. }
            | Effect::Reset { .. }) => self.queue(store),
        }
    }

    /// Waits until the store worker has finished everything queued so far,
    /// e.g. the delete of a room this client just left.
    async fn flush_store(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.store_jobs.send(StoreJob::Flush(done_tx)).is_err() || done_rx.await.is_err() {
            warn!(target: LOG_TARGET, "store worker gone; not waiting for pending writes");
        }
    }

    fn queue(&self, job: Effect) {
        if self.store_jobs.send(StoreJob::Effect(job)).is_err() {
            warn!(target: LOG_TARGET, "store worker gone; dropping store effect");
        }
    }

    fn schedule(&self, timer: Timer, delay: Delay) {
        let duration = match delay {
            Delay::Units(count) => self.config.units(count),
            Delay::ExpiryInterval => self.config.expiry_check_interval,
        };
        let token = if timer.kind.is_session_scoped() {
            self.session.clone()
        } else {
            self.phase.clone()
        };
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(duration) => {
                    let _ = events.send(Event::Timer(timer));
                }
            }
        });
    }

    fn subscribe(&self, session: u64, code: RoomCode) {
        let repo = self.repo.clone();
        let events = self.events_tx.clone();
        let token = self.session.clone();
        let room = code.to_string();
        spawn_room_task("room-subscription", &room, async move {
            let subscribed = tokio::select! {
                _ = token.cancelled() => return,
                subscribed = repo.subscribe(&code) => subscribed,
            };
            let mut subscription = match subscribed {
                Ok(subscription) => subscription,
                Err(err) => {
                    let _ = events.send(Event::SubscriptionLost {
                        session,
                        error: err.to_string(),
                    });
                    return;
                }
            };
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    update = subscription.next() => match update {
                        Some(value) => match SessionRepository::decode(value) {
                            Ok(document) => {
                                if events.send(Event::Remote { session, document }).is_err() {
                                    break;
                                }
                            }
                            Err(err) => {
                                warn!(
                                    target: LOG_TARGET,
                                    room = %code,
                                    error = %err,
                                    "ignoring undecodable room snapshot"
                                );
                            }
                        },
                        None => {
                            let _ = events.send(Event::SubscriptionLost {
                                session,
                                error: StoreError::Closed.to_string(),
                            });
                            break;
                        }
                    },
                }
            }
            debug!(target: LOG_TARGET, room = %code, "room subscription ended");
        });
    }
}
