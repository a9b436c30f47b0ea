use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::game::handshake::{apply_commit, apply_resolution};
use crate::game::machine::{Effect, Event, Settled};
use crate::game::reset::{apply_next_round_signal, apply_reset};
use crate::room::RoomLobby;
use crate::session::SessionRepository;

const LOG_TARGET: &str = "rps_duel::game::coordinator::worker";

pub(super) enum StoreJob {
    Effect(Effect),
    /// Answered once every job queued before it has finished.
    Flush(oneshot::Sender<()>),
}

/// Executes store effects one at a time, in the order the machine emitted
/// them, and reports each result back as an event.
pub(super) struct StoreWorker {
    repo: SessionRepository,
    lobby: RoomLobby,
    events: mpsc::UnboundedSender<Event>,
}

impl StoreWorker {
    pub(super) fn new(
        repo: SessionRepository,
        lobby: RoomLobby,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        Self {
            repo,
            lobby,
            events,
        }
    }

    /// Runs until every sender is gone, draining queued jobs first.
    pub(super) async fn run(self, mut jobs: mpsc::UnboundedReceiver<StoreJob>) {
        while let Some(job) = jobs.recv().await {
            match job {
                StoreJob::Effect(effect) => self.execute(effect).await,
                StoreJob::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!(target: LOG_TARGET, "store worker stopped");
    }

    async fn execute(&self, job: Effect) {
        let (session, round, result) = match job {
            Effect::Commit {
                session,
                code,
                role,
                round,
                record,
            } => {
                let result = self
                    .repo
                    .update(&code, |doc| apply_commit(doc, role, round, &record, Utc::now()))
                    .await
                    .map_err(|err| err.to_string());
                (session, round, Settled::Commit(result))
            }
            Effect::Resolve {
                session,
                code,
                round,
            } => {
                let result = self
                    .repo
                    .update(&code, |doc| apply_resolution(doc, round, Utc::now()))
                    .await
                    .map_err(|err| err.to_string());
                (session, round, Settled::Resolve(result))
            }
            Effect::SignalNextRound {
                session,
                code,
                role,
                round,
            } => {
                let result = self
                    .repo
                    .update(&code, |doc| {
                        apply_next_round_signal(doc, role, round, Utc::now())
                    })
                    .await
                    .map_err(|err| err.to_string());
                (session, round, Settled::NextRound(result))
            }
            Effect::Reset {
                session,
                code,
                round,
            } => {
                let result = self
                    .repo
                    .update(&code, |doc| apply_reset(doc, round, Utc::now()))
                    .await
                    .map_err(|err| err.to_string());
                (session, round, Settled::Reset(result))
            }
            Effect::Teardown { code, delete: true } => {
                // Best effort; the failure is already logged by the lobby.
                let _ = self.lobby.abandon(&code).await;
                return;
            }
            other => {
                warn!(target: LOG_TARGET, effect = ?other, "not a store effect");
                return;
            }
        };

        debug!(target: LOG_TARGET, session, round, ?result, "store effect settled");
        if self
            .events
            .send(Event::Settled {
                session,
                round,
                result,
            })
            .is_err()
        {
            debug!(target: LOG_TARGET, "match runtime gone; dropping store result");
        }
    }
}
