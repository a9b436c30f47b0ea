use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::MatchConfig;
use crate::engine::Move;
use crate::game::expiry::ExpiryMonitor;
use crate::game::machine::{Command, MatchMachine};
use crate::game::presentation::MatchSnapshot;
use crate::room::{RoomEntry, RoomError, RoomLobby};
use crate::session::SessionRepository;
use crate::store::DocumentStore;
use crate::tokio_tools::spawn_named_task;

use super::runtime::{MatchRuntime, Request, RoomReply};
use super::worker::StoreWorker;

const LOG_TARGET: &str = "rps_duel::game::coordinator";
const REQUEST_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error(transparent)]
    Room(#[from] RoomError),
    #[error("match coordinator has stopped")]
    Stopped,
    #[error("match task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Handle to one client's match. Commands are queued to a background runtime;
/// state comes back as [`MatchSnapshot`]s on a watch channel.
pub struct MatchCoordinator {
    requests: mpsc::Sender<Request>,
    snapshots: watch::Receiver<MatchSnapshot>,
    client_id: Uuid,
    stop: CancellationToken,
    runtime_handle: Option<JoinHandle<()>>,
    worker_handle: Option<JoinHandle<()>>,
}

impl MatchCoordinator {
    /// Starts the runtime on the current Tokio runtime.
    pub fn spawn(config: MatchConfig, store: Arc<dyn DocumentStore>) -> Self {
        let client_id = Uuid::new_v4();
        let repo = SessionRepository::new(store, config.retry);
        let lobby = RoomLobby::new(
            repo.clone(),
            ExpiryMonitor::new(config.session_ttl),
            client_id,
        );
        let machine = MatchMachine::new(&config);

        let (requests_tx, requests_rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (snapshots_tx, snapshots_rx) = watch::channel(machine.snapshot());
        let stop = CancellationToken::new();

        let worker = StoreWorker::new(repo.clone(), lobby.clone(), events_tx.clone());
        let worker_handle = spawn_named_task("match-store-worker", worker.run(jobs_rx));

        let runtime = MatchRuntime::new(
            machine,
            config,
            lobby,
            repo,
            events_tx,
            jobs_tx,
            snapshots_tx,
            stop.clone(),
        );
        let runtime_handle =
            spawn_named_task("match-runtime", runtime.run(requests_rx, events_rx));

        Self {
            requests: requests_tx,
            snapshots: snapshots_rx,
            client_id,
            stop,
            runtime_handle: Some(runtime_handle),
            worker_handle: Some(worker_handle),
        }
    }

    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    pub async fn create_room(&self, name: &str, code: &str) -> Result<RoomEntry, MatchError> {
        self.room_request(|reply| Request::Create {
            name: name.to_string(),
            code: code.to_string(),
            reply,
        })
        .await
    }

    pub async fn join_room(&self, name: &str, code: &str) -> Result<RoomEntry, MatchError> {
        self.room_request(|reply| Request::Join {
            name: name.to_string(),
            code: code.to_string(),
            reply,
        })
        .await
    }

    async fn room_request(
        &self,
        request: impl FnOnce(RoomReply) -> Request,
    ) -> Result<RoomEntry, MatchError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests
            .send(request(reply_tx))
            .await
            .map_err(|_| MatchError::Stopped)?;
        let entry = reply_rx.await.map_err(|_| MatchError::Stopped)??;
        Ok(entry)
    }

    pub async fn select_move(&self, choice: Move) -> Result<(), MatchError> {
        self.command(Command::SelectMove(choice)).await
    }

    pub async fn set_message(&self, text: impl Into<String>) -> Result<(), MatchError> {
        self.command(Command::SetMessage(text.into())).await
    }

    pub async fn confirm(&self) -> Result<(), MatchError> {
        self.command(Command::Confirm).await
    }

    pub async fn request_next_round(&self) -> Result<(), MatchError> {
        self.command(Command::RequestNextRound).await
    }

    pub async fn leave_and_reset(&self) -> Result<(), MatchError> {
        self.command(Command::LeaveAndReset).await
    }

    async fn command(&self, command: Command) -> Result<(), MatchError> {
        self.requests
            .send(Request::Command(command))
            .await
            .map_err(|_| MatchError::Stopped)
    }

    /// Latest published state.
    pub fn snapshot(&self) -> MatchSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MatchSnapshot> {
        self.snapshots.clone()
    }

    /// Resolves with the first snapshot, current one included, that matches.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&MatchSnapshot) -> bool,
    ) -> Result<MatchSnapshot, MatchError> {
        let mut rx = self.snapshots.clone();
        let snapshot = rx.wait_for(predicate).await.map_err(|_| MatchError::Stopped)?;
        Ok(snapshot.clone())
    }

    /// Stops after every request queued so far has been handled and pending
    /// store writes have drained.
    pub async fn shutdown(mut self) -> Result<(), MatchError> {
        if self.requests.send(Request::Shutdown).await.is_err() {
            warn!(target: LOG_TARGET, "match runtime already stopped");
        }
        if let Some(handle) = self.runtime_handle.take() {
            handle.await?;
        }
        if let Some(handle) = self.worker_handle.take() {
            handle.await?;
        }
        self.stop.cancel();
        info!(target: LOG_TARGET, client = %self.client_id, "match coordinator shut down");
        Ok(())
    }
}

impl Drop for MatchCoordinator {
    fn drop(&mut self) {
        self.stop.cancel();
        if let Some(handle) = self.runtime_handle.take() {
            handle.abort();
        }
        if let Some(handle) = self.worker_handle.take() {
            handle.abort();
        }
    }
}
