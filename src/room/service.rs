use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::game::expiry::ExpiryMonitor;
use crate::session::{Apply, PlayerSlot, Role, SessionDocument, SessionRepository, SessionStatus};

use super::error::RoomError;
use super::validation::{validate_name, RoomCode};

const LOG_TARGET: &str = "rps_duel::room::service";

/// Result of creating or joining a room.
#[derive(Clone, Debug, PartialEq)]
pub struct RoomEntry {
    pub code: RoomCode,
    pub role: Role,
    pub display_name: String,
    pub opponent_name: Option<String>,
    pub document: SessionDocument,
}

/// Creates, joins and tears down rooms for one client.
#[derive(Clone)]
pub struct RoomLobby {
    repo: SessionRepository,
    expiry: ExpiryMonitor,
    client_id: Uuid,
}

impl RoomLobby {
    pub fn new(repo: SessionRepository, expiry: ExpiryMonitor, client_id: Uuid) -> Self {
        Self {
            repo,
            expiry,
            client_id,
        }
    }

    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    /// Seats the caller as A in a fresh session under `code`. An existing
    /// document is only replaced when it has finished or gone stale.
    pub async fn create_room(&self, name: &str, code: &str) -> Result<RoomEntry, RoomError> {
        let name = validate_name(name)?;
        let code = RoomCode::parse(code)?;
        let client_id = self.client_id;

        let document = self
            .repo
            .update(&code, |existing| {
                plan_create(existing, &code, &name, client_id, &self.expiry, Utc::now())
            })
            .await??;

        info!(target: LOG_TARGET, room = %code, player = %name, "room created");
        Ok(RoomEntry {
            code,
            role: Role::A,
            display_name: name,
            opponent_name: None,
            document,
        })
    }

    /// Seats the caller as B in a waiting session.
    pub async fn join_room(&self, name: &str, code: &str) -> Result<RoomEntry, RoomError> {
        let name = validate_name(name)?;
        let code = RoomCode::parse(code)?;
        let client_id = self.client_id;

        let document = self
            .repo
            .update(&code, |existing| {
                plan_join(existing, &code, &name, client_id, &self.expiry, Utc::now())
            })
            .await??;

        let opponent_name = document.player(Role::A).map(|p| p.display_name.clone());
        info!(
            target: LOG_TARGET,
            room = %code,
            player = %name,
            opponent = ?opponent_name,
            "joined room"
        );
        Ok(RoomEntry {
            code,
            role: Role::B,
            display_name: name,
            opponent_name,
            document,
        })
    }

    /// Removes the room document. Missing documents are not an error.
    pub async fn abandon(&self, code: &RoomCode) -> Result<(), RoomError> {
        if let Err(err) = self.repo.delete(code).await {
            warn!(target: LOG_TARGET, room = %code, error = %err, "failed to remove room");
            return Err(err.into());
        }
        info!(target: LOG_TARGET, room = %code, "room removed");
        Ok(())
    }
}

pub(super) fn plan_create(
    existing: Option<SessionDocument>,
    code: &RoomCode,
    name: &str,
    client_id: Uuid,
    expiry: &ExpiryMonitor,
    now: DateTime<Utc>,
) -> Apply<Result<SessionDocument, RoomError>> {
    if let Some(doc) = existing {
        let finished = doc.status == SessionStatus::GameOver;
        if !finished && !expiry.is_expired(doc.last_update_time, now) {
            return Apply::Skip(Err(RoomError::RoomActive(code.clone())));
        }
    }
    let doc = SessionDocument::new(code, PlayerSlot::new(name, client_id), now);
    Apply::Commit(doc.clone(), Ok(doc))
}

pub(super) fn plan_join(
    existing: Option<SessionDocument>,
    code: &RoomCode,
    name: &str,
    client_id: Uuid,
    expiry: &ExpiryMonitor,
    now: DateTime<Utc>,
) -> Apply<Result<SessionDocument, RoomError>> {
    let Some(mut doc) = existing else {
        return Apply::Skip(Err(RoomError::NotFound(code.clone())));
    };
    let open = doc.status == SessionStatus::Waiting && doc.players.b.is_none();
    if !open || expiry.is_expired(doc.last_update_time, now) {
        return Apply::Skip(Err(RoomError::NotJoinable(code.clone())));
    }
    doc.seat_guest(PlayerSlot::new(name, client_id), now);
    Apply::Commit(doc.clone(), Ok(doc))
}
