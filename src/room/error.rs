use crate::store::StoreError;

use super::validation::{RoomCode, ROOM_CODE_LEN};

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("display name must not be empty")]
    InvalidName,
    #[error("room code must be exactly {ROOM_CODE_LEN} characters")]
    InvalidCode,
    #[error("room {0} already has an active session")]
    RoomActive(RoomCode),
    #[error("room {0} not found")]
    NotFound(RoomCode),
    #[error("room {0} is not open for joining")]
    NotJoinable(RoomCode),
    #[error("already seated in a session")]
    AlreadyInSession,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl RoomError {
    /// Errors caused by what the user typed, as opposed to room state.
    pub fn is_input_error(&self) -> bool {
        matches!(self, RoomError::InvalidName | RoomError::InvalidCode)
    }
}
