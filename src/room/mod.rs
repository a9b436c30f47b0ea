mod error;
mod service;
mod validation;

#[cfg(test)]
mod tests;

pub use error::RoomError;
pub use service::{RoomEntry, RoomLobby};
pub use validation::{validate_code, validate_name, RoomCode, ROOM_CODE_LEN};
