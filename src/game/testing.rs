use chrono::Utc;
use uuid::Uuid;

use crate::room::RoomCode;
use crate::session::{PlayerSlot, SessionDocument};

/// Round 1 of a freshly joined AB12 session, both players at full health.
pub(crate) fn playing_document() -> SessionDocument {
    let now = Utc::now();
    let code = RoomCode::parse("AB12").expect("valid code");
    let mut doc = SessionDocument::new(&code, PlayerSlot::new("Ann", Uuid::new_v4()), now);
    doc.seat_guest(PlayerSlot::new("Bo", Uuid::new_v4()), now);
    doc
}
