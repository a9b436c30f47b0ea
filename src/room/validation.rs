use std::fmt;

use super::error::RoomError;

pub const ROOM_CODE_LEN: usize = 4;

/// True when `code` is exactly [`ROOM_CODE_LEN`] characters.
pub fn validate_code(code: &str) -> bool {
    code.chars().count() == ROOM_CODE_LEN
}

/// Trims the name and rejects it when nothing is left.
pub fn validate_name(name: &str) -> Result<String, RoomError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(RoomError::InvalidName);
    }
    Ok(trimmed.to_string())
}

/// Validated, upper-cased room code.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RoomCode(String);

impl RoomCode {
    pub fn parse(raw: &str) -> Result<Self, RoomError> {
        let normalized = raw.to_uppercase();
        if !validate_code(raw) || !validate_code(&normalized) {
            return Err(RoomError::InvalidCode);
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for RoomCode {
    type Err = RoomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
