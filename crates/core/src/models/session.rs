//! Client session context for resuming a seat

use serde::{Deserialize, Serialize};

use super::{ParticipantId, RoomCode, SessionToken};
use crate::error::Result;

/// Everything a client needs to reclaim its seat after reconnecting.
///
/// Passed around explicitly; the client may persist it however it likes
/// (see [`SessionContext::to_json`]), but it is only a hint and is validated
/// against the room on every resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub room: RoomCode,
    pub participant_id: ParticipantId,
    pub display_name: String,
    pub token: SessionToken,
}

impl SessionContext {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
