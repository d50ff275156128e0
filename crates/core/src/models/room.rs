//! Room model - the shared session record

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::ParticipantId;
use crate::error::{Error, Result};

/// Length of a room code
pub const ROOM_CODE_LEN: usize = 6;

const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Client-generated room code: 6 uppercase alphanumeric characters.
///
/// Uniqueness is not checked anywhere; two independently generated codes
/// may collide.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Generate a fresh random code
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let code = (0..ROOM_CODE_LEN)
            .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Parse user input. Surrounding whitespace is trimmed and letters are
    /// uppercased before validation.
    pub fn parse(input: &str) -> Result<Self> {
        let code = input.trim().to_ascii_uppercase();
        if code.len() != ROOM_CODE_LEN || !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(Error::InvalidRoomCode(input.to_string()));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for RoomCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

/// Room lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Votes are hidden and may still change
    #[default]
    Voting,
    /// Votes are visible and locked
    Revealed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Voting => "voting",
            Phase::Revealed => "revealed",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque round epoch. Replaced on every reset, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoundToken(u64);

impl RoundToken {
    /// Token of a freshly bootstrapped room
    pub const INITIAL: RoundToken = RoundToken(1);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// The token that follows `self`: the server time in milliseconds when it
    /// is ahead of the current token, otherwise the current token plus one.
    /// Always strictly greater than `self`.
    pub fn next_after(self, now: DateTime<Utc>) -> Self {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        Self(millis.max(self.0.saturating_add(1)))
    }
}

impl Default for RoundToken {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl std::fmt::Display for RoundToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The room document: phase, leader and round epoch
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Room {
    pub phase: Phase,
    /// May dangle briefly after the leader's record is evicted
    pub leader_id: Option<ParticipantId>,
    pub round: RoundToken,
}

impl Room {
    pub fn is_leader(&self, participant_id: &ParticipantId) -> bool {
        self.leader_id.as_ref() == Some(participant_id)
    }
}

/// Partial update merged into a room document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomPatch {
    pub phase: Option<Phase>,
    /// `Some(None)` clears the leader
    pub leader_id: Option<Option<ParticipantId>>,
    pub round: Option<RoundToken>,
}

impl RoomPatch {
    pub fn reveal() -> Self {
        Self {
            phase: Some(Phase::Revealed),
            ..Default::default()
        }
    }

    /// Back to voting under a fresh round token
    pub fn new_round(round: RoundToken) -> Self {
        Self {
            phase: Some(Phase::Voting),
            round: Some(round),
            ..Default::default()
        }
    }

    /// Merge the present fields into `room`
    pub fn apply(&self, room: &mut Room) {
        if let Some(phase) = self.phase {
            room.phase = phase;
        }
        if let Some(leader_id) = &self.leader_id {
            room.leader_id = *leader_id;
        }
        if let Some(round) = self.round {
            room.round = round;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generated_code_shape() {
        for _ in 0..50 {
            let code = RoomCode::generate();
            assert_eq!(code.as_str().len(), ROOM_CODE_LEN);
            assert!(code
                .as_str()
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
        }
    }

    #[test]
    fn test_parse_normalizes_input() {
        let code = RoomCode::parse("  abc123 ").unwrap();
        assert_eq!(code.as_str(), "ABC123");
    }

    #[test]
    fn test_parse_rejects_bad_codes() {
        assert!(RoomCode::parse("ABC12").is_err());
        assert!(RoomCode::parse("ABC1234").is_err());
        assert!(RoomCode::parse("ABC-12").is_err());
        assert!(RoomCode::parse("").is_err());
    }

    #[test]
    fn test_default_room() {
        let room = Room::default();
        assert_eq!(room.phase, Phase::Voting);
        assert!(room.leader_id.is_none());
        assert_eq!(room.round, RoundToken::INITIAL);
    }

    #[test]
    fn test_round_token_strictly_advances() {
        let epoch = Utc.timestamp_millis_opt(0).unwrap();
        assert_eq!(RoundToken::INITIAL.next_after(epoch), RoundToken::new(2));

        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let next = RoundToken::INITIAL.next_after(now);
        assert_eq!(next.value(), 1_700_000_000_000);

        // A second reset within the same millisecond still advances
        assert!(next.next_after(now) > next);
    }

    #[test]
    fn test_patch_apply() {
        let mut room = Room::default();
        let leader = ParticipantId::new();

        RoomPatch {
            leader_id: Some(Some(leader)),
            ..Default::default()
        }
        .apply(&mut room);
        RoomPatch::reveal().apply(&mut room);
        assert_eq!(room.phase, Phase::Revealed);
        assert!(room.is_leader(&leader));

        RoomPatch::new_round(RoundToken::new(9)).apply(&mut room);
        assert_eq!(room.phase, Phase::Voting);
        assert_eq!(room.round.value(), 9);
        // Leader untouched by a patch that does not name it
        assert!(room.is_leader(&leader));
    }

    #[test]
    fn test_phase_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Phase::Revealed).unwrap(), "\"revealed\"");
    }
}
