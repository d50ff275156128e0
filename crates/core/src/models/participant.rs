//! Participant model - one roster entry in a room

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Vote;
use crate::error::{Error, Result};

/// Generated participant identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub Uuid);

impl ParticipantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resumption secret issued on join
///
/// Only the client holds the token itself. The roster keeps a
/// [`TokenHash`], so anyone reading the room cannot take over a seat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Salted argon2id hash for storing on the roster
    pub fn hash(&self) -> Result<TokenHash> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = token_hasher()?
            .hash_password(self.0.as_bytes(), &salt)
            .map_err(|e| Error::Credential(e.to_string()))?;
        Ok(TokenHash(hash.to_string()))
    }
}

// Tokens are 128 random bits, not passwords; the minimum cost is enough
fn token_hasher() -> Result<Argon2<'static>> {
    let params = Params::new(
        Params::MIN_M_COST,
        Params::MIN_T_COST,
        Params::MIN_P_COST,
        None,
    )
    .map_err(|e| Error::Credential(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// PHC string of a hashed [`SessionToken`]; empty when no token was issued
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenHash(String);

impl TokenHash {
    /// Check a presented token. An empty or malformed hash matches nothing.
    pub fn verify(&self, token: &SessionToken) -> bool {
        let Ok(parsed) = PasswordHash::new(&self.0) else {
            return false;
        };
        Argon2::default()
            .verify_password(token.as_str().as_bytes(), &parsed)
            .is_ok()
    }
}

impl From<String> for SessionToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A participant document in a room's roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    /// `None` until a card is cast this round
    pub vote: Option<Vote>,
    /// Server time of the last heartbeat or vote
    pub last_activity: DateTime<Utc>,
    pub joined_at: DateTime<Utc>,
    #[serde(default)]
    pub token_hash: TokenHash,
}

impl Participant {
    pub fn has_voted(&self) -> bool {
        self.vote.is_some()
    }

    /// Time since the last activity, clamped at zero
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        let idle = now.signed_duration_since(self.last_activity);
        if idle < Duration::zero() {
            Duration::zero()
        } else {
            idle
        }
    }

    /// Idle strictly longer than `threshold`
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.idle_for(now) > threshold
    }
}

/// Partial update merged into a participant document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticipantPatch {
    pub display_name: Option<String>,
    pub token_hash: Option<TokenHash>,
    /// `Some(None)` clears the vote
    pub vote: Option<Option<Vote>>,
    /// Stamp `last_activity` with the store's clock
    pub touch_activity: bool,
}

impl ParticipantPatch {
    /// Full record for a new participant
    pub fn register(display_name: impl Into<String>) -> Self {
        Self {
            display_name: Some(display_name.into()),
            vote: Some(None),
            touch_activity: true,
            ..Default::default()
        }
    }

    /// Replace the stored resumption hash
    pub fn with_token(mut self, token_hash: TokenHash) -> Self {
        self.token_hash = Some(token_hash);
        self
    }

    pub fn heartbeat() -> Self {
        Self {
            touch_activity: true,
            ..Default::default()
        }
    }

    /// Casting a vote also counts as activity
    pub fn cast(vote: Vote) -> Self {
        Self {
            vote: Some(Some(vote)),
            touch_activity: true,
            ..Default::default()
        }
    }

    pub fn clear_vote() -> Self {
        Self {
            vote: Some(None),
            ..Default::default()
        }
    }

    /// Whether the patch carries enough to create a record from nothing
    pub fn can_create(&self) -> bool {
        self.display_name.is_some()
    }

    /// Merge the present fields into `participant`
    pub fn apply(&self, participant: &mut Participant, now: DateTime<Utc>) {
        if let Some(name) = &self.display_name {
            participant.display_name = name.clone();
        }
        if let Some(token_hash) = &self.token_hash {
            participant.token_hash = token_hash.clone();
        }
        if let Some(vote) = &self.vote {
            participant.vote = vote.clone();
        }
        if self.touch_activity {
            participant.last_activity = now;
        }
    }

    /// Build a new record, or `None` when the patch has no display name
    pub fn create(&self, id: ParticipantId, now: DateTime<Utc>) -> Option<Participant> {
        let display_name = self.display_name.clone()?;
        let mut participant = Participant {
            id,
            display_name,
            vote: None,
            last_activity: now,
            joined_at: now,
            token_hash: TokenHash::default(),
        };
        self.apply(&mut participant, now);
        Some(participant)
    }
}
