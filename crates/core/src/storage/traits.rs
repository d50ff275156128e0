//! Shared document store traits
//!
//! These traits define the store interface, allowing for different
//! implementations (in-memory, mock, hosted document database).
//!
//! Documents are addressed by room code (the room record) and by
//! `(room code, participant id)` (roster entries). Every call except
//! [`RoomDocuments::now`] is a round trip and may fail with
//! [`crate::Error::StoreUnavailable`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::error::Result;
use crate::models::{
    Participant, ParticipantId, ParticipantPatch, Room, RoomCode, RoomPatch, RoundToken,
};

/// Live view of a room record; `None` while the room does not exist
pub type RoomFeed = watch::Receiver<Option<Room>>;

/// Live view of a room's roster in join order
pub type RosterFeed = watch::Receiver<Vec<Participant>>;

/// Room record operations
#[async_trait]
pub trait RoomDocuments: Send + Sync {
    /// Server time used for activity stamps and staleness checks
    fn now(&self) -> DateTime<Utc>;

    /// Read a room record
    async fn get_room(&self, room: &RoomCode) -> Result<Option<Room>>;

    /// Create the room with `initial` unless it already exists.
    /// Returns whether this call created it.
    async fn insert_room_if_absent(&self, room: &RoomCode, initial: &Room) -> Result<bool>;

    /// Merge fields into the room record, creating it from defaults if absent
    async fn merge_room(&self, room: &RoomCode, patch: &RoomPatch) -> Result<()>;

    /// Set the leader only if it is currently `expected`.
    /// Returns whether the write happened.
    async fn compare_and_set_leader(
        &self,
        room: &RoomCode,
        expected: Option<ParticipantId>,
        new: Option<ParticipantId>,
    ) -> Result<bool>;

    /// Start round `next` (phase back to voting) only if the current round
    /// is still `expected`. Returns whether the write happened.
    async fn compare_and_set_round(
        &self,
        room: &RoomCode,
        expected: RoundToken,
        next: RoundToken,
    ) -> Result<bool>;
}

/// Roster operations
#[async_trait]
pub trait RosterDocuments: Send + Sync {
    /// All participants in join order
    async fn list_participants(&self, room: &RoomCode) -> Result<Vec<Participant>>;

    /// Read one participant
    async fn get_participant(&self, room: &RoomCode, id: ParticipantId) -> Result<Option<Participant>>;

    /// Merge fields into a participant record.
    ///
    /// An absent record is created only when the patch carries a display
    /// name; otherwise the call fails with `NotFound`.
    async fn merge_participant(
        &self,
        room: &RoomCode,
        id: ParticipantId,
        patch: &ParticipantPatch,
    ) -> Result<()>;

    /// Delete a participant. Deleting an absent record succeeds.
    async fn delete_participant(&self, room: &RoomCode, id: ParticipantId) -> Result<()>;
}

/// Change subscriptions
///
/// A new receiver holds the current value; every later change replaces it
/// with the full current state. Dropping the receiver unsubscribes.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe_room(&self, room: &RoomCode) -> Result<RoomFeed>;

    async fn subscribe_roster(&self, room: &RoomCode) -> Result<RosterFeed>;
}

/// Combined store interface
///
/// Provides access to all document operations.
/// Implementations may be in-memory, mocks, or a hosted database.
pub trait DocumentStore: RoomDocuments + RosterDocuments + ChangeFeed + Send + Sync {}

// Blanket implementation: any type implementing all traits implements DocumentStore
impl<T> DocumentStore for T where T: RoomDocuments + RosterDocuments + ChangeFeed + Send + Sync {}
