//! In-process document store
//!
//! Holds every room behind one mutex and pushes changes through tokio
//! `watch` channels. Several clients sharing one `Arc<MemoryStore>` behave
//! like independent processes sharing a hosted store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, instrument};

use super::clock::{Clock, SystemClock};
use super::traits::{ChangeFeed, RoomDocuments, RoomFeed, RosterDocuments, RosterFeed};
use crate::error::{Error, Result};
use crate::models::{
    Participant, ParticipantId, ParticipantPatch, Room, RoomCode, RoomPatch, RoundToken,
};

/// Documents and change senders for one room code
struct RoomEntry {
    room: Option<Room>,
    roster: Vec<Participant>,
    room_tx: watch::Sender<Option<Room>>,
    roster_tx: watch::Sender<Vec<Participant>>,
}

impl RoomEntry {
    fn new() -> Self {
        let (room_tx, _) = watch::channel(None);
        let (roster_tx, _) = watch::channel(Vec::new());
        Self {
            room: None,
            roster: Vec::new(),
            room_tx,
            roster_tx,
        }
    }

    fn publish_room(&self) {
        let current = self.room.clone();
        self.room_tx.send_if_modified(|seen| {
            if *seen != current {
                *seen = current;
                true
            } else {
                false
            }
        });
    }

    fn publish_roster(&self) {
        let current = self.roster.clone();
        self.roster_tx.send_if_modified(|seen| {
            if *seen != current {
                *seen = current;
                true
            } else {
                false
            }
        });
    }
}

/// Shared in-memory store
pub struct MemoryStore {
    rooms: Mutex<HashMap<RoomCode, RoomEntry>>,
    clock: Arc<dyn Clock>,
    available: AtomicBool,
}

impl MemoryStore {
    /// Store stamped with wall-clock time
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Store stamped by `clock` (use a `ManualClock` in tests)
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            clock,
            available: AtomicBool::new(true),
        }
    }

    /// Simulate losing or regaining the connection to the store
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
        debug!(available, "Memory store availability changed");
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::StoreUnavailable("memory store is offline".into()))
        }
    }

    fn rooms(&self) -> Result<MutexGuard<'_, HashMap<RoomCode, RoomEntry>>> {
        self.check_available()?;
        Ok(self.rooms.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoomDocuments for MemoryStore {
    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn get_room(&self, room: &RoomCode) -> Result<Option<Room>> {
        let rooms = self.rooms()?;
        Ok(rooms.get(room).and_then(|entry| entry.room.clone()))
    }

    #[instrument(skip(self, initial), fields(room = %room))]
    async fn insert_room_if_absent(&self, room: &RoomCode, initial: &Room) -> Result<bool> {
        let mut rooms = self.rooms()?;
        let entry = rooms.entry(room.clone()).or_insert_with(RoomEntry::new);
        if entry.room.is_some() {
            return Ok(false);
        }
        entry.room = Some(initial.clone());
        entry.publish_room();
        debug!("Room created");
        Ok(true)
    }

    async fn merge_room(&self, room: &RoomCode, patch: &RoomPatch) -> Result<()> {
        let mut rooms = self.rooms()?;
        let entry = rooms.entry(room.clone()).or_insert_with(RoomEntry::new);
        let record = entry.room.get_or_insert_with(Room::default);
        patch.apply(record);
        entry.publish_room();
        Ok(())
    }

    async fn compare_and_set_leader(
        &self,
        room: &RoomCode,
        expected: Option<ParticipantId>,
        new: Option<ParticipantId>,
    ) -> Result<bool> {
        let mut rooms = self.rooms()?;
        let entry = rooms
            .get_mut(room)
            .ok_or_else(|| Error::NotFound(format!("room {}", room)))?;
        let record = entry
            .room
            .as_mut()
            .ok_or_else(|| Error::NotFound(format!("room {}", room)))?;

        if record.leader_id != expected {
            return Ok(false);
        }
        record.leader_id = new;
        entry.publish_room();
        Ok(true)
    }

    async fn compare_and_set_round(
        &self,
        room: &RoomCode,
        expected: RoundToken,
        next: RoundToken,
    ) -> Result<bool> {
        let mut rooms = self.rooms()?;
        let entry = rooms
            .get_mut(room)
            .ok_or_else(|| Error::NotFound(format!("room {}", room)))?;
        let record = entry
            .room
            .as_mut()
            .ok_or_else(|| Error::NotFound(format!("room {}", room)))?;

        if record.round != expected {
            return Ok(false);
        }
        RoomPatch::new_round(next).apply(record);
        entry.publish_room();
        Ok(true)
    }
}

#[async_trait]
impl RosterDocuments for MemoryStore {
    async fn list_participants(&self, room: &RoomCode) -> Result<Vec<Participant>> {
        let rooms = self.rooms()?;
        Ok(rooms
            .get(room)
            .map(|entry| entry.roster.clone())
            .unwrap_or_default())
    }

    async fn get_participant(&self, room: &RoomCode, id: ParticipantId) -> Result<Option<Participant>> {
        let rooms = self.rooms()?;
        Ok(rooms
            .get(room)
            .and_then(|entry| entry.roster.iter().find(|p| p.id == id).cloned()))
    }

    async fn merge_participant(
        &self,
        room: &RoomCode,
        id: ParticipantId,
        patch: &ParticipantPatch,
    ) -> Result<()> {
        let now = self.clock.now();
        let mut rooms = self.rooms()?;
        let entry = rooms.entry(room.clone()).or_insert_with(RoomEntry::new);

        match entry.roster.iter_mut().find(|p| p.id == id) {
            Some(participant) => patch.apply(participant, now),
            None => {
                let participant = patch
                    .create(id, now)
                    .ok_or_else(|| Error::NotFound(format!("participant {} in room {}", id, room)))?;
                entry.roster.push(participant);
            }
        }
        entry.publish_roster();
        Ok(())
    }

    async fn delete_participant(&self, room: &RoomCode, id: ParticipantId) -> Result<()> {
        let mut rooms = self.rooms()?;
        if let Some(entry) = rooms.get_mut(room) {
            let before = entry.roster.len();
            entry.roster.retain(|p| p.id != id);
            if entry.roster.len() != before {
                entry.publish_roster();
                debug!(room = %room, participant_id = %id, "Participant deleted");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ChangeFeed for MemoryStore {
    async fn subscribe_room(&self, room: &RoomCode) -> Result<RoomFeed> {
        let mut rooms = self.rooms()?;
        let entry = rooms.entry(room.clone()).or_insert_with(RoomEntry::new);
        Ok(entry.room_tx.subscribe())
    }

    async fn subscribe_roster(&self, room: &RoomCode) -> Result<RosterFeed> {
        let mut rooms = self.rooms()?;
        let entry = rooms.entry(room.clone()).or_insert_with(RoomEntry::new);
        Ok(entry.roster_tx.subscribe())
    }
}
