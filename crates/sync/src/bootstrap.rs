//! Session bootstrap: make sure a room record exists before use

use pokerroom_core::invariants::assert_room_invariants;
use pokerroom_core::{DocumentStore, Error, Result, Room, RoomCode};
use tracing::{debug, info};

/// Ensure the room exists, creating it with default state if absent.
///
/// Safe to race: creation is conditional, so a late bootstrap never
/// overwrites a room that another client already created and changed.
/// Returns the room as it stands afterwards.
pub async fn ensure_room<S: DocumentStore + ?Sized>(store: &S, room: &RoomCode) -> Result<Room> {
    if let Some(existing) = store.get_room(room).await? {
        debug!(room = %room, "Room already exists");
        assert_room_invariants(&existing);
        return Ok(existing);
    }

    if store.insert_room_if_absent(room, &Room::default()).await? {
        info!(room = %room, "Room created");
    } else {
        debug!(room = %room, "Room created concurrently by another client");
    }

    store
        .get_room(room)
        .await?
        .ok_or_else(|| Error::NotFound(format!("room {}", room)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pokerroom_core::{MemoryStore, ParticipantId, Phase, RoomDocuments, RoomPatch, RoundToken};
    use std::sync::Arc;

    fn code() -> RoomCode {
        RoomCode::parse("ABC123").unwrap()
    }

    #[tokio::test]
    async fn test_fresh_room_defaults() {
        let store = MemoryStore::new();
        let room = ensure_room(&store, &code()).await.unwrap();
        assert_eq!(room.phase, Phase::Voting);
        assert!(room.leader_id.is_none());
        assert_eq!(room.round, RoundToken::INITIAL);
    }

    #[tokio::test]
    async fn test_existing_room_untouched() {
        let store = MemoryStore::new();
        ensure_room(&store, &code()).await.unwrap();

        let leader = ParticipantId::new();
        store
            .merge_room(
                &code(),
                &RoomPatch {
                    phase: Some(Phase::Revealed),
                    leader_id: Some(Some(leader)),
                    round: Some(RoundToken::new(42)),
                },
            )
            .await
            .unwrap();

        let room = ensure_room(&store, &code()).await.unwrap();
        assert_eq!(room.phase, Phase::Revealed);
        assert_eq!(room.leader_id, Some(leader));
        assert_eq!(room.round, RoundToken::new(42));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_bootstraps_agree() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { ensure_room(store.as_ref(), &code()).await.unwrap() })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Room::default());
        }
    }

    #[tokio::test]
    async fn test_store_down() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert!(matches!(
            ensure_room(&store, &code()).await,
            Err(Error::StoreUnavailable(_))
        ));
    }
}
