//! Phase controller: leader-gated reveal and reset
//!
//! Room state machine:
//!
//! ```text
//!   voting --reveal--> revealed
//!      ^                  |
//!      +------reset-------+   (reset from voting also clears votes)
//! ```
//!
//! A reset writes every participant's vote and then the room record. The
//! writes are separate documents, so a reader can briefly see the room back
//! in voting while some votes are not yet cleared. Clients key derived state
//! on the round token, which only changes with the final write. That write is
//! conditional on the round the reset started from, so two overlapping
//! resets move the room forward once.

use pokerroom_core::invariants::assert_round_advanced;
use pokerroom_core::{
    DocumentStore, Error, ParticipantId, ParticipantPatch, Phase, Result, Room, RoomCode,
    RoomPatch, RoundToken,
};
use tracing::{debug, info, warn};

/// Check that `actor` is the room's current leader and still seated.
///
/// Reads the room and roster from the store rather than trusting the
/// caller's view, so a leader evicted by another client's sweep is refused.
pub async fn authorize_leader<S: DocumentStore + ?Sized>(
    store: &S,
    room: &RoomCode,
    actor: Option<ParticipantId>,
) -> Result<Room> {
    let actor = actor.ok_or(Error::NotRegistered)?;
    let record = store
        .get_room(room)
        .await?
        .ok_or_else(|| Error::NotFound(format!("room {}", room)))?;

    if !record.is_leader(&actor) {
        return Err(Error::Unauthorized(format!(
            "participant {} is not the leader of room {}",
            actor, room
        )));
    }

    if store.get_participant(room, actor).await?.is_none() {
        warn!(room = %room, participant_id = %actor, "Rejected action from evicted leader");
        return Err(Error::Unauthorized(format!(
            "leader {} is no longer in room {}",
            actor, room
        )));
    }

    Ok(record)
}

/// Show the votes. Revealing an already revealed room is a no-op.
pub async fn reveal<S: DocumentStore + ?Sized>(
    store: &S,
    room: &RoomCode,
    actor: Option<ParticipantId>,
) -> Result<()> {
    let record = authorize_leader(store, room, actor).await?;
    if record.phase == Phase::Revealed {
        debug!(room = %room, "Room already revealed");
        return Ok(());
    }

    store.merge_room(room, &RoomPatch::reveal()).await?;
    info!(room = %room, round = %record.round, "Votes revealed");
    Ok(())
}

/// Clear every vote and start a new round. Returns the new round token.
///
/// Participants that disappear while the votes are being cleared are
/// skipped.
pub async fn reset_round<S: DocumentStore + ?Sized>(
    store: &S,
    room: &RoomCode,
    actor: Option<ParticipantId>,
) -> Result<RoundToken> {
    let record = authorize_leader(store, room, actor).await?;

    let roster = store.list_participants(room).await?;
    let mut cleared = 0usize;
    for participant in roster.iter().filter(|p| p.has_voted()) {
        let cleared_vote = store
            .merge_participant(room, participant.id, &ParticipantPatch::clear_vote())
            .await;
        match cleared_vote {
            Ok(()) => cleared += 1,
            Err(Error::NotFound(_)) => {
                debug!(room = %room, participant_id = %participant.id, "Participant left during reset");
            }
            Err(e) => return Err(e),
        }
    }

    let next = start_round(store, room, record.round).await?;

    info!(
        room = %room,
        previous_round = %record.round,
        round = %next,
        cleared,
        "Round reset"
    );
    Ok(next)
}

/// Move the room from round `previous` to a fresh round in voting.
///
/// The write lands only while the room is still on `previous`. If another
/// reset got there first, the round it started is returned instead.
pub async fn start_round<S: DocumentStore + ?Sized>(
    store: &S,
    room: &RoomCode,
    previous: RoundToken,
) -> Result<RoundToken> {
    let next = previous.next_after(store.now());
    assert_round_advanced(previous, next);
    if store.compare_and_set_round(room, previous, next).await? {
        return Ok(next);
    }

    let current = store
        .get_room(room)
        .await?
        .ok_or_else(|| Error::NotFound(format!("room {}", room)))?;
    debug!(
        room = %room,
        expected = %previous,
        current = %current.round,
        "Round already advanced by another reset"
    );
    Ok(current.round)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::ensure_room;
    use crate::ledger::cast_vote;
    use crate::membership::{join, leave};
    use pokerroom_core::{Deck, MemoryStore, Participant, RoomDocuments, RosterDocuments};

    struct Table {
        store: MemoryStore,
        room: RoomCode,
        alice: ParticipantId,
        bob: ParticipantId,
    }

    async fn table() -> Table {
        let store = MemoryStore::new();
        let room = RoomCode::parse("ABC123").unwrap();
        ensure_room(&store, &room).await.unwrap();
        let alice = join(&store, &room, "Alice").await.unwrap().participant.id;
        let bob = join(&store, &room, "Bob").await.unwrap().participant.id;
        Table {
            store,
            room,
            alice,
            bob,
        }
    }

    impl Table {
        async fn record(&self) -> Room {
            self.store.get_room(&self.room).await.unwrap().unwrap()
        }

        async fn vote(&self, id: ParticipantId, value: &str) {
            let phase = self.record().await.phase;
            cast_vote(&self.store, &Deck::default(), &self.room, Some(id), phase, value)
                .await
                .unwrap();
        }

        async fn participant(&self, id: ParticipantId) -> Participant {
            self.store
                .get_participant(&self.room, id)
                .await
                .unwrap()
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_leader_reveals() {
        let t = table().await;
        t.vote(t.alice, "5").await;
        reveal(&t.store, &t.room, Some(t.alice)).await.unwrap();

        let record = t.record().await;
        assert_eq!(record.phase, Phase::Revealed);
        assert_eq!(record.round, RoundToken::INITIAL);
        let alice = t.participant(t.alice).await;
        assert!(alice.has_voted());
    }

    #[tokio::test]
    async fn test_reveal_twice_is_noop() {
        let t = table().await;
        reveal(&t.store, &t.room, Some(t.alice)).await.unwrap();
        reveal(&t.store, &t.room, Some(t.alice)).await.unwrap();
        assert_eq!(t.record().await.phase, Phase::Revealed);
    }

    #[tokio::test]
    async fn test_non_leader_rejected() {
        let t = table().await;
        assert!(matches!(
            reveal(&t.store, &t.room, Some(t.bob)).await,
            Err(Error::Unauthorized(_))
        ));
        assert!(matches!(
            reset_round(&t.store, &t.room, Some(t.bob)).await,
            Err(Error::Unauthorized(_))
        ));
        assert_eq!(t.record().await.phase, Phase::Voting);
    }

    #[tokio::test]
    async fn test_unregistered_rejected() {
        let t = table().await;
        assert!(matches!(
            reveal(&t.store, &t.room, None).await,
            Err(Error::NotRegistered)
        ));
    }

    #[tokio::test]
    async fn test_ghost_leader_rejected() {
        let t = table().await;
        leave(&t.store, &t.room, t.alice).await.unwrap();
        // Leader id still points at Alice until a sweep repairs it
        assert_eq!(t.record().await.leader_id, Some(t.alice));
        assert!(matches!(
            reveal(&t.store, &t.room, Some(t.alice)).await,
            Err(Error::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_reset_clears_votes_and_advances_round() {
        let t = table().await;
        t.vote(t.alice, "5").await;
        t.vote(t.bob, "8").await;
        reveal(&t.store, &t.room, Some(t.alice)).await.unwrap();

        let next = reset_round(&t.store, &t.room, Some(t.alice)).await.unwrap();
        let record = t.record().await;
        assert_eq!(record.phase, Phase::Voting);
        assert_eq!(record.round, next);
        assert!(next > RoundToken::INITIAL);

        for p in t.store.list_participants(&t.room).await.unwrap() {
            assert!(p.vote.is_none(), "{} kept a vote", p.display_name);
        }
    }

    #[tokio::test]
    async fn test_reset_from_voting_clears_votes() {
        let t = table().await;
        t.vote(t.bob, "13").await;
        let first = reset_round(&t.store, &t.room, Some(t.alice)).await.unwrap();
        let second = reset_round(&t.store, &t.room, Some(t.alice)).await.unwrap();

        assert!(second > first);
        let bob = t.participant(t.bob).await;
        assert!(bob.vote.is_none());
    }

    #[tokio::test]
    async fn test_vote_again_after_reset() {
        let t = table().await;
        t.vote(t.bob, "3").await;
        reveal(&t.store, &t.room, Some(t.alice)).await.unwrap();
        reset_round(&t.store, &t.room, Some(t.alice)).await.unwrap();

        t.vote(t.bob, "21").await;
        let bob = t.participant(t.bob).await;
        assert_eq!(bob.vote.map(|v| v.to_string()), Some("21".to_string()));
    }

    #[tokio::test]
    async fn test_reset_from_stale_round_does_not_regress() {
        let t = table().await;
        reveal(&t.store, &t.room, Some(t.alice)).await.unwrap();
        let current = reset_round(&t.store, &t.room, Some(t.alice)).await.unwrap();
        reveal(&t.store, &t.room, Some(t.alice)).await.unwrap();

        // A second reset that read the room before the first one landed
        let started = start_round(&t.store, &t.room, RoundToken::INITIAL)
            .await
            .unwrap();
        assert_eq!(started, current);
        let record = t.record().await;
        assert_eq!(record.round, current);
        assert_eq!(record.phase, Phase::Revealed);
    }

    #[tokio::test]
    async fn test_start_round_from_current() {
        let t = table().await;
        reveal(&t.store, &t.room, Some(t.alice)).await.unwrap();

        let next = start_round(&t.store, &t.room, RoundToken::INITIAL)
            .await
            .unwrap();
        assert!(next > RoundToken::INITIAL);
        let record = t.record().await;
        assert_eq!(record.round, next);
        assert_eq!(record.phase, Phase::Voting);
    }
}
