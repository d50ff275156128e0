//! Joining, resuming and leaving a room's roster

use pokerroom_core::election::{self, ElectionResult};
use pokerroom_core::{
    DocumentStore, Error, Participant, ParticipantId, ParticipantPatch, Result, Room, RoomCode,
    SessionContext, SessionToken,
};
use tracing::{debug, info, warn};

/// Outcome of a join
#[derive(Debug, Clone)]
pub struct Joined {
    pub context: SessionContext,
    pub participant: Participant,
    /// Reattached to an existing record with the same display name
    pub reattached: bool,
    /// This join installed the participant as room leader
    pub became_leader: bool,
}

/// Join `room` as `display_name`.
///
/// If a participant with exactly that (trimmed) name is already seated, the
/// caller takes over that record instead of creating a new one. That path is
/// the degraded recovery route for clients that lost their
/// [`SessionContext`]; prefer [`resume`]. Taking over issues a new token,
/// so any earlier context for the seat stops resuming.
pub async fn join<S: DocumentStore + ?Sized>(
    store: &S,
    room: &RoomCode,
    display_name: &str,
) -> Result<Joined> {
    let name = display_name.trim();
    if name.is_empty() {
        return Err(Error::InvalidName("display name must not be blank".into()));
    }

    let record = store
        .get_room(room)
        .await?
        .ok_or_else(|| Error::NotFound(format!("room {}", room)))?;

    let token = SessionToken::generate();
    let token_hash = token.hash()?;

    let roster = store.list_participants(room).await?;
    if let Some(existing) = roster.into_iter().find(|p| p.display_name == name) {
        warn!(
            room = %room,
            participant_id = %existing.id,
            "Reattaching to existing participant by display name"
        );
        let patch = ParticipantPatch::heartbeat().with_token(token_hash);
        store.merge_participant(room, existing.id, &patch).await?;
        let participant = refreshed(store, room, existing.id).await?;
        return Ok(Joined {
            context: context_for(room, &participant, token),
            participant,
            reattached: true,
            became_leader: false,
        });
    }

    let id = ParticipantId::new();
    let patch = ParticipantPatch::register(name).with_token(token_hash);
    store.merge_participant(room, id, &patch).await?;
    info!(room = %room, participant_id = %id, "Participant joined");

    let became_leader = claim_if_leaderless(store, room, &record, id).await?;
    let participant = refreshed(store, room, id).await?;

    Ok(Joined {
        context: context_for(room, &participant, token),
        participant,
        reattached: false,
        became_leader,
    })
}

/// Reclaim a seat with a context from an earlier join.
///
/// Fails with `NotFound` when the record has been evicted or removed and
/// with `Unauthorized` when the token does not match the record.
pub async fn resume<S: DocumentStore + ?Sized>(
    store: &S,
    context: &SessionContext,
) -> Result<Participant> {
    let room = &context.room;
    let existing = store
        .get_participant(room, context.participant_id)
        .await?
        .ok_or_else(|| {
            Error::NotFound(format!(
                "participant {} in room {}",
                context.participant_id, room
            ))
        })?;

    if !existing.token_hash.verify(&context.token) {
        return Err(Error::Unauthorized(format!(
            "session token does not match participant {}",
            existing.id
        )));
    }

    store
        .merge_participant(room, existing.id, &ParticipantPatch::heartbeat())
        .await?;
    info!(room = %room, participant_id = %existing.id, "Participant resumed");
    refreshed(store, room, existing.id).await
}

/// Remove a participant explicitly
pub async fn leave<S: DocumentStore + ?Sized>(
    store: &S,
    room: &RoomCode,
    id: ParticipantId,
) -> Result<()> {
    store.delete_participant(room, id).await?;
    info!(room = %room, participant_id = %id, "Participant left");
    Ok(())
}

/// Install `id` as leader if the room had none when `record` was read.
/// Returns whether it won.
async fn claim_if_leaderless<S: DocumentStore + ?Sized>(
    store: &S,
    room: &RoomCode,
    record: &Room,
    id: ParticipantId,
) -> Result<bool> {
    match election::on_participant_join(record, id) {
        ElectionResult::Promote {
            previous,
            candidate,
        } => {
            let won = store
                .compare_and_set_leader(room, previous, Some(candidate))
                .await?;
            if won {
                info!(room = %room, leader_id = %candidate, "Leader elected on join");
            } else {
                debug!(room = %room, "Another participant claimed leadership first");
            }
            Ok(won)
        }
        _ => Ok(false),
    }
}

async fn refreshed<S: DocumentStore + ?Sized>(
    store: &S,
    room: &RoomCode,
    id: ParticipantId,
) -> Result<Participant> {
    store
        .get_participant(room, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("participant {} in room {}", id, room)))
}

fn context_for(room: &RoomCode, participant: &Participant, token: SessionToken) -> SessionContext {
    SessionContext {
        room: room.clone(),
        participant_id: participant.id,
        display_name: participant.display_name.clone(),
        token,
    }
}
