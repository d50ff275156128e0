//! Vote ledger: casting a card for the local participant

use pokerroom_core::{
    Deck, DocumentStore, Error, ParticipantId, ParticipantPatch, Phase, Result, RoomCode, Vote,
};
use tracing::{debug, info};

/// Record `value` as the participant's vote.
///
/// Checks run in order and each failure leaves the store untouched:
///
/// 1. `participant` must be registered (`NotRegistered`)
/// 2. the phase observed by the caller must be voting (`VotingClosed`)
/// 3. `value` must be a card of `deck` (`InvalidVote`)
///
/// The write also refreshes `last_activity`. A later vote overwrites an
/// earlier one.
pub async fn cast_vote<S: DocumentStore + ?Sized>(
    store: &S,
    deck: &Deck,
    room: &RoomCode,
    participant: Option<ParticipantId>,
    observed_phase: Phase,
    value: &str,
) -> Result<Vote> {
    let id = participant.ok_or(Error::NotRegistered)?;

    if observed_phase == Phase::Revealed {
        debug!(room = %room, participant_id = %id, "Vote rejected after reveal");
        return Err(Error::VotingClosed);
    }

    let vote = deck.card(value)?;
    store
        .merge_participant(room, id, &ParticipantPatch::cast(vote.clone()))
        .await?;
    info!(room = %room, participant_id = %id, "Vote cast");
    Ok(vote)
}
