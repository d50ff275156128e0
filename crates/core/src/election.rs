//! Leader election policy for rooms
//!
//! Pure decisions only. Callers apply a [`ElectionResult::Promote`] with a
//! compare-and-set on the room's leader so that concurrent electors cannot
//! both win the same transition.

use crate::models::{Participant, ParticipantId, Room};

/// Result of evaluating a room's leadership
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElectionResult {
    /// Leadership needs no change
    Keep,
    /// Install `candidate` if the leader is still `previous`
    Promote {
        previous: Option<ParticipantId>,
        candidate: ParticipantId,
    },
    /// A new leader is needed but nobody is eligible
    NoCandidate,
}

/// A newly registered participant takes the lead of a leaderless room
pub fn on_participant_join(room: &Room, joining: ParticipantId) -> ElectionResult {
    if room.leader_id.is_none() {
        ElectionResult::Promote {
            previous: None,
            candidate: joining,
        }
    } else {
        ElectionResult::Keep
    }
}

/// The leader `evicted` is about to be removed. Pick the first other
/// participant in roster order that passes `eligible`, using the roster as
/// it was before eviction.
pub fn on_leader_evicted<F>(
    room: &Room,
    snapshot: &[Participant],
    evicted: ParticipantId,
    eligible: F,
) -> ElectionResult
where
    F: Fn(&Participant) -> bool,
{
    if !room.is_leader(&evicted) {
        return ElectionResult::Keep;
    }

    match first_candidate(snapshot, |p| p.id != evicted && eligible(p)) {
        Some(candidate) => ElectionResult::Promote {
            previous: Some(evicted),
            candidate,
        },
        None => ElectionResult::NoCandidate,
    }
}

/// Repair a room whose leader is null or no longer in the roster
pub fn review<F>(room: &Room, snapshot: &[Participant], eligible: F) -> ElectionResult
where
    F: Fn(&Participant) -> bool,
{
    let leader_present = match room.leader_id {
        Some(leader) => snapshot.iter().any(|p| p.id == leader),
        None => false,
    };
    if leader_present {
        return ElectionResult::Keep;
    }

    match first_candidate(snapshot, eligible) {
        Some(candidate) => ElectionResult::Promote {
            previous: room.leader_id,
            candidate,
        },
        None if room.leader_id.is_none() => ElectionResult::Keep,
        None => ElectionResult::NoCandidate,
    }
}

fn first_candidate<F>(snapshot: &[Participant], eligible: F) -> Option<ParticipantId>
where
    F: Fn(&Participant) -> bool,
{
    snapshot.iter().find(|p| eligible(p)).map(|p| p.id)
}
