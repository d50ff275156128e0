//! What one client shows for a room, derived from the latest observed
//! room record and roster

use pokerroom_core::{
    aggregate, Participant, ParticipantId, Phase, Room, RoomCode, RoundStats, RoundToken, Vote,
};
use serde::Serialize;

/// One roster entry as shown to everybody
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Seat {
    pub id: ParticipantId,
    pub display_name: String,
    pub is_leader: bool,
    pub has_voted: bool,
    /// Only filled in once the round is revealed
    pub vote: Option<Vote>,
}

/// A client's derived picture of a room
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomView {
    pub room: RoomCode,
    pub phase: Phase,
    pub round: RoundToken,
    pub leader_id: Option<ParticipantId>,
    pub local_id: Option<ParticipantId>,
    pub is_leader: bool,
    /// The local participant's current card, including one restored on resume
    pub my_vote: Option<Vote>,
    pub seats: Vec<Seat>,
    /// Present only while revealed and at least one numeric vote exists
    pub stats: Option<RoundStats>,
}

impl RoomView {
    /// Build the view. A room that does not exist yet shows as a fresh one.
    pub fn derive(
        code: &RoomCode,
        room: Option<&Room>,
        roster: &[Participant],
        local: Option<ParticipantId>,
    ) -> Self {
        let room = room.cloned().unwrap_or_default();
        let revealed = room.phase == Phase::Revealed;

        let seats = roster
            .iter()
            .map(|p| Seat {
                id: p.id,
                display_name: p.display_name.clone(),
                is_leader: room.is_leader(&p.id),
                has_voted: p.has_voted(),
                vote: if revealed { p.vote.clone() } else { None },
            })
            .collect();

        let my_vote = local
            .and_then(|id| roster.iter().find(|p| p.id == id))
            .and_then(|p| p.vote.clone());

        Self {
            room: code.clone(),
            phase: room.phase,
            round: room.round,
            leader_id: room.leader_id,
            local_id: local,
            is_leader: local.is_some_and(|id| room.is_leader(&id)),
            my_vote,
            seats,
            stats: if revealed { aggregate(roster) } else { None },
        }
    }

    /// `previous` belongs to an earlier round; anything derived from it
    /// (selected card, reveal animation) must be dropped
    pub fn is_new_round(&self, previous: &RoomView) -> bool {
        self.round != previous.round
    }

    pub fn is_seated(&self) -> bool {
        self.local_id
            .is_some_and(|id| self.seats.iter().any(|s| s.id == id))
    }

    pub fn voted_count(&self) -> usize {
        self.seats.iter().filter(|s| s.has_voted).count()
    }
}
