//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use crate::deck::Deck;
use crate::models::{Participant, ParticipantId, Room, RoundToken};

/// Validate that a room record is internally consistent
pub fn assert_room_invariants(room: &Room) {
    debug_assert!(
        room.round >= RoundToken::INITIAL,
        "Room has round {} below the initial token",
        room.round
    );
}

/// Validate a round transition never goes backwards or repeats
pub fn assert_round_advanced(previous: RoundToken, next: RoundToken) {
    debug_assert!(
        next > previous,
        "Round token {} does not advance past {}",
        next,
        previous
    );
}

/// Validate that a roster snapshot is consistent
pub fn assert_roster_invariants(roster: &[Participant]) {
    for (i, participant) in roster.iter().enumerate() {
        debug_assert!(
            !participant.display_name.trim().is_empty(),
            "Participant {} has empty display name",
            participant.id
        );

        debug_assert!(
            !roster[..i].iter().any(|p| p.id == participant.id),
            "Participant {} appears twice in roster",
            participant.id
        );
    }
}

/// Validate every cast vote is a card of `deck`
pub fn assert_votes_in_deck(roster: &[Participant], deck: &Deck) {
    for participant in roster {
        if let Some(vote) = &participant.vote {
            debug_assert!(
                deck.contains(vote.as_str()),
                "Participant {} holds vote '{}' outside the deck",
                participant.id,
                vote
            );
        }
    }
}

/// Validate a leader being installed is present in the roster
pub fn assert_leader_in_roster(leader_id: ParticipantId, roster: &[Participant]) {
    debug_assert!(
        roster.iter().any(|p| p.id == leader_id),
        "Leader {} assigned but not in roster",
        leader_id
    );
}
