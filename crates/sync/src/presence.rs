//! Presence: heartbeats for the local participant and the staleness sweep
//!
//! Every attached client sweeps independently. Nothing coordinates the
//! sweepers, so each step tolerates a concurrent twin:
//!
//! - deleting an already-deleted participant succeeds
//! - leader promotion is a compare-and-set against the stale leader's id,
//!   so only one sweeper's promotion lands per stale-leader event

use chrono::Duration;
use pokerroom_core::election::{self, ElectionResult};
use pokerroom_core::invariants::assert_leader_in_roster;
use pokerroom_core::{DocumentStore, Participant, ParticipantId, ParticipantPatch, Result, RoomCode};
use tracing::{debug, info, warn};

/// What one sweep did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Participants removed for inactivity
    pub evicted: Vec<ParticipantId>,
    /// Leader installed by this sweep, if its compare-and-set won
    pub promoted: Option<ParticipantId>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.evicted.is_empty() && self.promoted.is_none()
    }
}

/// Refresh the local participant's `last_activity` with server time
pub async fn heartbeat<S: DocumentStore + ?Sized>(
    store: &S,
    room: &RoomCode,
    id: ParticipantId,
) -> Result<()> {
    store
        .merge_participant(room, id, &ParticipantPatch::heartbeat())
        .await
}

/// Evict every participant other than `local` that has been idle for more
/// than `threshold`.
///
/// A stale leader is replaced before its record is deleted, choosing from
/// the roster as it was before the sweep started. Afterwards a leader id that
/// is null or no longer present is repaired the same way.
pub async fn sweep_stale<S: DocumentStore + ?Sized>(
    store: &S,
    room: &RoomCode,
    local: ParticipantId,
    threshold: Duration,
) -> Result<SweepReport> {
    let mut report = SweepReport::default();

    let Some(mut record) = store.get_room(room).await? else {
        debug!(room = %room, "Sweep skipped, room does not exist");
        return Ok(report);
    };
    let now = store.now();
    let snapshot = store.list_participants(room).await?;
    let eligible = |p: &Participant| p.id == local || !p.is_stale(now, threshold);

    for stale in snapshot.iter().filter(|p| !eligible(*p)) {
        let idle_secs = stale.idle_for(now).num_seconds();

        if let ElectionResult::Promote {
            previous,
            candidate,
        } = election::on_leader_evicted(&record, &snapshot, stale.id, &eligible)
        {
            if promote(store, room, previous, candidate, &snapshot).await? {
                record.leader_id = Some(candidate);
                report.promoted = Some(candidate);
            } else if let Some(current) = store.get_room(room).await? {
                record = current;
            }
        } else if record.is_leader(&stale.id) {
            warn!(room = %room, leader_id = %stale.id, "Stale leader has no live successor");
        }

        store.delete_participant(room, stale.id).await?;
        report.evicted.push(stale.id);
        info!(
            room = %room,
            participant_id = %stale.id,
            idle_secs,
            "Evicted stale participant"
        );
    }

    let survivors: Vec<Participant> = snapshot
        .into_iter()
        .filter(|p| !report.evicted.contains(&p.id))
        .collect();

    if let ElectionResult::Promote {
        previous,
        candidate,
    } = election::review(&record, &survivors, &eligible)
    {
        if promote(store, room, previous, candidate, &survivors).await? {
            report.promoted = Some(candidate);
        }
    }

    Ok(report)
}

async fn promote<S: DocumentStore + ?Sized>(
    store: &S,
    room: &RoomCode,
    previous: Option<ParticipantId>,
    candidate: ParticipantId,
    snapshot: &[Participant],
) -> Result<bool> {
    assert_leader_in_roster(candidate, snapshot);

    let won = store
        .compare_and_set_leader(room, previous, Some(candidate))
        .await?;
    if won {
        info!(
            room = %room,
            previous = ?previous,
            leader_id = %candidate,
            "Leader promoted"
        );
    } else {
        debug!(room = %room, "Leader already replaced by another client");
    }
    Ok(won)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::ensure_room;
    use crate::membership::{join, leave};
    use pokerroom_core::{Clock, Error, ManualClock, MemoryStore, RoomDocuments, RosterDocuments};
    use std::sync::Arc;

    struct Fixture {
        clock: Arc<ManualClock>,
        store: MemoryStore,
        room: RoomCode,
    }

    async fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::starting_now());
        let store = MemoryStore::with_clock(clock.clone());
        let room = RoomCode::parse("ABC123").unwrap();
        ensure_room(&store, &room).await.unwrap();
        Fixture { clock, store, room }
    }

    fn threshold() -> Duration {
        Duration::milliseconds(120_000)
    }

    impl Fixture {
        async fn join(&self, name: &str) -> ParticipantId {
            join(&self.store, &self.room, name)
                .await
                .unwrap()
                .participant
                .id
        }

        async fn ids(&self) -> Vec<ParticipantId> {
            self.store
                .list_participants(&self.room)
                .await
                .unwrap()
                .into_iter()
                .map(|p| p.id)
                .collect()
        }

        async fn leader(&self) -> Option<ParticipantId> {
            self.store
                .get_room(&self.room)
                .await
                .unwrap()
                .unwrap()
                .leader_id
        }
    }

    #[tokio::test]
    async fn test_evicts_only_past_threshold() {
        let f = fixture().await;
        let me = f.join("me").await;
        let old = f.join("old").await;
        f.clock.advance(Duration::milliseconds(61_000));
        let recent = f.join("recent").await;

        // old: 121s idle, recent: 60s idle
        f.clock.advance(Duration::milliseconds(60_000));
        heartbeat(&f.store, &f.room, me).await.unwrap();

        let report = sweep_stale(&f.store, &f.room, me, threshold()).await.unwrap();
        assert_eq!(report.evicted, vec![old]);
        assert_eq!(f.ids().await, vec![me, recent]);
    }

    #[tokio::test]
    async fn test_exact_threshold_survives() {
        let f = fixture().await;
        let me = f.join("me").await;
        let other = f.join("other").await;
        f.clock.advance(threshold());

        let report = sweep_stale(&f.store, &f.room, me, threshold()).await.unwrap();
        assert!(report.evicted.is_empty());
        assert_eq!(f.ids().await, vec![me, other]);
    }

    #[tokio::test]
    async fn test_never_evicts_local() {
        let f = fixture().await;
        let me = f.join("me").await;
        f.clock.advance(Duration::minutes(10));

        let report = sweep_stale(&f.store, &f.room, me, threshold()).await.unwrap();
        assert!(report.is_empty());
        assert_eq!(f.ids().await, vec![me]);
    }

    #[tokio::test]
    async fn test_stale_leader_replaced_before_delete() {
        let f = fixture().await;
        let leader = f.join("alice").await;
        assert_eq!(f.leader().await, Some(leader));

        f.clock.advance(Duration::seconds(100));
        let bob = f.join("bob").await;
        let carol = f.join("carol").await;
        f.clock.advance(Duration::seconds(21));

        let report = sweep_stale(&f.store, &f.room, carol, threshold()).await.unwrap();
        assert_eq!(report.evicted, vec![leader]);
        assert_eq!(report.promoted, Some(bob));
        assert_eq!(f.leader().await, Some(bob));
        assert_eq!(f.ids().await, vec![bob, carol]);
    }

    #[tokio::test]
    async fn test_successor_is_never_another_stale_participant() {
        let f = fixture().await;
        let leader = f.join("alice").await;
        let also_stale = f.join("bob").await;
        f.clock.advance(Duration::seconds(100));
        let me = f.join("carol").await;
        f.clock.advance(Duration::seconds(30));

        let report = sweep_stale(&f.store, &f.room, me, threshold()).await.unwrap();
        assert_eq!(report.evicted, vec![leader, also_stale]);
        assert_eq!(f.leader().await, Some(me));
        assert_eq!(f.ids().await, vec![me]);
    }

    #[tokio::test]
    async fn test_concurrent_sweeps_agree_on_one_leader() {
        let f = fixture().await;
        let leader = f.join("alice").await;
        f.clock.advance(Duration::seconds(130));
        let bob = f.join("bob").await;
        let carol = f.join("carol").await;

        let first = sweep_stale(&f.store, &f.room, bob, threshold())
            .await
            .unwrap();
        let second = sweep_stale(&f.store, &f.room, carol, threshold())
            .await
            .unwrap();

        assert_eq!(first.evicted, vec![leader]);
        assert_eq!(first.promoted, Some(bob));
        // The second sweeper sees nothing left to do
        assert!(second.is_empty());
        assert_eq!(f.leader().await, Some(bob));
    }

    #[tokio::test]
    async fn test_sweep_after_leader_already_replaced() {
        let f = fixture().await;
        let leader = f.join("alice").await;
        f.clock.advance(Duration::seconds(130));
        let bob = f.join("bob").await;
        let carol = f.join("carol").await;

        // Bob already took over, so Carol's sweep only removes the record
        assert!(f
            .store
            .compare_and_set_leader(&f.room, Some(leader), Some(bob))
            .await
            .unwrap());

        let report = sweep_stale(&f.store, &f.room, carol, threshold()).await.unwrap();
        assert_eq!(report.evicted, vec![leader]);
        assert_eq!(report.promoted, None);
        assert_eq!(f.leader().await, Some(bob));
    }

    #[tokio::test]
    async fn test_dangling_leader_repaired() {
        let f = fixture().await;
        let leader = f.join("alice").await;
        let bob = f.join("bob").await;
        leave(&f.store, &f.room, leader).await.unwrap();

        let report = sweep_stale(&f.store, &f.room, bob, threshold()).await.unwrap();
        assert!(report.evicted.is_empty());
        assert_eq!(report.promoted, Some(bob));
        assert_eq!(f.leader().await, Some(bob));
    }

    #[tokio::test]
    async fn test_sweep_of_missing_room() {
        let f = fixture().await;
        let other = RoomCode::parse("ZZZ999").unwrap();
        let report = sweep_stale(&f.store, &other, ParticipantId::new(), threshold())
            .await
            .unwrap();
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn test_heartbeat_after_eviction_is_not_found() {
        let f = fixture().await;
        let me = f.join("me").await;
        leave(&f.store, &f.room, me).await.unwrap();
        assert!(matches!(
            heartbeat(&f.store, &f.room, me).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_heartbeat_keeps_participant_fresh() {
        let f = fixture().await;
        let me = f.join("me").await;
        let other = f.join("other").await;
        for _ in 0..5 {
            f.clock.advance(Duration::seconds(30));
            heartbeat(&f.store, &f.room, other).await.unwrap();
        }
        let participant = f
            .store
            .get_participant(&f.room, other)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(participant.last_activity, f.clock.now());

        let report = sweep_stale(&f.store, &f.room, me, threshold()).await.unwrap();
        assert!(report.evicted.is_empty());
    }
}
