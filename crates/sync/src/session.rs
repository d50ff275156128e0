//! One client's attachment to a room
//!
//! A [`RoomSession`] owns the room's change subscriptions and two
//! background tasks:
//!
//! - heartbeat: refreshes the local participant every heartbeat interval
//! - sweep: evicts stale participants every sweep interval
//!
//! Both only act while a local participant is seated. Dropping or detaching
//! the session stops them and makes a best-effort attempt to remove the
//! local participant's record. The stale sweep of the remaining clients is
//! what actually guarantees cleanup.

use std::sync::{Arc, PoisonError, RwLock};

use pokerroom_core::invariants::{assert_roster_invariants, assert_votes_in_deck};
use pokerroom_core::{
    DocumentStore, Error, Participant, ParticipantId, Result, RoomCode, RoomFeed, RosterFeed,
    RoundToken, SessionContext, SyncConfig, Vote,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::bootstrap::ensure_room;
use crate::ledger::cast_vote;
use crate::membership::{self, Joined};
use crate::phase;
use crate::presence::{heartbeat, sweep_stale};
use crate::view::RoomView;

type LocalSeat = Arc<RwLock<Option<SessionContext>>>;

/// A client attached to one room
pub struct RoomSession<S: DocumentStore + 'static> {
    store: Arc<S>,
    config: SyncConfig,
    room: RoomCode,
    room_rx: RoomFeed,
    roster_rx: RosterFeed,
    local: LocalSeat,
    shutdown_tx: broadcast::Sender<()>,
    detached: bool,
}

impl<S: DocumentStore + 'static> RoomSession<S> {
    /// Attach to `room`, creating it if needed, and start the background
    /// tasks. Must be called from within a tokio runtime.
    pub async fn attach(store: Arc<S>, room: RoomCode, config: SyncConfig) -> Result<Self> {
        config.validate()?;
        ensure_room(store.as_ref(), &room).await?;

        let room_rx = store.subscribe_room(&room).await?;
        let roster_rx = store.subscribe_roster(&room).await?;
        let local: LocalSeat = Arc::new(RwLock::new(None));
        let (shutdown_tx, _) = broadcast::channel(1);

        tokio::spawn(heartbeat_task(
            store.clone(),
            room.clone(),
            local.clone(),
            config.heartbeat_interval(),
            shutdown_tx.subscribe(),
        ));
        tokio::spawn(sweep_task(
            store.clone(),
            room.clone(),
            local.clone(),
            config.clone(),
            shutdown_tx.subscribe(),
        ));

        info!(room = %room, "Attached to room");

        Ok(Self {
            store,
            config,
            room,
            room_rx,
            roster_rx,
            local,
            shutdown_tx,
            detached: false,
        })
    }

    pub fn room(&self) -> &RoomCode {
        &self.room
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Join under `display_name`.
    ///
    /// A seat this session already holds is given up only after the join
    /// succeeded and only if the join landed on a different record. Its
    /// leadership moves to the new seat.
    pub async fn join(&self, display_name: &str) -> Result<Joined> {
        let previous = self.local_id();
        let mut joined = membership::join(self.store.as_ref(), &self.room, display_name).await?;
        let id = joined.participant.id;
        self.set_local(Some(joined.context.clone()));

        if let Some(previous) = previous.filter(|p| *p != id) {
            match self.release_seat(previous, id).await {
                Ok(handed_over) => joined.became_leader |= handed_over,
                Err(e) => {
                    warn!(
                        room = %self.room,
                        participant_id = %previous,
                        error = %e,
                        "Previous seat not released, leaving it to the sweep"
                    );
                }
            }
        }
        Ok(joined)
    }

    /// Reclaim a seat from an earlier session
    pub async fn resume(&self, context: &SessionContext) -> Result<Participant> {
        if context.room != self.room {
            return Err(Error::InvalidRoomCode(format!(
                "session belongs to room {}, not {}",
                context.room, self.room
            )));
        }

        let participant = membership::resume(self.store.as_ref(), context).await?;
        self.set_local(Some(context.clone()));
        Ok(participant)
    }

    /// Give up the local seat
    pub async fn leave(&self) -> Result<()> {
        let id = self.local_id().ok_or(Error::NotRegistered)?;
        membership::leave(self.store.as_ref(), &self.room, id).await?;
        self.set_local(None);
        Ok(())
    }

    /// Cast a card for the local participant
    pub async fn vote(&self, value: &str) -> Result<Vote> {
        let observed = self
            .room_rx
            .borrow()
            .as_ref()
            .map(|r| r.phase)
            .unwrap_or_default();
        cast_vote(
            self.store.as_ref(),
            &self.config.deck,
            &self.room,
            self.local_id(),
            observed,
            value,
        )
        .await
    }

    pub async fn reveal(&self) -> Result<()> {
        phase::reveal(self.store.as_ref(), &self.room, self.local_id()).await
    }

    pub async fn reset_round(&self) -> Result<RoundToken> {
        phase::reset_round(self.store.as_ref(), &self.room, self.local_id()).await
    }

    /// Whether the last observed room record names the local participant
    /// as leader
    pub fn is_leader(&self) -> bool {
        match self.local_id() {
            Some(id) => self
                .room_rx
                .borrow()
                .as_ref()
                .is_some_and(|r| r.is_leader(&id)),
            None => false,
        }
    }

    /// The context to persist for a later [`RoomSession::resume`]
    pub fn context(&self) -> Option<SessionContext> {
        self.local
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn local_id(&self) -> Option<ParticipantId> {
        self.local
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|c| c.participant_id)
    }

    /// Current derived view from the latest observed state
    pub fn view(&self) -> RoomView {
        let room = self.room_rx.borrow().clone();
        let roster = self.roster_rx.borrow().clone();
        RoomView::derive(&self.room, room.as_ref(), &roster, self.local_id())
    }

    /// Wait for the room or roster to change and return the new view.
    ///
    /// If the local participant is missing from the new roster it was
    /// evicted, and the local seat is cleared.
    pub async fn changed(&mut self) -> Result<RoomView> {
        let result = tokio::select! {
            r = self.room_rx.changed() => r,
            r = self.roster_rx.changed() => r,
        };
        result.map_err(|_| {
            Error::StoreUnavailable(format!("change feed for room {} closed", self.room))
        })?;

        let room = self.room_rx.borrow_and_update().clone();
        let roster = self.roster_rx.borrow_and_update().clone();
        assert_roster_invariants(&roster);
        assert_votes_in_deck(&roster, &self.config.deck);

        if let Some(id) = self.local_id() {
            if !roster.iter().any(|p| p.id == id) {
                info!(room = %self.room, participant_id = %id, "Local participant left the roster");
                clear_if_current(&self.local, id);
            }
        }

        Ok(RoomView::derive(&self.room, room.as_ref(), &roster, self.local_id()))
    }

    /// Stop the background tasks and remove the local participant
    /// in the background
    pub fn detach(mut self) {
        self.teardown(true);
    }

    /// Stop the background tasks without removing the local participant,
    /// as a crashed client would
    pub fn abandon(mut self) {
        self.teardown(false);
    }

    fn set_local(&self, context: Option<SessionContext>) {
        *self.local.write().unwrap_or_else(PoisonError::into_inner) = context;
    }

    /// Hand leadership from `previous` to `successor` if `previous` held it,
    /// then remove the `previous` record. Returns whether leadership moved.
    async fn release_seat(
        &self,
        previous: ParticipantId,
        successor: ParticipantId,
    ) -> Result<bool> {
        let handed_over = self
            .store
            .compare_and_set_leader(&self.room, Some(previous), Some(successor))
            .await?;
        if handed_over {
            info!(
                room = %self.room,
                previous = %previous,
                leader_id = %successor,
                "Leadership moved to the new seat"
            );
        }
        membership::leave(self.store.as_ref(), &self.room, previous).await?;
        Ok(handed_over)
    }

    fn teardown(&mut self, remove_local: bool) {
        if self.detached {
            return;
        }
        self.detached = true;
        let _ = self.shutdown_tx.send(());

        let local = self.local_id();
        info!(room = %self.room, participant_id = ?local, remove_local, "Detached from room");

        let Some(id) = local.filter(|_| remove_local) else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let store = self.store.clone();
                let room = self.room.clone();
                handle.spawn(async move {
                    if let Err(e) = store.delete_participant(&room, id).await {
                        debug!(room = %room, participant_id = %id, error = %e, "Teardown delete failed");
                    }
                });
            }
            Err(_) => {
                debug!(room = %self.room, "No runtime for teardown delete, leaving it to the sweep");
            }
        }
    }
}

impl<S: DocumentStore + 'static> Drop for RoomSession<S> {
    fn drop(&mut self) {
        self.teardown(true);
    }
}

fn current_id(local: &LocalSeat) -> Option<ParticipantId> {
    local
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .map(|c| c.participant_id)
}

/// Clear the seat unless it has already moved on to another participant
fn clear_if_current(local: &LocalSeat, id: ParticipantId) {
    let mut seat = local.write().unwrap_or_else(PoisonError::into_inner);
    if seat.as_ref().map(|c| c.participant_id) == Some(id) {
        *seat = None;
    }
}

/// Heartbeat task - refreshes the local participant every interval
async fn heartbeat_task<S: DocumentStore + 'static>(
    store: Arc<S>,
    room: RoomCode,
    local: LocalSeat,
    interval: std::time::Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let Some(id) = current_id(&local) else {
                    continue;
                };
                match heartbeat(store.as_ref(), &room, id).await {
                    Ok(()) => {}
                    Err(Error::NotFound(_)) => {
                        warn!(room = %room, participant_id = %id, "Local participant was evicted");
                        clear_if_current(&local, id);
                    }
                    Err(e) => {
                        warn!(room = %room, participant_id = %id, error = %e, "Heartbeat failed, retrying next tick");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                debug!(room = %room, "Heartbeat task shutting down");
                break;
            }
        }
    }
}

/// Sweep task - evicts stale participants every interval
async fn sweep_task<S: DocumentStore + 'static>(
    store: Arc<S>,
    room: RoomCode,
    local: LocalSeat,
    config: SyncConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let threshold = config.stale_threshold();

    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.sweep_interval()) => {
                let Some(id) = current_id(&local) else {
                    continue;
                };
                match sweep_stale(store.as_ref(), &room, id, threshold).await {
                    Ok(report) if !report.is_empty() => {
                        debug!(
                            room = %room,
                            evicted = report.evicted.len(),
                            promoted = ?report.promoted,
                            "Sweep finished"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(room = %room, error = %e, "Sweep failed, retrying next tick");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                debug!(room = %room, "Sweep task shutting down");
                break;
            }
        }
    }
}
