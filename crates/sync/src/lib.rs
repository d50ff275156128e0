//! PokerRoom Sync Library
//!
//! Keeps a room and its roster consistent across independent clients that
//! share nothing but a document store. Each client runs its own heartbeat
//! and staleness sweep; leader changes go through compare-and-set so that
//! concurrent sweepers cannot both win.

pub mod bootstrap;
pub mod ledger;
pub mod membership;
pub mod phase;
pub mod presence;
pub mod session;
pub mod view;

pub use bootstrap::ensure_room;
pub use ledger::cast_vote;
pub use membership::{join, leave, resume, Joined};
pub use phase::{authorize_leader, reset_round, reveal, start_round};
pub use presence::{heartbeat, sweep_stale, SweepReport};
pub use session::RoomSession;
pub use view::{RoomView, Seat};
