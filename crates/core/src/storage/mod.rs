//! Shared document store layer for PokerRoom

mod clock;
mod memory;
mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use memory::MemoryStore;
pub use traits::{ChangeFeed, DocumentStore, RoomDocuments, RoomFeed, RosterDocuments, RosterFeed};
