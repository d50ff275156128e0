//! PokerRoom Core Library
//!
//! Room and participant models, deck and configuration, leader election
//! policy, round statistics, and the shared document store interface.

pub mod config;
pub mod deck;
pub mod election;
pub mod error;
pub mod invariants;
pub mod models;
pub mod stats;
pub mod storage;

pub use config::SyncConfig;
pub use deck::{Deck, DEFAULT_DECK};
pub use election::ElectionResult;
pub use error::{Error, Result};
pub use models::*;
pub use stats::{aggregate, RoundStats};
pub use storage::{
    ChangeFeed, Clock, DocumentStore, ManualClock, MemoryStore, RoomDocuments, RoomFeed,
    RosterDocuments, RosterFeed, SystemClock,
};
