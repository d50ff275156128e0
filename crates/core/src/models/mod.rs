//! Data models for PokerRoom

mod participant;
mod room;
mod session;
mod vote;

pub use participant::*;
pub use room::*;
pub use session::*;
pub use vote::*;
