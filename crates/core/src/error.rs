//! Error types for PokerRoom Core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid vote: {0}")]
    InvalidVote(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("No local participant is registered in this room")]
    NotRegistered,

    #[error("Votes are locked while the round is revealed")]
    VotingClosed,

    #[error("Invalid display name: {0}")]
    InvalidName(String),

    #[error("Invalid room code: {0}")]
    InvalidRoomCode(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to parse configuration TOML: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// True for failures that a retry on the next tick may fix
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
