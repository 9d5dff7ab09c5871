//! Error types for PongNet.

use thiserror::Error;

use crate::game::GameError;
use crate::lobby::LobbyError;
use crate::protocol::ProtocolError;
use crate::storage::StoreError;

pub type Result<T> = std::result::Result<T, PongNetError>;

#[derive(Error, Debug)]
pub enum PongNetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {reason}")]
    Config { reason: String },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Lobby error: {0}")]
    Lobby(#[from] LobbyError),

    #[error("Game error: {0}")]
    Game(#[from] GameError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl PongNetError {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}
