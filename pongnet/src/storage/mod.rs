//! Persistence collaborator.
//!
//! The engine writes finished-match history and per-user counters through the
//! [`GameStore`] contract and never reads anything else back. Durable backends
//! live outside this crate; [`MemoryStore`] keeps everything in process.

mod memory;

pub use memory::MemoryStore;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::PlayerId;

/// Storage error types.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user not found: {0}")]
    UserNotFound(PlayerId),

    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// One finished match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameHistoryRecord {
    pub lobby_id: String,
    pub winner_id: PlayerId,
    pub loser_id: PlayerId,
    pub score_winner: u32,
    pub score_loser: u32,
    /// Milliseconds since epoch.
    pub start_time: i64,
    pub end_time: i64,
    /// Milliseconds.
    pub duration: i64,
}

/// Per-user counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub wins: u32,
    pub losses: u32,
    pub total: u32,
    pub tournament_wins: u32,
    pub tournament_losses: u32,
}

/// Async write/read contract for match results.
#[async_trait::async_trait]
pub trait GameStore: Send + Sync {
    async fn insert_game_history(&self, record: GameHistoryRecord) -> Result<()>;

    /// `None` when the user is unknown to the store.
    async fn get_user_stats(&self, user_id: PlayerId) -> Result<Option<UserStats>>;

    async fn update_user_stats(&self, user_id: PlayerId, stats: UserStats) -> Result<()>;
}
