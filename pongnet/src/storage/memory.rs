//! In-memory game store.

use dashmap::DashMap;
use parking_lot::RwLock;

use super::{GameHistoryRecord, GameStore, Result, StoreError, UserStats};
use crate::PlayerId;

/// Game store backed by process memory.
///
/// Users must be registered before their stats can be updated, mirroring a
/// store that only knows accounts created by the account service.
pub struct MemoryStore {
    history: RwLock<Vec<GameHistoryRecord>>,
    stats: DashMap<PlayerId, UserStats>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            history: RwLock::new(Vec::new()),
            stats: DashMap::new(),
        }
    }

    /// Make a user known with zeroed counters. Existing counters are kept.
    pub fn register_user(&self, user_id: PlayerId) {
        self.stats.entry(user_id).or_default();
    }

    pub fn history(&self) -> Vec<GameHistoryRecord> {
        self.history.read().clone()
    }

    pub fn history_for(&self, lobby_id: &str) -> Vec<GameHistoryRecord> {
        self.history
            .read()
            .iter()
            .filter(|r| r.lobby_id == lobby_id)
            .cloned()
            .collect()
    }

    pub fn stats(&self, user_id: PlayerId) -> Option<UserStats> {
        self.stats.get(&user_id).map(|s| *s)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl GameStore for MemoryStore {
    async fn insert_game_history(&self, record: GameHistoryRecord) -> Result<()> {
        self.history.write().push(record);
        Ok(())
    }

    async fn get_user_stats(&self, user_id: PlayerId) -> Result<Option<UserStats>> {
        Ok(self.stats(user_id))
    }

    async fn update_user_stats(&self, user_id: PlayerId, stats: UserStats) -> Result<()> {
        match self.stats.get_mut(&user_id) {
            Some(mut entry) => {
                *entry = stats;
                Ok(())
            }
            None => Err(StoreError::UserNotFound(user_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stats_require_registration() {
        let store = MemoryStore::new();
        assert_eq!(store.get_user_stats(1).await.unwrap(), None);

        let err = store
            .update_user_stats(1, UserStats::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UserNotFound(1)));

        store.register_user(1);
        let stats = UserStats {
            wins: 1,
            total: 1,
            ..Default::default()
        };
        store.update_user_stats(1, stats).await.unwrap();
        assert_eq!(store.get_user_stats(1).await.unwrap(), Some(stats));

        // Re-registering keeps counters
        store.register_user(1);
        assert_eq!(store.stats(1).unwrap().wins, 1);
    }

    #[tokio::test]
    async fn test_history_filter() {
        let store = MemoryStore::new();
        for lobby in ["a", "b", "a"] {
            store
                .insert_game_history(GameHistoryRecord {
                    lobby_id: lobby.into(),
                    winner_id: 1,
                    loser_id: 2,
                    score_winner: 7,
                    score_loser: 3,
                    start_time: 0,
                    end_time: 10,
                    duration: 10,
                })
                .await
                .unwrap();
        }
        assert_eq!(store.history().len(), 3);
        assert_eq!(store.history_for("a").len(), 2);
    }
}
