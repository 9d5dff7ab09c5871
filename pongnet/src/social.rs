//! Social graph collaborator.
//!
//! The engine only asks two questions of the friend graph: are two players
//! friends, and has one blocked the other. Storage of the graph lives
//! elsewhere; [`MemorySocial`] is the in-process implementation.

use std::collections::HashMap;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::PlayerId;

/// Relationship state, as seen from the owning user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendState {
    /// Mutual friends.
    Accepted,
    /// User has been blocked.
    Blocked,
}

/// Read side of the friend graph.
pub trait SocialGraph: Send + Sync {
    fn are_friends(&self, a: PlayerId, b: PlayerId) -> bool;

    /// Whether `by_user_id` has blocked `user_id`.
    fn is_blocked(&self, user_id: PlayerId, by_user_id: PlayerId) -> bool;

    /// Either side blocked the other.
    fn is_blocked_either(&self, a: PlayerId, b: PlayerId) -> bool {
        self.is_blocked(a, b) || self.is_blocked(b, a)
    }
}

/// In-memory friend graph.
pub struct MemorySocial {
    /// user_id -> other_user_id -> state.
    relations: DashMap<PlayerId, HashMap<PlayerId, FriendState>>,
}

impl MemorySocial {
    pub fn new() -> Self {
        Self {
            relations: DashMap::new(),
        }
    }

    /// Make two users mutual friends. Does nothing if either blocked the other.
    pub fn befriend(&self, a: PlayerId, b: PlayerId) -> bool {
        if a == b || self.is_blocked_either(a, b) {
            return false;
        }
        self.relations
            .entry(a)
            .or_default()
            .insert(b, FriendState::Accepted);
        self.relations
            .entry(b)
            .or_default()
            .insert(a, FriendState::Accepted);
        true
    }

    /// Remove a friend.
    pub fn remove_friend(&self, a: PlayerId, b: PlayerId) {
        for (owner, other) in [(a, b), (b, a)] {
            if let Some(mut rel) = self.relations.get_mut(&owner) {
                if rel.get(&other) == Some(&FriendState::Accepted) {
                    rel.remove(&other);
                }
            }
        }
    }

    /// Block a user. Any friendship is dropped on both sides.
    pub fn block(&self, user_id: PlayerId, blocked_id: PlayerId) {
        self.relations
            .entry(user_id)
            .or_default()
            .insert(blocked_id, FriendState::Blocked);

        if let Some(mut theirs) = self.relations.get_mut(&blocked_id) {
            if theirs.get(&user_id) == Some(&FriendState::Accepted) {
                theirs.remove(&user_id);
            }
        }
    }

    /// Unblock a user.
    pub fn unblock(&self, user_id: PlayerId, blocked_id: PlayerId) {
        if let Some(mut rel) = self.relations.get_mut(&user_id) {
            if rel.get(&blocked_id) == Some(&FriendState::Blocked) {
                rel.remove(&blocked_id);
            }
        }
    }

    fn state(&self, owner: PlayerId, other: PlayerId) -> Option<FriendState> {
        self.relations
            .get(&owner)
            .and_then(|rel| rel.get(&other).copied())
    }
}

impl Default for MemorySocial {
    fn default() -> Self {
        Self::new()
    }
}

impl SocialGraph for MemorySocial {
    fn are_friends(&self, a: PlayerId, b: PlayerId) -> bool {
        self.state(a, b) == Some(FriendState::Accepted)
            && self.state(b, a) == Some(FriendState::Accepted)
    }

    fn is_blocked(&self, user_id: PlayerId, by_user_id: PlayerId) -> bool {
        self.state(by_user_id, user_id) == Some(FriendState::Blocked)
    }
}
