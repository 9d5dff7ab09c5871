//! Lobby rooms and the process-wide room registry.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bracket::{self, Bracket};
use crate::game::Game;
use crate::lobby::LobbyError;
use crate::PlayerId;

pub const MIN_NAME_LEN: usize = 3;
pub const MAX_NAME_LEN: usize = 18;
pub const TOURNAMENT_SIZES: [u32; 3] = [4, 8, 16];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LobbyType {
    #[serde(rename = "1v1")]
    OneVsOne,
    #[serde(rename = "tournament")]
    Tournament,
}

/// Room state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Friends,
    Public,
}

/// A player seated in a lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyPlayer {
    pub id: PlayerId,
    pub display_name: String,
    pub ready: bool,
}

impl LobbyPlayer {
    pub fn new(id: PlayerId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            ready: false,
        }
    }
}

/// Room creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomConfig {
    pub room_name: String,
    pub room_type: LobbyType,
    pub visibility: Visibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players_number: Option<u32>,
}

impl RoomConfig {
    /// Check the request; returns the trimmed name and the seat count.
    pub fn validate(&self) -> Result<(String, u32), LobbyError> {
        let name = self.room_name.trim();
        let len = name.chars().count();
        if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
            return Err(LobbyError::invalid_config(format!(
                "Room name must be between {MIN_NAME_LEN} and {MAX_NAME_LEN} characters"
            )));
        }

        let required = match self.room_type {
            LobbyType::OneVsOne => 2,
            LobbyType::Tournament => match self.players_number {
                Some(n) if TOURNAMENT_SIZES.contains(&n) => n,
                _ => {
                    return Err(LobbyError::invalid_config(
                        "Tournament player count must be 4, 8 or 16",
                    ))
                }
            },
        };
        Ok((name.to_string(), required))
    }
}

/// Lobby room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub name: String,
    pub lobby_type: LobbyType,
    pub status: RoomStatus,
    pub owner: PlayerId,
    pub required_players: u32,
    pub connected_players: Vec<LobbyPlayer>,
    pub connected_players_number: u32,
    pub brackets: Vec<Bracket>,
    pub visibility: Visibility,
    pub last_update: i64,
    pub created_at: i64,
    #[serde(skip)]
    pub completed_at: i64,
}

impl Room {
    pub fn new(
        name: String,
        lobby_type: LobbyType,
        visibility: Visibility,
        owner: PlayerId,
        required_players: u32,
        now: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            lobby_type,
            status: RoomStatus::Waiting,
            owner,
            required_players,
            connected_players: Vec::new(),
            connected_players_number: 0,
            brackets: Vec::new(),
            visibility,
            last_update: now,
            created_at: now,
            completed_at: 0,
        }
    }

    pub fn has_player(&self, player_id: PlayerId) -> bool {
        self.connected_players.iter().any(|p| p.id == player_id)
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&LobbyPlayer> {
        self.connected_players.iter().find(|p| p.id == player_id)
    }

    pub fn player_mut(&mut self, player_id: PlayerId) -> Option<&mut LobbyPlayer> {
        self.connected_players.iter_mut().find(|p| p.id == player_id)
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.connected_players.iter().map(|p| p.id).collect()
    }

    /// Seat a player. A player already seated is not added twice.
    pub fn add_player(&mut self, player: LobbyPlayer) -> bool {
        if self.has_player(player.id) {
            return false;
        }
        self.connected_players.push(player);
        self.connected_players_number = self.connected_players.len() as u32;
        true
    }

    pub fn remove_player(&mut self, player_id: PlayerId) -> bool {
        let before = self.connected_players.len();
        self.connected_players.retain(|p| p.id != player_id);
        self.connected_players_number = self.connected_players.len() as u32;
        before != self.connected_players.len()
    }

    pub fn is_full(&self) -> bool {
        self.connected_players_number >= self.required_players
    }

    pub fn all_ready(&self) -> bool {
        self.connected_players.iter().all(|p| p.ready)
    }

    pub fn touch(&mut self, now: i64) {
        self.last_update = now;
    }

    pub fn game(&self, game_id: &str) -> Option<&Game> {
        self.brackets
            .iter()
            .find(|b| b.id == game_id)
            .and_then(|b| b.game.as_ref())
    }

    pub fn game_mut(&mut self, game_id: &str) -> Option<&mut Game> {
        self.brackets
            .iter_mut()
            .find(|b| b.id == game_id)
            .and_then(|b| b.game.as_mut())
    }

    /// Matches the player takes part in that have not completed.
    pub fn live_games_of(&self, player_id: PlayerId) -> Vec<String> {
        self.brackets
            .iter()
            .filter_map(|b| b.game.as_ref())
            .filter(|g| !g.is_completed() && g.has_player(player_id))
            .map(|g| g.id.clone())
            .collect()
    }

    /// Build the bracket tree from the seated players.
    pub fn build_brackets(&mut self, now: i64) {
        self.brackets = bracket::build_brackets(&self.id, &self.connected_players, now);
    }

    /// Project to the listing view.
    pub fn public_view(&self, is_friend: bool, can_join: bool) -> BasicPublicRoom {
        BasicPublicRoom {
            id: self.id.clone(),
            name: self.name.clone(),
            owner: self.owner,
            lobby_type: self.lobby_type,
            status: self.status,
            required_players: self.required_players,
            connected_players_number: self.connected_players_number,
            is_friend,
            can_join,
        }
    }
}

/// The only room fields exposed to non-participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicPublicRoom {
    pub id: String,
    pub name: String,
    pub owner: PlayerId,
    pub lobby_type: LobbyType,
    pub status: RoomStatus,
    pub required_players: u32,
    pub connected_players_number: u32,
    pub is_friend: bool,
    pub can_join: bool,
}

pub type RoomHandle = Arc<Mutex<Room>>;

/// Room registry.
///
/// Rooms live behind their own mutex; the maps here are only held for the
/// duration of a single lookup, never while a room is being locked.
pub struct RoomRegistry {
    rooms: DashMap<String, RoomHandle>,
    /// Lowercased name -> room id, for rooms not yet completed.
    names: DashMap<String, String>,
    /// Player -> room the player is attached to.
    memberships: DashMap<PlayerId, String>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            names: DashMap::new(),
            memberships: DashMap::new(),
        }
    }

    /// Register a room, reserving its name. `None` if the name is taken.
    pub fn insert(&self, room: Room) -> Option<RoomHandle> {
        match self.names.entry(room.name.to_lowercase()) {
            Entry::Occupied(_) => return None,
            Entry::Vacant(slot) => {
                slot.insert(room.id.clone());
            }
        }
        let id = room.id.clone();
        let handle = Arc::new(Mutex::new(room));
        self.rooms.insert(id, handle.clone());
        Some(handle)
    }

    pub fn get(&self, id: &str) -> Option<RoomHandle> {
        self.rooms.get(id).map(|r| r.value().clone())
    }

    /// Drop a room with its name reservation and memberships. Safe to call
    /// while holding the room's lock.
    pub fn remove(&self, room: &Room) -> Option<RoomHandle> {
        let removed = self.rooms.remove(&room.id).map(|(_, r)| r);
        self.release_name(&room.name, &room.id);
        self.memberships.retain(|_, room_id| *room_id != room.id);
        removed
    }

    pub fn name_taken(&self, name: &str) -> bool {
        self.names.contains_key(&name.trim().to_lowercase())
    }

    /// Free a name, but only if it still belongs to `room_id`.
    pub fn release_name(&self, name: &str, room_id: &str) {
        self.names
            .remove_if(&name.to_lowercase(), |_, owner| owner == room_id);
    }

    /// Snapshot of all room handles.
    pub fn handles(&self) -> Vec<RoomHandle> {
        self.rooms.iter().map(|r| r.value().clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.rooms.len()
    }

    pub fn membership(&self, player_id: PlayerId) -> Option<String> {
        self.memberships.get(&player_id).map(|r| r.value().clone())
    }

    /// Attach a player to a room. Fails with the current room id if the
    /// player is attached elsewhere.
    pub fn attach(&self, player_id: PlayerId, room_id: &str) -> Result<(), String> {
        match self.memberships.entry(player_id) {
            Entry::Occupied(entry) if entry.get() != room_id => Err(entry.get().clone()),
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(room_id.to_string());
                Ok(())
            }
        }
    }

    /// Detach a player, if attached to `room_id`.
    pub fn detach(&self, player_id: PlayerId, room_id: &str) -> bool {
        self.memberships
            .remove_if(&player_id, |_, current| current == room_id)
            .is_some()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(name: &str) -> Room {
        Room::new(name.into(), LobbyType::OneVsOne, Visibility::Public, 1, 2, 0)
    }

    fn config(name: &str, room_type: LobbyType, players: Option<u32>) -> RoomConfig {
        RoomConfig {
            room_name: name.into(),
            room_type,
            visibility: Visibility::Public,
            players_number: players,
        }
    }

    #[test]
    fn test_count_tracks_players() {
        let mut r = room("Arena");
        assert!(r.add_player(LobbyPlayer::new(1, "A")));
        assert!(r.add_player(LobbyPlayer::new(2, "B")));
        assert!(!r.add_player(LobbyPlayer::new(2, "B")));
        assert_eq!(r.connected_players_number as usize, r.connected_players.len());
        assert!(r.is_full());

        assert!(r.remove_player(1));
        assert!(!r.remove_player(1));
        assert_eq!(r.connected_players_number, 1);
        assert_eq!(r.player_ids(), vec![2]);
    }

    #[test]
    fn test_config_validation() {
        assert_eq!(
            config("  Arena  ", LobbyType::OneVsOne, None).validate().unwrap(),
            ("Arena".to_string(), 2)
        );
        assert_eq!(
            config("Cup", LobbyType::Tournament, Some(8)).validate().unwrap(),
            ("Cup".to_string(), 8)
        );

        assert!(config("ab", LobbyType::OneVsOne, None).validate().is_err());
        assert!(config("   ab   ", LobbyType::OneVsOne, None).validate().is_err());
        assert!(config(&"x".repeat(19), LobbyType::OneVsOne, None).validate().is_err());
        assert!(config("Cup", LobbyType::Tournament, Some(6)).validate().is_err());
        assert!(config("Cup", LobbyType::Tournament, None).validate().is_err());
    }

    #[test]
    fn test_names_case_insensitive() {
        let registry = RoomRegistry::new();
        let first = room("Arena");
        assert!(registry.insert(first.clone()).is_some());
        assert!(registry.insert(room("ARENA")).is_none());
        assert!(registry.name_taken(" arena "));
        assert_eq!(registry.count(), 1);

        // Releasing under another id is ignored
        registry.release_name("arena", "other");
        assert!(registry.name_taken("Arena"));

        registry.remove(&first);
        assert_eq!(registry.count(), 0);
        assert!(!registry.name_taken("Arena"));
        assert!(registry.insert(room("arena")).is_some());
    }

    #[test]
    fn test_memberships() {
        let registry = RoomRegistry::new();
        assert_eq!(registry.attach(1, "a"), Ok(()));
        assert_eq!(registry.attach(1, "a"), Ok(()));
        assert_eq!(registry.attach(1, "b"), Err("a".to_string()));

        assert!(!registry.detach(1, "b"));
        assert!(registry.detach(1, "a"));
        assert_eq!(registry.membership(1), None);
    }

    #[test]
    fn test_remove_clears_memberships() {
        let registry = RoomRegistry::new();
        let r = room("Arena");
        registry.insert(r.clone());
        registry.attach(1, &r.id).unwrap();
        registry.attach(2, "elsewhere").unwrap();

        registry.remove(&r);
        assert_eq!(registry.membership(1), None);
        assert_eq!(registry.membership(2), Some("elsewhere".into()));
    }

    #[test]
    fn test_room_wire_shape() {
        let r = room("Arena");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["lobbyType"], "1v1");
        assert!(json.get("type").is_none());
        assert_eq!(json["status"], "waiting");
        assert_eq!(json["requiredPlayers"], 2);
        assert_eq!(json["connectedPlayersNumber"], 0);
        assert_eq!(json["visibility"], "public");
        assert!(json.get("completedAt").is_none());

        let view = serde_json::to_value(r.public_view(false, true)).unwrap();
        assert_eq!(view["lobbyType"], "1v1");
        assert_eq!(view["canJoin"], true);
    }
}
