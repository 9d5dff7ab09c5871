//! Lobby lifecycle.
//!
//! Creating, joining, leaving and deleting rooms, ready flags, starting play,
//! and the per-viewer room listing.
//!
//! ## Locking
//!
//! Every mutation locks exactly one room for its whole duration. Outbound
//! pushes go through unbounded channels and may happen under that lock, but
//! [`Lobby::broadcast_rooms`] locks every room in turn and must only be
//! called with no room lock held.

use std::sync::Arc;

use thiserror::Error;

use crate::clock::Clock;
use crate::protocol::ServerMessage;
use crate::room::{BasicPublicRoom, LobbyPlayer, Room, RoomConfig, RoomRegistry, RoomStatus, Visibility};
use crate::session::ConnectionRegistry;
use crate::social::SocialGraph;
use crate::PlayerId;

/// Lobby operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LobbyError {
    #[error("{0}")]
    InvalidConfig(String),

    #[error("A room named {0} already exists")]
    NameTaken(String),

    #[error("Room {0} does not exist")]
    RoomNotFound(String),

    #[error("You are already in another room")]
    AlreadyInRoom(String),

    #[error("Room is full")]
    RoomFull,

    #[error("The last seat is reserved for the room owner")]
    SeatReserved,

    #[error("Room has already started without you")]
    NotAMember,

    #[error("You are not in this room")]
    NotInRoom,

    #[error("Room is not waiting for players")]
    NotWaiting,

    #[error("Room has already completed")]
    RoomCompleted,

    #[error("Only the room owner can {action}")]
    NotOwner { action: &'static str },

    #[error("Room needs {required} players, {connected} joined")]
    PlayersMissing { required: u32, connected: u32 },

    #[error("Not every player is ready")]
    PlayersNotReady,
}

impl LobbyError {
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }

    pub fn not_found(room_id: impl Into<String>) -> Self {
        Self::RoomNotFound(room_id.into())
    }

    pub fn not_owner(action: &'static str) -> Self {
        Self::NotOwner { action }
    }

    /// Validation failures are reported as `error-new-game-config`.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig(_) | Self::NameTaken(_))
    }
}

pub type Result<T> = std::result::Result<T, LobbyError>;

/// What a player sees of the lobby.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomListing {
    pub rooms: Vec<BasicPublicRoom>,
    /// The room the player is seated in, pushed as a full snapshot.
    pub current: Option<Room>,
}

/// Run the ordered join checks for `player_id` against `room` without
/// changing anything. `membership` is the room the player is attached to.
pub fn check_join(room: &Room, player_id: PlayerId, membership: Option<&str>) -> Result<()> {
    if let Some(current) = membership {
        if current != room.id {
            return Err(LobbyError::AlreadyInRoom(current.to_string()));
        }
    }

    let seated = room.has_player(player_id);
    match room.status {
        RoomStatus::Waiting => {
            if seated {
                return Ok(());
            }
            if room.is_full() {
                return Err(LobbyError::RoomFull);
            }
            let free = room.required_players - room.connected_players_number;
            if free == 1 && player_id != room.owner && !room.has_player(room.owner) {
                return Err(LobbyError::SeatReserved);
            }
            Ok(())
        }
        RoomStatus::Active if seated => Ok(()),
        RoomStatus::Active => Err(LobbyError::NotAMember),
        RoomStatus::Completed => Err(LobbyError::RoomCompleted),
    }
}

/// Lobby lifecycle manager.
pub struct Lobby {
    rooms: Arc<RoomRegistry>,
    connections: Arc<ConnectionRegistry>,
    social: Arc<dyn SocialGraph>,
    clock: Arc<dyn Clock>,
}

impl Lobby {
    pub fn new(
        rooms: Arc<RoomRegistry>,
        connections: Arc<ConnectionRegistry>,
        social: Arc<dyn SocialGraph>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            rooms,
            connections,
            social,
            clock,
        }
    }

    pub fn rooms(&self) -> &Arc<RoomRegistry> {
        &self.rooms
    }

    fn display_name(&self, player_id: PlayerId) -> String {
        self.connections
            .display_name(player_id)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("Player {player_id}"))
    }

    fn push_snapshot(&self, room: &Room) {
        let msg = ServerMessage::LobbyRoomDataUpdate(Box::new(room.clone()));
        self.connections.send_many(&room.player_ids(), &msg);
    }

    /// Create a room. The owner is told the new id and must join it.
    pub fn create_room(&self, owner: PlayerId, config: &RoomConfig) -> Result<String> {
        let (name, required) = config.validate()?;

        let room = Room::new(
            name.clone(),
            config.room_type,
            config.visibility,
            owner,
            required,
            self.clock.now_millis(),
        );
        let room_id = room.id.clone();
        if self.rooms.insert(room).is_none() {
            return Err(LobbyError::NameTaken(name));
        }

        tracing::info!(room_id = %room_id, owner, name = %name, required, "room created");
        self.broadcast_rooms();
        self.connections.send(
            owner,
            ServerMessage::LobbyRoomJoin {
                room_id: room_id.clone(),
            },
        );
        Ok(room_id)
    }

    /// Seat a player in a room (or re-attach a seated one).
    pub fn join_room(&self, room_id: &str, player_id: PlayerId) -> Result<()> {
        let handle = self
            .rooms
            .get(room_id)
            .ok_or_else(|| LobbyError::not_found(room_id))?;

        let added = {
            let mut room = handle.lock();
            let membership = self.rooms.membership(player_id);
            check_join(&room, player_id, membership.as_deref())?;

            self.rooms
                .attach(player_id, room_id)
                .map_err(LobbyError::AlreadyInRoom)?;

            let added = room.add_player(LobbyPlayer::new(player_id, self.display_name(player_id)));
            if added {
                room.touch(self.clock.now_millis());
                tracing::debug!(room_id, player_id, players = room.connected_players_number, "player joined room");
            }

            self.connections.send(
                player_id,
                ServerMessage::LobbyRoomJoin {
                    room_id: room_id.to_string(),
                },
            );
            self.push_snapshot(&room);
            added
        };

        if added {
            self.broadcast_rooms();
        }
        Ok(())
    }

    /// Unseat a player. Brackets already built are not touched.
    pub fn leave_room(&self, room_id: &str, player_id: PlayerId) -> Result<()> {
        let handle = self
            .rooms
            .get(room_id)
            .ok_or_else(|| LobbyError::not_found(room_id))?;

        {
            let mut room = handle.lock();
            if !room.remove_player(player_id) {
                return Err(LobbyError::NotInRoom);
            }
            room.touch(self.clock.now_millis());
            self.rooms.detach(player_id, room_id);

            self.connections.send(
                player_id,
                ServerMessage::LobbyRoomLeave {
                    room_id: room_id.to_string(),
                    reason: None,
                },
            );
            self.push_snapshot(&room);
            tracing::debug!(room_id, player_id, "player left room");
        }

        self.broadcast_rooms();
        Ok(())
    }

    /// Remove a waiting room. Owner only.
    pub fn delete_room(&self, room_id: &str, player_id: PlayerId) -> Result<()> {
        let handle = self
            .rooms
            .get(room_id)
            .ok_or_else(|| LobbyError::not_found(room_id))?;

        {
            let room = handle.lock();
            if room.owner != player_id {
                return Err(LobbyError::not_owner("delete the room"));
            }
            match room.status {
                RoomStatus::Waiting => {}
                RoomStatus::Active => return Err(LobbyError::NotWaiting),
                RoomStatus::Completed => return Err(LobbyError::RoomCompleted),
            }

            self.rooms.remove(&room);
            let mut notify = room.player_ids();
            if !notify.contains(&room.owner) {
                notify.push(room.owner);
            }
            self.connections.send_many(
                &notify,
                &ServerMessage::LobbyRoomLeave {
                    room_id: room_id.to_string(),
                    reason: Some("Room deleted by owner".into()),
                },
            );
            tracing::info!(room_id, owner = player_id, "room deleted");
        }

        self.broadcast_rooms();
        Ok(())
    }

    /// Toggle a seated player's ready flag. Setting the current value is a
    /// no-op.
    pub fn set_ready(&self, room_id: &str, player_id: PlayerId, ready: bool) -> Result<()> {
        let handle = self
            .rooms
            .get(room_id)
            .ok_or_else(|| LobbyError::not_found(room_id))?;

        let mut room = handle.lock();
        match room.status {
            RoomStatus::Waiting => {}
            RoomStatus::Active => return Err(LobbyError::NotWaiting),
            RoomStatus::Completed => return Err(LobbyError::RoomCompleted),
        }

        let player = room.player_mut(player_id).ok_or(LobbyError::NotInRoom)?;
        if player.ready == ready {
            return Ok(());
        }
        player.ready = ready;
        room.touch(self.clock.now_millis());
        self.push_snapshot(&room);
        Ok(())
    }

    /// Build the brackets and start play. Owner only, with a full room of
    /// ready players.
    pub fn start_game(&self, room_id: &str, player_id: PlayerId) -> Result<()> {
        let handle = self
            .rooms
            .get(room_id)
            .ok_or_else(|| LobbyError::not_found(room_id))?;

        {
            let mut room = handle.lock();
            if room.owner != player_id {
                return Err(LobbyError::not_owner("start the game"));
            }
            match room.status {
                RoomStatus::Waiting => {}
                RoomStatus::Active => return Err(LobbyError::NotWaiting),
                RoomStatus::Completed => return Err(LobbyError::RoomCompleted),
            }
            if room.connected_players_number != room.required_players {
                return Err(LobbyError::PlayersMissing {
                    required: room.required_players,
                    connected: room.connected_players_number,
                });
            }
            if !room.all_ready() {
                return Err(LobbyError::PlayersNotReady);
            }

            let now = self.clock.now_millis();
            room.build_brackets(now);
            room.status = RoomStatus::Active;
            room.touch(now);
            tracing::info!(room_id, brackets = room.brackets.len(), "room started");

            self.push_snapshot(&room);
            for game in room.brackets.iter().filter_map(|b| b.game.as_ref()) {
                let msg = ServerMessage::GameRoomJoin {
                    room_id: room_id.to_string(),
                    game_id: game.id.clone(),
                };
                self.connections.send_many(&game.participant_ids(), &msg);
            }
        }

        self.broadcast_rooms();
        Ok(())
    }

    fn can_see(&self, room: &Room, viewer: PlayerId) -> bool {
        if room.owner == viewer {
            return true;
        }
        if self.social.is_blocked_either(viewer, room.owner) {
            return false;
        }
        match room.visibility {
            Visibility::Public => true,
            Visibility::Friends => self.social.are_friends(viewer, room.owner),
        }
    }

    /// Rooms `viewer` may see, plus the room the viewer is seated in.
    pub fn list_visible(&self, viewer: PlayerId) -> RoomListing {
        let membership = self.rooms.membership(viewer);
        let mut rooms = Vec::new();
        let mut current = None;

        for handle in self.rooms.handles() {
            let room = handle.lock();
            if room.status == RoomStatus::Completed {
                continue;
            }
            if room.has_player(viewer) {
                current = Some(room.clone());
                continue;
            }
            if !self.can_see(&room, viewer) {
                continue;
            }
            let can_join = check_join(&room, viewer, membership.as_deref()).is_ok();
            let is_friend = self.social.are_friends(viewer, room.owner);
            rooms.push((room.created_at, room.public_view(is_friend, can_join)));
        }

        rooms.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        RoomListing {
            rooms: rooms.into_iter().map(|(_, r)| r).collect(),
            current,
        }
    }

    /// Rooms the requester may see that `target` could join.
    pub fn invitable_rooms(&self, requester: PlayerId, target: PlayerId) -> Vec<BasicPublicRoom> {
        let target_membership = self.rooms.membership(target);
        let mut rooms = Vec::new();

        for handle in self.rooms.handles() {
            let room = handle.lock();
            if room.status == RoomStatus::Completed {
                continue;
            }
            if !room.has_player(requester) && !self.can_see(&room, requester) {
                continue;
            }
            if !self.can_see(&room, target) {
                continue;
            }
            if check_join(&room, target, target_membership.as_deref()).is_err() {
                continue;
            }
            let is_friend = self.social.are_friends(requester, room.owner);
            rooms.push((room.created_at, room.public_view(is_friend, true)));
        }

        rooms.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        rooms.into_iter().map(|(_, r)| r).collect()
    }

    /// Push the listing and, if seated, the current room to one player.
    pub fn send_listing(&self, player_id: PlayerId) {
        let listing = self.list_visible(player_id);
        self.connections.send(
            player_id,
            ServerMessage::RoomsUpdate {
                rooms: listing.rooms,
            },
        );
        if let Some(room) = listing.current {
            self.connections
                .send(player_id, ServerMessage::LobbyRoomDataUpdate(Box::new(room)));
        }
    }

    /// Send every connected player their own `rooms-update`.
    pub fn broadcast_rooms(&self) {
        for player_id in self.connections.player_ids() {
            let listing = self.list_visible(player_id);
            self.connections.send(
                player_id,
                ServerMessage::RoomsUpdate {
                    rooms: listing.rooms,
                },
            );
        }
    }

    /// Remove waiting rooms idle for at least `ttl_ms`. Returns how many.
    pub fn expire_idle_rooms(&self, now: i64, ttl_ms: i64) -> usize {
        let mut expired = 0;
        for handle in self.rooms.handles() {
            let room = handle.lock();
            if room.status != RoomStatus::Waiting || now - room.last_update < ttl_ms {
                continue;
            }
            self.rooms.remove(&room);
            self.connections.send_many(
                &room.player_ids(),
                &ServerMessage::LobbyRoomLeave {
                    room_id: room.id.clone(),
                    reason: Some("Room expired".into()),
                },
            );
            tracing::info!(room_id = %room.id, idle_ms = now - room.last_update, "room expired");
            expired += 1;
        }

        if expired > 0 {
            self.broadcast_rooms();
        }
        expired
    }

    /// Drop completed rooms older than `retention_ms`. Returns how many.
    pub fn drop_completed_rooms(&self, now: i64, retention_ms: i64) -> usize {
        let mut dropped = 0;
        for handle in self.rooms.handles() {
            let room = handle.lock();
            if room.status == RoomStatus::Completed && now - room.completed_at >= retention_ms {
                self.rooms.remove(&room);
                tracing::debug!(room_id = %room.id, "completed room dropped");
                dropped += 1;
            }
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::room::LobbyType;
    use crate::session::Outbound;
    use crate::social::MemorySocial;

    struct Fixture {
        lobby: Lobby,
        social: Arc<MemorySocial>,
        clock: Arc<ManualClock>,
        connections: Arc<ConnectionRegistry>,
    }

    impl Fixture {
        fn new() -> Self {
            let connections = Arc::new(ConnectionRegistry::new());
            let social = Arc::new(MemorySocial::new());
            let clock = Arc::new(ManualClock::new(1_000));
            let lobby = Lobby::new(
                Arc::new(RoomRegistry::new()),
                connections.clone(),
                social.clone(),
                clock.clone(),
            );
            Self {
                lobby,
                social,
                clock,
                connections,
            }
        }

        fn connect(&self, id: PlayerId) -> Outbound {
            self.connections.register(id, format!("P{id}")).1
        }

        fn room(&self, id: &str) -> Room {
            self.lobby.rooms().get(id).unwrap().lock().clone()
        }
    }

    fn drain(rx: &mut Outbound) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn one_vs_one(name: &str) -> RoomConfig {
        RoomConfig {
            room_name: name.into(),
            room_type: LobbyType::OneVsOne,
            visibility: Visibility::Public,
            players_number: None,
        }
    }

    fn tournament(name: &str, n: u32) -> RoomConfig {
        RoomConfig {
            room_name: name.into(),
            room_type: LobbyType::Tournament,
            visibility: Visibility::Public,
            players_number: Some(n),
        }
    }

    #[test]
    fn test_create_does_not_enroll_owner() {
        let f = Fixture::new();
        let mut rx = f.connect(1);

        let id = f.lobby.create_room(1, &one_vs_one("Arena")).unwrap();
        let room = f.room(&id);
        assert_eq!(room.connected_players_number, 0);
        assert_eq!(room.required_players, 2);
        assert_eq!(room.status, RoomStatus::Waiting);

        let msgs = drain(&mut rx);
        assert!(msgs.iter().any(|m| matches!(m, ServerMessage::RoomsUpdate { rooms } if rooms.len() == 1)));
        assert!(msgs.iter().any(|m| matches!(m, ServerMessage::LobbyRoomJoin { room_id } if *room_id == id)));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let f = Fixture::new();
        f.lobby.create_room(1, &one_vs_one("Arena")).unwrap();
        let err = f.lobby.create_room(2, &one_vs_one("  arena ")).unwrap_err();
        assert_eq!(err, LobbyError::NameTaken("arena".into()));
        assert!(err.is_config_error());
        assert_eq!(f.lobby.rooms().count(), 1);
    }

    #[test]
    fn test_join_checks() {
        let f = Fixture::new();
        let id = f.lobby.create_room(1, &one_vs_one("Arena")).unwrap();

        assert_eq!(f.lobby.join_room("nope", 2), Err(LobbyError::not_found("nope")));

        // Last seat is kept for the owner
        f.lobby.join_room(&id, 2).unwrap();
        assert_eq!(f.lobby.join_room(&id, 3), Err(LobbyError::SeatReserved));

        f.lobby.join_room(&id, 1).unwrap();
        let before = f.room(&id).connected_players_number;
        assert_eq!(f.lobby.join_room(&id, 3), Err(LobbyError::RoomFull));
        assert_eq!(f.room(&id).connected_players_number, before);

        // Rejoining is harmless
        f.lobby.join_room(&id, 2).unwrap();
        let room = f.room(&id);
        assert_eq!(room.connected_players_number, 2);
        assert_eq!(room.connected_players.len(), 2);

        // Already attached elsewhere
        let other = f.lobby.create_room(5, &one_vs_one("Other")).unwrap();
        assert!(matches!(
            f.lobby.join_room(&other, 2),
            Err(LobbyError::AlreadyInRoom(ref r)) if *r == id
        ));
    }

    #[test]
    fn test_join_pushes_snapshot_to_members() {
        let f = Fixture::new();
        let mut rx1 = f.connect(1);
        let mut rx2 = f.connect(2);
        let id = f.lobby.create_room(1, &one_vs_one("Arena")).unwrap();
        f.lobby.join_room(&id, 1).unwrap();
        drain(&mut rx1);
        drain(&mut rx2);

        f.lobby.join_room(&id, 2).unwrap();

        let to_joiner = drain(&mut rx2);
        assert!(to_joiner.iter().any(|m| matches!(m, ServerMessage::LobbyRoomJoin { .. })));
        assert!(to_joiner.iter().any(|m| matches!(
            m,
            ServerMessage::LobbyRoomDataUpdate(room) if room.connected_players_number == 2
        )));
        let to_owner = drain(&mut rx1);
        assert!(to_owner.iter().any(|m| matches!(m, ServerMessage::LobbyRoomDataUpdate(_))));
        assert_eq!(f.room(&id).player(2).unwrap().display_name, "P2");
    }

    #[test]
    fn test_leave_room() {
        let f = Fixture::new();
        let mut rx = f.connect(2);
        let id = f.lobby.create_room(1, &one_vs_one("Arena")).unwrap();
        f.lobby.join_room(&id, 2).unwrap();
        f.clock.advance(50);

        f.lobby.leave_room(&id, 2).unwrap();
        let room = f.room(&id);
        assert_eq!(room.connected_players_number, 0);
        assert_eq!(room.last_update, 1_050);
        assert_eq!(f.lobby.rooms().membership(2), None);
        assert!(drain(&mut rx)
            .iter()
            .any(|m| matches!(m, ServerMessage::LobbyRoomLeave { reason: None, .. })));

        assert_eq!(f.lobby.leave_room(&id, 2), Err(LobbyError::NotInRoom));
    }

    #[test]
    fn test_delete_rules() {
        let f = Fixture::new();
        let mut rx = f.connect(2);
        let id = f.lobby.create_room(1, &one_vs_one("Arena")).unwrap();
        f.lobby.join_room(&id, 2).unwrap();

        assert_eq!(
            f.lobby.delete_room(&id, 2),
            Err(LobbyError::not_owner("delete the room"))
        );
        f.lobby.delete_room(&id, 1).unwrap();
        assert!(f.lobby.rooms().get(&id).is_none());
        assert_eq!(f.lobby.rooms().membership(2), None);
        assert!(drain(&mut rx)
            .iter()
            .any(|m| matches!(m, ServerMessage::LobbyRoomLeave { reason: Some(_), .. })));

        // Name is free again
        f.lobby.create_room(1, &one_vs_one("Arena")).unwrap();
    }

    #[test]
    fn test_active_room_cannot_be_deleted() {
        let f = Fixture::new();
        let id = f.lobby.create_room(1, &one_vs_one("Arena")).unwrap();
        for p in [1, 2] {
            f.lobby.join_room(&id, p).unwrap();
            f.lobby.set_ready(&id, p, true).unwrap();
        }
        f.lobby.start_game(&id, 1).unwrap();
        assert_eq!(f.lobby.delete_room(&id, 1), Err(LobbyError::NotWaiting));
    }

    #[test]
    fn test_ready_noop_keeps_timestamp() {
        let f = Fixture::new();
        let mut rx = f.connect(1);
        let id = f.lobby.create_room(1, &one_vs_one("Arena")).unwrap();
        f.lobby.join_room(&id, 1).unwrap();

        f.clock.advance(10);
        f.lobby.set_ready(&id, 1, true).unwrap();
        assert_eq!(f.room(&id).last_update, 1_010);
        drain(&mut rx);

        f.clock.advance(10);
        f.lobby.set_ready(&id, 1, true).unwrap();
        assert_eq!(f.room(&id).last_update, 1_010);
        assert!(drain(&mut rx).is_empty());

        assert_eq!(f.lobby.set_ready(&id, 9, true), Err(LobbyError::NotInRoom));
    }

    #[test]
    fn test_start_preconditions() {
        let f = Fixture::new();
        let id = f.lobby.create_room(1, &tournament("Cup", 4)).unwrap();
        f.lobby.join_room(&id, 1).unwrap();

        assert!(matches!(
            f.lobby.start_game(&id, 1),
            Err(LobbyError::PlayersMissing { required: 4, connected: 1 })
        ));
        for p in [2, 3, 4] {
            f.lobby.join_room(&id, p).unwrap();
        }
        assert_eq!(f.lobby.start_game(&id, 2), Err(LobbyError::not_owner("start the game")));
        assert_eq!(f.lobby.start_game(&id, 1), Err(LobbyError::PlayersNotReady));

        for p in [1, 2, 3, 4] {
            f.lobby.set_ready(&id, p, true).unwrap();
        }
        f.lobby.start_game(&id, 1).unwrap();

        let room = f.room(&id);
        assert_eq!(room.status, RoomStatus::Active);
        assert_eq!(room.brackets.len(), 3);
        assert_eq!(room.brackets.iter().filter(|b| b.game.is_some()).count(), 2);
    }

    #[test]
    fn test_start_sends_game_join() {
        let f = Fixture::new();
        let mut rx = f.connect(2);
        let id = f.lobby.create_room(1, &one_vs_one("Arena")).unwrap();
        for p in [1, 2] {
            f.lobby.join_room(&id, p).unwrap();
            f.lobby.set_ready(&id, p, true).unwrap();
        }
        drain(&mut rx);

        f.lobby.start_game(&id, 1).unwrap();
        let game_id = f.room(&id).brackets[0].id.clone();
        assert!(drain(&mut rx).iter().any(|m| matches!(
            m,
            ServerMessage::GameRoomJoin { game_id: g, .. } if *g == game_id
        )));
    }

    #[test]
    fn test_active_room_join_only_for_members() {
        let f = Fixture::new();
        let id = f.lobby.create_room(1, &one_vs_one("Arena")).unwrap();
        for p in [1, 2] {
            f.lobby.join_room(&id, p).unwrap();
            f.lobby.set_ready(&id, p, true).unwrap();
        }
        f.lobby.start_game(&id, 1).unwrap();

        assert_eq!(f.lobby.join_room(&id, 3), Err(LobbyError::NotAMember));
        f.lobby.join_room(&id, 2).unwrap();
    }

    #[test]
    fn test_visibility_rules() {
        let f = Fixture::new();
        let public = f.lobby.create_room(1, &one_vs_one("Open")).unwrap();
        let friends_only = f
            .lobby
            .create_room(
                1,
                &RoomConfig {
                    visibility: Visibility::Friends,
                    ..one_vs_one("Private")
                },
            )
            .unwrap();

        // Stranger sees only the public room
        let listing = f.lobby.list_visible(2);
        assert_eq!(listing.rooms.len(), 1);
        assert_eq!(listing.rooms[0].id, public);
        assert!(!listing.rooms[0].is_friend);

        // Friend sees both
        f.social.befriend(1, 3);
        let listing = f.lobby.list_visible(3);
        assert_eq!(listing.rooms.len(), 2);
        assert!(listing.rooms.iter().all(|r| r.is_friend));

        // Owner sees their own private room
        assert!(f.lobby.list_visible(1).rooms.iter().any(|r| r.id == friends_only));

        // Blocked viewer sees nothing of the owner
        f.social.block(1, 4);
        assert!(f.lobby.list_visible(4).rooms.is_empty());
    }

    #[test]
    fn test_seated_room_is_pushed_not_listed() {
        let f = Fixture::new();
        let id = f.lobby.create_room(1, &one_vs_one("Arena")).unwrap();
        f.lobby.join_room(&id, 2).unwrap();

        let listing = f.lobby.list_visible(2);
        assert!(listing.rooms.is_empty());
        assert_eq!(listing.current.unwrap().id, id);
    }

    #[test]
    fn test_can_join_flag() {
        let f = Fixture::new();
        let id = f.lobby.create_room(1, &one_vs_one("Arena")).unwrap();
        f.lobby.join_room(&id, 2).unwrap();

        let listing = f.lobby.list_visible(3);
        assert_eq!(listing.rooms.len(), 1);
        assert!(!listing.rooms[0].can_join);
        assert!(f.lobby.list_visible(1).rooms[0].can_join);
    }

    #[test]
    fn test_invitable_rooms() {
        let f = Fixture::new();
        let id = f.lobby.create_room(1, &tournament("Cup", 4)).unwrap();
        f.lobby.join_room(&id, 1).unwrap();
        f.lobby.create_room(5, &one_vs_one("Duel")).unwrap();

        // Both rooms have free seats for player 2
        let rooms = f.lobby.invitable_rooms(1, 2);
        assert_eq!(rooms.len(), 2);
        assert!(rooms.iter().all(|r| r.can_join));

        // A target already seated elsewhere can join nothing else
        let duel = rooms.iter().find(|r| r.name == "Duel").unwrap().id.clone();
        f.lobby.join_room(&duel, 2).unwrap();
        let rooms = f.lobby.invitable_rooms(1, 2);
        assert!(rooms.iter().all(|r| r.id == duel));
    }

    #[test]
    fn test_expire_idle_rooms() {
        let f = Fixture::new();
        let mut rx = f.connect(2);
        let idle = f.lobby.create_room(1, &one_vs_one("Idle")).unwrap();
        f.lobby.join_room(&idle, 2).unwrap();

        f.clock.advance(10_000);
        let fresh = f.lobby.create_room(3, &one_vs_one("Fresh")).unwrap();
        drain(&mut rx);

        assert_eq!(f.lobby.expire_idle_rooms(f.clock.now_millis(), 10_000), 1);
        assert!(f.lobby.rooms().get(&idle).is_none());
        assert!(f.lobby.rooms().get(&fresh).is_some());
        assert_eq!(f.lobby.rooms().membership(2), None);

        let msgs = drain(&mut rx);
        assert!(msgs.iter().any(|m| matches!(
            m,
            ServerMessage::LobbyRoomLeave { reason: Some(r), .. } if r == "Room expired"
        )));
        assert!(msgs.iter().any(|m| matches!(m, ServerMessage::RoomsUpdate { .. })));
    }
}
