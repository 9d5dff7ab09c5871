//! Game-room operations: attaching to a match, ready flags, paddle input
//! and leaving.

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::game::{Game, GameError, Result};
use crate::protocol::ServerMessage;
use crate::room::{Room, RoomRegistry, RoomStatus};
use crate::session::ConnectionRegistry;
use crate::PlayerId;

/// Push the match state to every participant currently attached to it.
pub fn push_game(connections: &ConnectionRegistry, game: &Game) {
    let msg = ServerMessage::game_update(game);
    for player in [&game.left, &game.right] {
        if player.connected {
            connections.send(player.id, msg.clone());
        }
    }
}

/// Match operations service.
pub struct Matches {
    rooms: Arc<RoomRegistry>,
    connections: Arc<ConnectionRegistry>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl Matches {
    pub fn new(
        rooms: Arc<RoomRegistry>,
        connections: Arc<ConnectionRegistry>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            rooms,
            connections,
            clock,
            config,
        }
    }

    /// Lock the room and run `f` on the match.
    fn with_game<T>(
        &self,
        room_id: &str,
        game_id: &str,
        f: impl FnOnce(&mut Game) -> Result<T>,
    ) -> Result<T> {
        let handle = self
            .rooms
            .get(room_id)
            .ok_or_else(|| GameError::RoomNotFound(room_id.to_string()))?;
        let mut room = handle.lock();
        let game = room
            .game_mut(game_id)
            .ok_or_else(|| GameError::NotFound(game_id.to_string()))?;
        f(game)
    }

    /// Attach a participant to a match (first join or reconnect).
    pub fn join_game(&self, room_id: &str, game_id: &str, player_id: PlayerId) -> Result<()> {
        let now = self.clock.now_millis();
        let countdown = self.config.start_countdown_ms;

        self.with_game(room_id, game_id, |game| {
            game.connect(player_id, now, countdown)?;
            self.connections.send(
                player_id,
                ServerMessage::GameRoomJoin {
                    room_id: room_id.to_string(),
                    game_id: game_id.to_string(),
                },
            );
            if game.is_completed() {
                self.connections.send(player_id, ServerMessage::game_update(game));
            } else {
                push_game(&self.connections, game);
            }
            tracing::debug!(room_id, game_id, player_id, "player joined game");
            Ok(())
        })
    }

    /// Set a participant's ready flag. The same value twice is a no-op.
    pub fn set_ready(&self, room_id: &str, game_id: &str, player_id: PlayerId, ready: bool) -> Result<()> {
        let now = self.clock.now_millis();
        let countdown = self.config.start_countdown_ms;

        self.with_game(room_id, game_id, |game| {
            if game.set_ready(player_id, ready, now, countdown)? {
                push_game(&self.connections, game);
            }
            Ok(())
        })
    }

    /// Store paddle input for the next tick.
    pub fn set_input(&self, room_id: &str, game_id: &str, player_id: PlayerId, up: bool, down: bool) -> Result<()> {
        self.with_game(room_id, game_id, |game| game.set_input(player_id, up, down))
    }

    /// Detach a participant; treated like a disconnect.
    pub fn leave_game(&self, room_id: &str, game_id: &str, player_id: PlayerId) -> Result<()> {
        let now = self.clock.now_millis();

        self.with_game(room_id, game_id, |game| {
            let changed = game.disconnect(player_id, now)?;
            self.connections.send(
                player_id,
                ServerMessage::GameRoomLeave {
                    room_id: room_id.to_string(),
                },
            );
            if changed {
                push_game(&self.connections, game);
            }
            Ok(())
        })
    }

    /// Propagate a closed socket to every live match the player is in.
    /// Returns the number of matches affected.
    pub fn disconnect_everywhere(&self, player_id: PlayerId) -> usize {
        let now = self.clock.now_millis();
        let mut affected = 0;

        for handle in self.rooms.handles() {
            let mut room = handle.lock();
            if room.status != RoomStatus::Active {
                continue;
            }
            affected += disconnect_in_room(&mut room, player_id, now, &self.connections);
        }

        if affected > 0 {
            tracing::info!(player_id, games = affected, "player disconnected from games");
        }
        affected
    }
}

fn disconnect_in_room(room: &mut Room, player_id: PlayerId, now: i64, connections: &ConnectionRegistry) -> usize {
    let mut affected = 0;
    for game in room.brackets.iter_mut().filter_map(|b| b.game.as_mut()) {
        if !game.has_player(player_id) || game.is_completed() {
            continue;
        }
        if let Ok(true) = game.disconnect(player_id, now) {
            push_game(connections, game);
            affected += 1;
        }
    }
    affected
}
