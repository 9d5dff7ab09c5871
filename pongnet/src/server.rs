//! PongNet server: owns the registries and services and routes inbound
//! messages.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::clock::{Clock, SystemClock};
use crate::config::{EngineConfig, ServerConfig};
use crate::error::{PongNetError, Result};
use crate::lobby::Lobby;
use crate::matches::Matches;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::room::{BasicPublicRoom, RoomRegistry};
use crate::scheduler::TickScheduler;
use crate::session::{ConnectionRegistry, Outbound};
use crate::social::{MemorySocial, SocialGraph};
use crate::storage::{GameStore, MemoryStore};
use crate::PlayerId;

/// Game server
pub struct PongServer {
    config: ServerConfig,
    rooms: Arc<RoomRegistry>,
    connections: Arc<ConnectionRegistry>,
    lobby: Arc<Lobby>,
    matches: Matches,
    scheduler: Arc<TickScheduler>,
}

impl PongServer {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    fn new(
        config: ServerConfig,
        store: Arc<dyn GameStore>,
        social: Arc<dyn SocialGraph>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let rooms = Arc::new(RoomRegistry::new());
        let connections = Arc::new(ConnectionRegistry::new());
        let engine = config.engine.clone();

        let lobby = Arc::new(Lobby::new(
            rooms.clone(),
            connections.clone(),
            social,
            clock.clone(),
        ));
        let matches = Matches::new(rooms.clone(), connections.clone(), clock.clone(), engine.clone());
        let scheduler = Arc::new(TickScheduler::new(
            lobby.clone(),
            connections.clone(),
            store,
            clock,
            engine,
        ));

        Self {
            config,
            rooms,
            connections,
            lobby,
            matches,
            scheduler,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn rooms(&self) -> &Arc<RoomRegistry> {
        &self.rooms
    }

    pub fn connections(&self) -> &Arc<ConnectionRegistry> {
        &self.connections
    }

    pub fn lobby(&self) -> &Lobby {
        &self.lobby
    }

    pub fn scheduler(&self) -> &Arc<TickScheduler> {
        &self.scheduler
    }

    /// Start the tick scheduler on the current runtime.
    pub fn spawn_scheduler(&self) -> JoinHandle<()> {
        tokio::spawn(self.scheduler.clone().run())
    }

    /// Register a player's connection and send the initial listing.
    pub fn connect(&self, player_id: PlayerId, display_name: String) -> (u64, Outbound) {
        let (conn_id, outbound) = self.connections.register(player_id, display_name);
        tracing::info!(player_id, conn_id, online = self.connections.count(), "player connected");
        self.lobby.send_listing(player_id);
        (conn_id, outbound)
    }

    /// Drop a connection. Live matches of the player are stopped unless a
    /// newer connection already replaced this one.
    pub fn disconnect(&self, player_id: PlayerId, conn_id: u64) {
        if !self.connections.unregister(player_id, conn_id) {
            tracing::debug!(player_id, conn_id, "stale connection closed");
            return;
        }
        let games = self.matches.disconnect_everywhere(player_id);
        tracing::info!(player_id, conn_id, games, "player disconnected");
    }

    /// Decode and handle one text frame.
    pub fn handle_text(&self, player_id: PlayerId, text: &str) {
        match ClientMessage::decode(text) {
            Ok(msg) => self.handle_message(player_id, msg),
            Err(e) => {
                tracing::warn!(player_id, error = %e, "rejected frame");
                self.connections.send(player_id, ServerMessage::error(e.to_string()));
            }
        }
    }

    /// Handle one decoded message, replying with the matching error message
    /// on failure.
    pub fn handle_message(&self, player_id: PlayerId, msg: ClientMessage) {
        let kind = msg.kind();
        tracing::debug!(player_id, kind, "handling message");

        if let Err(e) = self.dispatch(player_id, msg) {
            tracing::warn!(player_id, kind, error = %e, "request rejected");
            self.connections.send(player_id, error_reply(e));
        }
    }

    fn dispatch(&self, player_id: PlayerId, msg: ClientMessage) -> Result<()> {
        match msg {
            ClientMessage::NewGameConfig(config) => {
                self.lobby.create_room(player_id, &config)?;
            }
            ClientMessage::LobbyRoomJoinRequest { room_id } => {
                self.lobby.join_room(&room_id, player_id)?;
            }
            ClientMessage::LobbyRoomPlayerSetReady { room_id, ready } => {
                self.lobby.set_ready(&room_id, player_id, ready)?;
            }
            ClientMessage::LobbyRoomStartGame { room_id } => {
                self.lobby.start_game(&room_id, player_id)?;
            }
            ClientMessage::LobbyRoomDelete { room_id } => {
                self.lobby.delete_room(&room_id, player_id)?;
            }
            ClientMessage::LobbyRoomLeave { room_id } => {
                self.lobby.leave_room(&room_id, player_id)?;
            }
            ClientMessage::GameRoomJoin { room_id, game_id } => {
                self.matches.join_game(&room_id, &game_id, player_id)?;
            }
            ClientMessage::GameRoomPlayerSetReady {
                room_id,
                game_id,
                ready,
            } => {
                self.matches.set_ready(&room_id, &game_id, player_id, ready)?;
            }
            ClientMessage::GameRoomPlayerInput {
                room_id,
                game_id,
                up,
                down,
            } => {
                self.matches.set_input(&room_id, &game_id, player_id, up, down)?;
            }
            ClientMessage::GameRoomLeave { room_id, game_id } => {
                self.matches.leave_game(&room_id, &game_id, player_id)?;
            }
            ClientMessage::RoomsListRequest => {
                self.lobby.send_listing(player_id);
            }
        }
        Ok(())
    }

    /// Rooms the requester can see that `target` could join.
    pub fn rooms_for_invite(&self, requester: PlayerId, target: PlayerId) -> Vec<BasicPublicRoom> {
        self.lobby.invitable_rooms(requester, target)
    }
}

fn error_reply(err: PongNetError) -> ServerMessage {
    match err {
        PongNetError::Lobby(e) if e.is_config_error() => ServerMessage::ErrorNewGameConfig {
            error: e.to_string(),
        },
        PongNetError::Lobby(e) => ServerMessage::lobby_error(e),
        PongNetError::Game(e) => ServerMessage::game_error(e),
        other => ServerMessage::error(other.to_string()),
    }
}

/// Server builder for configuration
pub struct ServerBuilder {
    config: ServerConfig,
    store: Option<Arc<dyn GameStore>>,
    social: Option<Arc<dyn SocialGraph>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            store: None,
            social: None,
            clock: None,
        }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn engine(mut self, engine: EngineConfig) -> Self {
        self.config.engine = engine;
        self
    }

    pub fn store(mut self, store: Arc<dyn GameStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn social(mut self, social: Arc<dyn SocialGraph>) -> Self {
        self.social = Some(social);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Arc<PongServer> {
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let social = self.social.unwrap_or_else(|| Arc::new(MemorySocial::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        Arc::new(PongServer::new(self.config, store, social, clock))
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
