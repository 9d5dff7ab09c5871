//! Wire protocol for PongNet.
//!
//! Every frame is a JSON object whose `type` field names the message, with
//! the remaining fields at the same level:
//!
//! ```json
//! {"type": "lobby-room-join-request", "roomId": "6f1c..."}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::game::Game;
use crate::room::{BasicPublicRoom, Room, RoomConfig};

/// Wire decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("message has no type")]
    MissingType,

    #[error("unknown message type: {0}")]
    UnknownType(String),
}

/// Client -> server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    NewGameConfig(RoomConfig),
    LobbyRoomJoinRequest { room_id: String },
    LobbyRoomPlayerSetReady { room_id: String, ready: bool },
    LobbyRoomStartGame { room_id: String },
    LobbyRoomDelete { room_id: String },
    LobbyRoomLeave { room_id: String },
    GameRoomJoin { room_id: String, game_id: String },
    GameRoomPlayerSetReady { room_id: String, game_id: String, ready: bool },
    GameRoomPlayerInput { room_id: String, game_id: String, up: bool, down: bool },
    GameRoomLeave { room_id: String, game_id: String },
    RoomsListRequest,
}

impl ClientMessage {
    pub const TAGS: [&'static str; 11] = [
        "new-game-config",
        "lobby-room-join-request",
        "lobby-room-player-set-ready",
        "lobby-room-start-game",
        "lobby-room-delete",
        "lobby-room-leave",
        "game-room-join",
        "game-room-player-set-ready",
        "game-room-player-input",
        "game-room-leave",
        "rooms-list-request",
    ];

    /// Decode a text frame, telling unknown message types apart from known
    /// ones with bad fields.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingType)?;
        if !Self::TAGS.contains(&tag) {
            return Err(ProtocolError::UnknownType(tag.to_string()));
        }

        serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    /// Message tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewGameConfig(_) => Self::TAGS[0],
            Self::LobbyRoomJoinRequest { .. } => Self::TAGS[1],
            Self::LobbyRoomPlayerSetReady { .. } => Self::TAGS[2],
            Self::LobbyRoomStartGame { .. } => Self::TAGS[3],
            Self::LobbyRoomDelete { .. } => Self::TAGS[4],
            Self::LobbyRoomLeave { .. } => Self::TAGS[5],
            Self::GameRoomJoin { .. } => Self::TAGS[6],
            Self::GameRoomPlayerSetReady { .. } => Self::TAGS[7],
            Self::GameRoomPlayerInput { .. } => Self::TAGS[8],
            Self::GameRoomLeave { .. } => Self::TAGS[9],
            Self::RoomsListRequest => Self::TAGS[10],
        }
    }
}

/// Server -> client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    LobbyRoomJoin {
        room_id: String,
    },
    LobbyRoomDataUpdate(Box<Room>),
    LobbyRoomError {
        error: String,
    },
    LobbyRoomLeave {
        room_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    RoomsUpdate {
        rooms: Vec<BasicPublicRoom>,
    },
    GameRoomJoin {
        room_id: String,
        game_id: String,
    },
    GameRoomDataUpdate(Box<Game>),
    GameRoomError {
        error: String,
    },
    GameRoomLeave {
        room_id: String,
    },
    ErrorNewGameConfig {
        error: String,
    },
    Error {
        error: String,
    },
}

impl ServerMessage {
    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
        }
    }

    pub fn lobby_error(error: impl ToString) -> Self {
        Self::LobbyRoomError {
            error: error.to_string(),
        }
    }

    pub fn game_error(error: impl ToString) -> Self {
        Self::GameRoomError {
            error: error.to_string(),
        }
    }

    pub fn game_update(game: &Game) -> Self {
        Self::GameRoomDataUpdate(Box::new(game.clone()))
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
