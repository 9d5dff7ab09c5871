//! # PongNet
//!
//! Authoritative server for a two-paddle ball game with lobbies, 1v1 rooms
//! and single-elimination tournaments.
//!
//! ## Features
//!
//! - **Lobbies**: Named rooms with owner, visibility and ready-state tracking
//! - **Brackets**: Tournament dependency graph with lazy winner propagation
//! - **Matches**: Fixed-tick physics simulation, one state machine per match
//! - **Disconnects**: Grace-period accounting with forced forfeits
//! - **Persistence hand-off**: History and stats written once per finished room
//!
//! ## Example
//!
//! ```rust,ignore
//! use pongnet::{PongServer, ServerConfig};
//!
//! let server = PongServer::builder()
//!     .config(ServerConfig::from_env()?)
//!     .build();
//!
//! server.spawn_scheduler();
//! pongnet::transport::serve(server, "0.0.0.0:7350").await?;
//! ```

pub mod bracket;
pub mod clock;
pub mod config;
pub mod error;
pub mod game;
pub mod lobby;
pub mod matches;
pub mod outcome;
pub mod protocol;
pub mod room;
pub mod scheduler;
pub mod server;
pub mod session;
pub mod social;
pub mod storage;
pub mod telemetry;

#[cfg(feature = "http")]
pub mod transport;

/// Player identifier issued by the external account service. `0` marks an
/// undetermined bracket slot and is never a valid player.
pub type PlayerId = u64;

/// Placeholder for a bracket slot whose player is not known yet.
pub const UNDETERMINED: PlayerId = 0;

// Re-exports
pub use bracket::Bracket;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, ServerConfig};
pub use error::{PongNetError, Result};
pub use game::{Game, GameState, Side};
pub use lobby::{Lobby, LobbyError};
pub use matches::Matches;
pub use protocol::{ClientMessage, ServerMessage};
pub use room::{BasicPublicRoom, LobbyType, Room, RoomConfig, RoomRegistry, RoomStatus, Visibility};
pub use scheduler::TickScheduler;
pub use server::{PongServer, ServerBuilder};
pub use session::ConnectionRegistry;
pub use social::{MemorySocial, SocialGraph};
pub use storage::{GameHistoryRecord, GameStore, MemoryStore, StoreError, UserStats};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_roundtrip() {
        let msg = ClientMessage::LobbyRoomJoinRequest {
            room_id: "abc".into(),
        };
        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded = ClientMessage::decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_connection_lifecycle() {
        let registry = ConnectionRegistry::new();

        let (conn, _rx) = registry.register(7, "Alice".into());
        assert_eq!(registry.count(), 1);
        assert!(registry.is_connected(7));

        registry.unregister(7, conn);
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_room_lifecycle() {
        let registry = RoomRegistry::new();
        let room = Room::new(
            "Arena".into(),
            LobbyType::OneVsOne,
            Visibility::Public,
            1,
            2,
            0,
        );
        let id = room.id.clone();
        registry.insert(room);
        assert_eq!(registry.count(), 1);

        let handle = registry.get(&id).unwrap();
        {
            let mut room = handle.lock();
            room.add_player(room::LobbyPlayer::new(1, "Alice"));
            assert_eq!(room.connected_players_number, 1);
        }

        registry.remove(&handle.lock());
        assert_eq!(registry.count(), 0);
    }
}
