//! HTTP/WebSocket surface.
//!
//! - `GET /ws`: upgrade to the game socket, JSON text frames both ways
//! - `POST /games/rooms`: rooms a target player could be invited to
//! - `GET /health`: liveness
//!
//! Authentication happens upstream; the gateway forwards the player as
//! `x-user-id` and, optionally, `x-display-name`.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{Sink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::Result;
use crate::room::BasicPublicRoom;
use crate::server::PongServer;
use crate::session::Outbound;
use crate::{PlayerId, UNDETERMINED};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const DISPLAY_NAME_HEADER: &str = "x-display-name";

/// How long a closing socket may take to flush queued messages.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Authenticated caller, taken from the gateway headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub player_id: PlayerId,
    pub display_name: String,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        let player_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<PlayerId>().ok())
            .filter(|id| *id != UNDETERMINED)
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let display_name = parts
            .headers
            .get(DISPLAY_NAME_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .unwrap_or_default();

        Ok(Self {
            player_id,
            display_name,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequest {
    pub target_id: PlayerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteResponse {
    pub rooms: Vec<BasicPublicRoom>,
}

/// Build the router for `server`.
pub fn router(server: Arc<PongServer>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/games/rooms", post(invite_rooms))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(server)
}

/// Bind `addr` and serve until the listener fails.
pub async fn serve(server: Arc<PongServer>, addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "pongnet listening");
    axum::serve(listener, router(server)).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn invite_rooms(
    State(server): State<Arc<PongServer>>,
    identity: Identity,
    Json(req): Json<InviteRequest>,
) -> Json<InviteResponse> {
    let rooms = server.rooms_for_invite(identity.player_id, req.target_id);
    Json(InviteResponse { rooms })
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    identity: Identity,
    State(server): State<Arc<PongServer>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, server, identity))
}

async fn handle_socket(socket: WebSocket, server: Arc<PongServer>, identity: Identity) {
    let Identity {
        player_id,
        display_name,
    } = identity;
    let (sink, mut stream) = socket.split();
    let (conn_id, outbound) = server.connect(player_id, display_name);

    let mut writer = tokio::spawn(forward_outbound(sink, outbound, player_id));

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => server.handle_text(player_id, &text),
            Ok(Message::Close(_)) => break,
            Ok(Message::Binary(_)) => {
                tracing::debug!(player_id, "binary frame ignored");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(player_id, error = %e, "socket error");
                break;
            }
        }
    }

    // Unregistering drops the sender, so the writer flushes what is queued
    // and then closes the socket.
    server.disconnect(player_id, conn_id);
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
        tracing::debug!(player_id, "socket writer did not drain in time");
        writer.abort();
    }
}

/// Write queued messages to `sink` until the channel closes, then close the
/// sink. Returns the sink.
async fn forward_outbound<S>(mut sink: S, mut outbound: Outbound, player_id: PlayerId) -> S
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    while let Some(msg) = outbound.recv().await {
        let text = match msg.encode() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(player_id, error = %e, "failed to encode outbound message");
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(text)).await {
            tracing::debug!(player_id, error = %e, "socket send failed");
            break;
        }
    }
    if let Err(e) = sink.close().await {
        tracing::debug!(player_id, error = %e, "socket close failed");
    }
    sink
}
