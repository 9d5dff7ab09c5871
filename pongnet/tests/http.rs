#![cfg(feature = "http")]

//! Router tests without a listening socket.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use pongnet::transport::{router, InviteResponse};
use pongnet::{LobbyType, PongServer, RoomConfig, Visibility};
use tower::ServiceExt;

fn server_with_room() -> (Arc<PongServer>, String) {
    let server = PongServer::builder().build();
    let room_id = server
        .lobby()
        .create_room(
            1,
            &RoomConfig {
                room_name: "Arena".into(),
                room_type: LobbyType::Tournament,
                visibility: Visibility::Public,
                players_number: Some(4),
            },
        )
        .unwrap();
    (server, room_id)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (server, _) = server_with_room();
    let response = router(server)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_invite_requires_identity() {
    let (server, _) = server_with_room();
    let app = router(server);

    let response = app
        .clone()
        .oneshot(
            Request::post("/games/rooms")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"targetId":2}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            Request::post("/games/rooms")
                .header("x-user-id", "0")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"targetId":2}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invite_lists_joinable_rooms() {
    let (server, room_id) = server_with_room();
    let response = router(server)
        .oneshot(
            Request::post("/games/rooms")
                .header("x-user-id", "1")
                .header("x-display-name", "Alice")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"targetId":2}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: InviteResponse = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(body.rooms.len(), 1);
    assert_eq!(body.rooms[0].id, room_id);
    assert!(body.rooms[0].can_join);
}

#[tokio::test]
async fn test_ws_route_requires_identity() {
    let (server, _) = server_with_room();
    let response = router(server)
        .oneshot(Request::get("/ws").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}
