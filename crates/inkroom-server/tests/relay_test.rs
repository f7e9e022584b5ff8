//! End-to-end relay behaviour over real WebSocket connections.

use futures_util::{SinkExt, StreamExt};
use inkroom_core::protocol::{ClientMessage, ServerMessage, WireOperation};
use inkroom_server::AppState;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn start_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(AppState::new(64));
    tokio::spawn(async move {
        inkroom_server::serve(listener, state).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    client
}

async fn send(client: &mut Client, message: &ClientMessage) {
    let text = message.to_json().unwrap();
    client.send(Message::text(text)).await.unwrap();
}

/// Read frames until one matches, failing after a timeout.
async fn recv_until(
    client: &mut Client,
    mut matches: impl FnMut(&ServerMessage) -> bool,
) -> ServerMessage {
    tokio::time::timeout(TIMEOUT, async {
        loop {
            let frame = client.next().await.expect("connection closed").unwrap();
            let Message::Text(text) = frame else {
                continue;
            };
            let message = ServerMessage::from_json(text.as_str()).unwrap();
            if matches(&message) {
                return message;
            }
        }
    })
    .await
    .expect("timed out waiting for message")
}

/// Join and return the assigned peer id and the snapshot objects.
async fn join(client: &mut Client, room: &str) -> (String, Vec<serde_json::Value>) {
    send(
        client,
        &ClientMessage::JoinRoom {
            room_id: room.to_string(),
        },
    )
    .await;
    let ServerMessage::RoomSnapshot { objects } =
        recv_until(client, |m| matches!(m, ServerMessage::RoomSnapshot { .. })).await
    else {
        unreachable!();
    };
    let ServerMessage::Joined { peer_id, .. } =
        recv_until(client, |m| matches!(m, ServerMessage::Joined { .. })).await
    else {
        unreachable!();
    };
    (peer_id, objects)
}

fn add_rect(room: &str, id: &str) -> ClientMessage {
    ClientMessage::CanvasOperation {
        room_id: room.to_string(),
        op: WireOperation {
            action: Some("add".to_string()),
            object: Some(json!({
                "id": id, "type": "rect", "left": 0, "top": 0, "width": 10, "height": 10
            })),
        },
    }
}

#[tokio::test]
async fn test_health() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    tokio::io::AsyncWriteExt::write_all(
        &mut stream,
        b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await
    .unwrap();
    let mut response = String::new();
    tokio::io::AsyncReadExt::read_to_string(&mut stream, &mut response)
        .await
        .unwrap();
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("ok"));
}

#[tokio::test]
async fn test_operations_relay_to_other_members() {
    let addr = start_server().await;
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;

    let (alice_id, objects) = join(&mut alice, "room").await;
    assert!(objects.is_empty());
    join(&mut bob, "room").await;

    let joined = recv_until(&mut alice, |m| matches!(m, ServerMessage::PeerJoined { .. })).await;
    assert!(matches!(joined, ServerMessage::PeerJoined { .. }));

    send(&mut alice, &add_rect("room", "alice_1")).await;
    let relayed = recv_until(&mut bob, |m| matches!(m, ServerMessage::CanvasOperation { .. })).await;
    let ServerMessage::CanvasOperation { room_id, op } = relayed else {
        unreachable!();
    };
    assert_eq!(room_id, "room");
    assert_eq!(op.action.as_deref(), Some("add"));
    assert_eq!(op.object.unwrap()["id"], json!("alice_1"));

    send(
        &mut alice,
        &ClientMessage::CursorMove {
            room_id: "room".to_string(),
            x: 12.0,
            y: 34.0,
        },
    )
    .await;
    let cursor = recv_until(&mut bob, |m| matches!(m, ServerMessage::CursorMove { .. })).await;
    assert_eq!(
        cursor,
        ServerMessage::CursorMove {
            room_id: "room".to_string(),
            peer_id: alice_id,
            x: 12.0,
            y: 34.0,
        }
    );
}

#[tokio::test]
async fn test_late_joiner_gets_snapshot() {
    let addr = start_server().await;
    let mut alice = connect(addr).await;
    join(&mut alice, "room").await;

    send(&mut alice, &add_rect("room", "a")).await;
    send(&mut alice, &add_rect("room", "b")).await;
    send(
        &mut alice,
        &ClientMessage::CanvasOperation {
            room_id: "room".to_string(),
            op: WireOperation {
                action: Some("remove".to_string()),
                object: Some(json!({"id": "a"})),
            },
        },
    )
    .await;
    send(
        &mut alice,
        &ClientMessage::CanvasOperation {
            room_id: "room".to_string(),
            op: WireOperation {
                action: Some("modify".to_string()),
                object: Some(json!({"id": "b", "left": 99})),
            },
        },
    )
    .await;

    // Frames on one connection are handled in order; a bad frame after the
    // operations acts as a barrier.
    alice.send(Message::text("{}")).await.unwrap();
    recv_until(&mut alice, |m| matches!(m, ServerMessage::Error { .. })).await;

    let mut carol = connect(addr).await;
    let (_, objects) = join(&mut carol, "room").await;
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0]["id"], json!("b"));
    assert_eq!(objects[0]["left"], json!(99.0));
}

#[tokio::test]
async fn test_invalid_operation_gets_error() {
    let addr = start_server().await;
    let mut alice = connect(addr).await;

    // Not joined yet
    send(&mut alice, &add_rect("room", "a")).await;
    let error = recv_until(&mut alice, |m| matches!(m, ServerMessage::Error { .. })).await;
    assert!(matches!(error, ServerMessage::Error { message } if message.contains("not joined")));

    join(&mut alice, "room").await;
    send(
        &mut alice,
        &ClientMessage::CanvasOperation {
            room_id: "room".to_string(),
            op: WireOperation {
                action: Some("explode".to_string()),
                object: Some(json!({"id": "a"})),
            },
        },
    )
    .await;
    let error = recv_until(&mut alice, |m| matches!(m, ServerMessage::Error { .. })).await;
    assert!(matches!(error, ServerMessage::Error { message } if message.contains("explode")));
}

#[tokio::test]
async fn test_disconnect_announces_peer_left() {
    let addr = start_server().await;
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;
    join(&mut alice, "room").await;
    let (bob_id, _) = join(&mut bob, "room").await;

    bob.close(None).await.unwrap();
    let left = recv_until(&mut alice, |m| matches!(m, ServerMessage::PeerLeft { .. })).await;
    assert_eq!(left, ServerMessage::PeerLeft { peer_id: bob_id });
}

#[tokio::test]
async fn test_invalid_modify_never_reaches_snapshot() {
    let addr = start_server().await;
    let mut alice = connect(addr).await;
    join(&mut alice, "room").await;
    send(&mut alice, &add_rect("room", "a")).await;

    for object in [
        json!({"id": "a", "width": "wide"}),
        json!({"id": "a", "type": "circle", "left": 5}),
    ] {
        send(
            &mut alice,
            &ClientMessage::CanvasOperation {
                room_id: "room".to_string(),
                op: WireOperation {
                    action: Some("modify".to_string()),
                    object: Some(object),
                },
            },
        )
        .await;
    }
    let error = recv_until(&mut alice, |m| matches!(m, ServerMessage::Error { .. })).await;
    assert!(matches!(error, ServerMessage::Error { message } if message.contains("rejected modify")));

    alice.send(Message::text("{}")).await.unwrap();
    recv_until(&mut alice, |m| {
        matches!(m, ServerMessage::Error { message } if message.starts_with("invalid message"))
    })
    .await;

    let mut carol = connect(addr).await;
    let (_, objects) = join(&mut carol, "room").await;
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0]["type"], json!("rect"));
    assert_eq!(objects[0]["width"], json!(10.0));
    assert_eq!(objects[0]["left"], json!(5.0));
    let serde_json::Value::Object(record) = &objects[0] else {
        panic!("expected an object");
    };
    assert!(inkroom_core::shapes::Shape::from_record(record).is_ok());
}
