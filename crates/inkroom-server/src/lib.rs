//! InkRoom WebSocket Relay Server
//!
//! Holds authoritative in-memory room state and relays operations and cursor
//! positions between the peers of a room.
//!
//! ## Protocol
//!
//! JSON text frames tagged by `type`:
//! ```json
//! { "type": "join-room", "roomId": "room-id" }
//! { "type": "canvas-operation", "roomId": "room-id", "op": { "action": "add", "object": { "id": "..." } } }
//! { "type": "cursor-move", "roomId": "room-id", "x": 100, "y": 200 }
//! ```
//!
//! A join is answered with `room-snapshot` followed by `joined`.

pub mod config;
pub mod rooms;

pub use config::{ConfigError, ServerConfig};
pub use rooms::{AppState, ObjectStore};

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use inkroom_core::protocol::{ClientMessage, Operation, ServerMessage};
use rooms::RoomMessage;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

type WsSender = SplitSink<WebSocket, Message>;

/// Build the HTTP router.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until the listener fails.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    axum::serve(listener, app(state)).await
}

/// Index page
async fn index() -> &'static str {
    "InkRoom Relay Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade handler
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One peer's membership, as seen by the relay.
struct Connection {
    peer_id: String,
    state: Arc<AppState>,
    current_room: Option<String>,
    room_rx: Option<broadcast::Receiver<RoomMessage>>,
}

impl Connection {
    fn new(state: Arc<AppState>) -> Self {
        Self {
            peer_id: Uuid::new_v4().to_string(),
            state,
            current_room: None,
            room_rx: None,
        }
    }

    async fn handle_text(&mut self, text: &str, sender: &mut WsSender) -> Result<(), axum::Error> {
        let message = match ClientMessage::from_json(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Invalid message from {}: {}", self.peer_id, e);
                return reply_error(sender, format!("invalid message: {e}")).await;
            }
        };

        match message {
            ClientMessage::JoinRoom { room_id } => self.join(room_id, sender).await,
            ClientMessage::LeaveRoom => {
                self.leave();
                Ok(())
            }
            ClientMessage::CanvasOperation { room_id, op } => {
                if self.current_room.as_deref() != Some(room_id.as_str()) {
                    return reply_error(sender, format!("not joined to room {room_id}")).await;
                }
                let operation = match Operation::from_wire(&op) {
                    Ok(operation) => operation,
                    Err(e) => {
                        warn!("Rejected operation from {}: {}", self.peer_id, e);
                        return reply_error(sender, format!("invalid operation: {e}")).await;
                    }
                };
                if let Err(e) = self
                    .state
                    .apply_operation(&room_id, &self.peer_id, &operation, op)
                {
                    warn!("Rejected operation from {}: {}", self.peer_id, e);
                    return reply_error(sender, e.to_string()).await;
                }
                debug!(
                    "{} {} {} in {}",
                    self.peer_id,
                    operation.action(),
                    operation.id(),
                    room_id
                );
                Ok(())
            }
            ClientMessage::CursorMove { room_id, x, y } => {
                if self.current_room.as_deref() == Some(room_id.as_str()) {
                    self.state.broadcast(
                        &room_id,
                        &self.peer_id,
                        ServerMessage::CursorMove {
                            room_id: room_id.clone(),
                            peer_id: self.peer_id.clone(),
                            x,
                            y,
                        },
                    );
                }
                Ok(())
            }
        }
    }

    async fn join(&mut self, room_id: String, sender: &mut WsSender) -> Result<(), axum::Error> {
        self.leave();

        let membership = self.state.join(&room_id, &self.peer_id);
        self.room_rx = Some(membership.rx);
        self.current_room = Some(room_id.clone());

        send_message(
            sender,
            &ServerMessage::RoomSnapshot {
                objects: membership.snapshot,
            },
        )
        .await?;
        send_message(
            sender,
            &ServerMessage::Joined {
                room_id: room_id.clone(),
                peer_id: self.peer_id.clone(),
                peer_count: membership.peer_count,
            },
        )
        .await?;

        self.state.broadcast(
            &room_id,
            &self.peer_id,
            ServerMessage::PeerJoined {
                peer_id: self.peer_id.clone(),
            },
        );
        info!("Peer {} joined room {}", self.peer_id, room_id);
        Ok(())
    }

    fn leave(&mut self) {
        self.room_rx = None;
        let Some(room_id) = self.current_room.take() else {
            return;
        };
        if self.state.leave(&room_id, &self.peer_id) {
            self.state.broadcast(
                &room_id,
                &self.peer_id,
                ServerMessage::PeerLeft {
                    peer_id: self.peer_id.clone(),
                },
            );
            info!("Peer {} left room {}", self.peer_id, room_id);
        }
    }

    /// Next message relayed from the current room by another peer. A peer
    /// that fell behind the broadcast buffer gets a fresh `room-snapshot`
    /// instead of the messages it missed.
    async fn next_relayed(&mut self) -> Option<ServerMessage> {
        loop {
            let Some(rx) = &mut self.room_rx else {
                // No room joined, just wait forever
                return std::future::pending().await;
            };
            match rx.recv().await {
                // Don't echo back to sender
                Ok((from, _)) if from == self.peer_id => {}
                Ok((_, message)) => return Some(message),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "Peer {} lagged, skipped {} message(s); resending snapshot",
                        self.peer_id, skipped
                    );
                    let membership = self
                        .current_room
                        .as_deref()
                        .and_then(|room_id| self.state.resubscribe(room_id));
                    let Some(membership) = membership else {
                        self.room_rx = None;
                        return None;
                    };
                    self.room_rx = Some(membership.rx);
                    return Some(ServerMessage::RoomSnapshot {
                        objects: membership.snapshot,
                    });
                }
                Err(RecvError::Closed) => {
                    self.room_rx = None;
                    return None;
                }
            }
        }
    }
}

async fn send_message(sender: &mut WsSender, message: &ServerMessage) -> Result<(), axum::Error> {
    match message.to_json() {
        Ok(json) => sender.send(Message::Text(json.into())).await,
        Err(e) => {
            warn!("Failed to encode {:?}: {}", message, e);
            Ok(())
        }
    }
}

async fn reply_error(sender: &mut WsSender, message: String) -> Result<(), axum::Error> {
    send_message(sender, &ServerMessage::Error { message }).await
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let mut connection = Connection::new(state);
    info!("New connection: {}", connection.peer_id);

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            // Handle incoming messages from client
            msg = receiver.next() => {
                let result = match msg {
                    Some(Ok(Message::Text(text))) => {
                        connection.handle_text(text.as_str(), &mut sender).await
                    }
                    Some(Ok(Message::Binary(_))) => {
                        reply_error(&mut sender, "binary frames are not supported".to_string()).await
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => Ok(()), // Ignore ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", connection.peer_id, e);
                        break;
                    }
                };
                if result.is_err() {
                    break;
                }
            }

            // Handle broadcast messages from room
            relayed = connection.next_relayed() => {
                if let Some(message) = relayed {
                    if send_message(&mut sender, &message).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    // Cleanup on disconnect
    connection.leave();
    info!("Connection closed: {}", connection.peer_id);
}
