//! Synchronization between the local room replica and the broker.
//!
//! Local mutations are applied first and then broadcast (optimistic, no
//! rollback). Inbound operations are applied in delivery order, last writer
//! wins per shape. A fresh snapshot on every (re)join is the only recovery
//! mechanism; nothing is retried.

use crate::config::ClientConfig;
use crate::document::RoomState;
use crate::event::CanvasEvent;
use crate::presence::PresenceChannel;
use crate::protocol::{ClientMessage, Operation, ServerMessage};
use crate::shapes::{IdGenerator, Shape, ShapeError, ShapeId, ShapeRecord};
use crate::tools::ToolKind;
use kurbo::Point;
use serde_json::Value;
use std::time::Instant;
use thiserror::Error;

/// Local precondition failures when emitting operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("shape has no id; operation not sent")]
    MissingShapeId,
    #[error("not joined to a room; operation not sent")]
    NotJoined,
    #[error("unknown shape: {0}")]
    UnknownShape(ShapeId),
    #[error("patch rejected: {0}")]
    InvalidPatch(#[from] ShapeError),
}

/// What an inbound operation did to the local replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Inserted,
    /// `add` for an id we already had, applied as a modify.
    Merged,
    Modified,
    Removed,
    /// `modify` or `remove` for an id we don't have; dropped.
    UnknownId,
    /// Fields in the payload had invalid values; dropped.
    Rejected,
}

/// Owns the local room replica and presence, and the queue of outbound
/// messages.
///
/// Every durable mutation of [`RoomState`] goes through this type. Transport
/// is not its concern: the session drains [`SyncClient::take_outgoing`].
#[derive(Debug)]
pub struct SyncClient {
    room: RoomState,
    presence: PresenceChannel,
    ids: IdGenerator,
    room_id: Option<String>,
    joined: bool,
    /// Tool in effect on this client; decides interactivity of arriving shapes.
    tool: ToolKind,
    outgoing: Vec<ClientMessage>,
    events: Vec<CanvasEvent>,
}

impl SyncClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_ids(IdGenerator::random(), config)
    }

    pub fn with_ids(ids: IdGenerator, config: &ClientConfig) -> Self {
        Self {
            room: RoomState::new(),
            presence: PresenceChannel::new(config.cursor_throttle()),
            ids,
            room_id: None,
            joined: false,
            tool: ToolKind::default(),
            outgoing: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn room(&self) -> &RoomState {
        &self.room
    }

    pub fn presence(&self) -> &PresenceChannel {
        &self.presence
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub fn is_joined(&self) -> bool {
        self.joined
    }

    /// Peer id assigned by the broker on join.
    pub fn peer_id(&self) -> Option<&str> {
        self.presence.self_id()
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    /// Allocate an id for a new shape.
    pub fn next_id(&mut self) -> ShapeId {
        self.ids.next_id()
    }

    /// Record the active tool and update which shapes are selectable.
    pub fn set_tool(&mut self, tool: ToolKind) {
        if self.tool == tool {
            return;
        }
        self.tool = tool;
        self.room.set_interactive_all(tool == ToolKind::Select);
        self.events.push(CanvasEvent::RenderRequested);
    }

    // --- Room membership ---

    /// Queue a join request for `room_id`.
    pub fn begin_join(&mut self, room_id: &str) {
        self.room_id = Some(room_id.to_string());
        self.joined = false;
        self.outgoing.push(ClientMessage::JoinRoom {
            room_id: room_id.to_string(),
        });
    }

    pub(crate) fn mark_joined(&mut self, peer_id: String) {
        self.joined = true;
        self.presence.set_self_id(Some(peer_id));
    }

    /// The transport is gone. Anything not yet handed over is dropped; the
    /// next snapshot restores consistency.
    pub fn mark_disconnected(&mut self) {
        self.joined = false;
        if !self.outgoing.is_empty() {
            log::warn!(
                "dropping {} outbound message(s) after disconnect",
                self.outgoing.len()
            );
            self.outgoing.clear();
        }
    }

    /// Leave the current room. Remote cursors are cleared; shapes stay until
    /// the next bootstrap.
    pub fn leave(&mut self) {
        if self.joined {
            self.outgoing.push(ClientMessage::LeaveRoom);
        }
        self.joined = false;
        self.room_id = None;
        self.presence.set_self_id(None);
        if !self.presence.is_empty() {
            self.presence.clear();
            self.events.push(CanvasEvent::RenderRequested);
        }
    }

    // --- Outbound ---

    /// Broadcast an `add`. The caller has already applied it locally.
    pub fn send_add(&mut self, shape: &Shape) -> Result<(), SyncError> {
        self.send_operation(Operation::add(shape.clone()))
    }

    /// Broadcast a `modify` carrying `patch`.
    pub fn send_modify(&mut self, id: &ShapeId, patch: ShapeRecord) -> Result<(), SyncError> {
        self.send_operation(Operation::Modify {
            id: id.clone(),
            patch,
        })
    }

    /// Broadcast a `remove`.
    pub fn send_remove(&mut self, id: &ShapeId) -> Result<(), SyncError> {
        self.send_operation(Operation::Remove { id: id.clone() })
    }

    fn send_operation(&mut self, op: Operation) -> Result<(), SyncError> {
        if op.id().is_empty() {
            log::error!("refusing to send {} for a shape without id", op.action());
            return Err(SyncError::MissingShapeId);
        }
        let room_id = match (&self.room_id, self.joined) {
            (Some(room_id), true) => room_id.clone(),
            _ => {
                log::warn!("dropping {} of {}: not joined", op.action(), op.id());
                return Err(SyncError::NotJoined);
            }
        };
        self.outgoing.push(ClientMessage::CanvasOperation {
            room_id,
            op: op.to_wire(),
        });
        Ok(())
    }

    /// Insert a newly drawn shape and broadcast it.
    ///
    /// The local insert happens even when the send fails with
    /// [`SyncError::NotJoined`].
    pub fn commit_add(&mut self, mut shape: Shape) -> Result<(), SyncError> {
        if shape.id().is_empty() {
            log::error!("refusing to commit a {} without id", shape.kind().as_str());
            return Err(SyncError::MissingShapeId);
        }
        shape.set_interactive(self.tool == ToolKind::Select);
        let id = shape.id().clone();
        if self.room.insert(shape).is_some() {
            log::warn!("local add replaced existing shape {id}");
        }
        self.events.push(CanvasEvent::ShapeAdded(id.clone()));
        self.events.push(CanvasEvent::RenderRequested);

        let Some(shape) = self.room.get(&id).cloned() else {
            return Err(SyncError::UnknownShape(id));
        };
        self.send_add(&shape)
    }

    /// Apply a partial update locally and broadcast the same patch.
    pub fn commit_modify(&mut self, id: &ShapeId, patch: ShapeRecord) -> Result<(), SyncError> {
        if id.is_empty() {
            log::error!("refusing to commit a modify without id");
            return Err(SyncError::MissingShapeId);
        }
        let shape = self
            .room
            .get_mut(id)
            .ok_or_else(|| SyncError::UnknownShape(id.clone()))?;
        shape.apply_patch(&patch)?;
        self.events.push(CanvasEvent::ShapeModified(id.clone()));
        self.events.push(CanvasEvent::RenderRequested);
        self.send_modify(id, patch)
    }

    /// Replace several shapes with their updated versions and broadcast one
    /// `modify` per shape, each carrying the shape's full property set.
    ///
    /// Shapes no longer in the room are skipped. Returns how many were
    /// applied locally.
    pub fn commit_modified_shapes(&mut self, shapes: Vec<Shape>) -> usize {
        let mut applied = 0;
        for mut shape in shapes {
            let id = shape.id().clone();
            let Some(existing) = self.room.get_mut(&id) else {
                log::warn!("skipping modify of {id}: no longer in room");
                continue;
            };
            shape.set_interactive(existing.is_interactive());
            *existing = shape;
            applied += 1;
            self.events.push(CanvasEvent::ShapeModified(id.clone()));

            let Some(mut record) = self.room.get(&id).map(Shape::to_record) else {
                continue;
            };
            record.remove("id");
            if let Err(e) = self.send_modify(&id, record) {
                log::debug!("modify of {id} applied locally only: {e}");
            }
        }
        if applied > 0 {
            self.events.push(CanvasEvent::RenderRequested);
        }
        applied
    }

    /// Remove a shape locally and broadcast the removal.
    pub fn commit_remove(&mut self, id: &ShapeId) -> Result<(), SyncError> {
        if id.is_empty() {
            log::error!("refusing to commit a remove without id");
            return Err(SyncError::MissingShapeId);
        }
        if self.room.remove(id).is_none() {
            return Err(SyncError::UnknownShape(id.clone()));
        }
        self.events.push(CanvasEvent::ShapeRemoved(id.clone()));
        self.events.push(CanvasEvent::RenderRequested);
        self.send_remove(id)
    }

    /// Queue our pointer position unless throttled or not joined. Returns
    /// whether a message was queued.
    pub fn send_cursor(&mut self, position: Point, now: Instant) -> bool {
        let Some(room_id) = self.room_id.clone().filter(|_| self.joined) else {
            return false;
        };
        if !self.presence.should_send(now) {
            return false;
        }
        self.outgoing.push(ClientMessage::CursorMove {
            room_id,
            x: position.x,
            y: position.y,
        });
        true
    }

    // --- Inbound ---

    /// Replace all local state with a snapshot. Cursors are dropped too.
    /// Records that fail to parse are logged and skipped. Returns the number
    /// of shapes loaded.
    pub fn on_bootstrap(&mut self, objects: &[Value]) -> usize {
        self.room.clear();
        self.presence.clear();

        let interactive = self.tool == ToolKind::Select;
        for object in objects {
            let parsed = match object {
                Value::Object(record) => Shape::from_record(record),
                _ => Err(ShapeError::MissingId),
            };
            match parsed {
                Ok(mut shape) => {
                    shape.set_interactive(interactive);
                    self.room.insert(shape);
                }
                Err(e) => log::warn!("skipping snapshot object: {e}"),
            }
        }

        let shapes = self.room.len();
        log::info!("bootstrapped {shapes} shape(s) from snapshot");
        self.events.push(CanvasEvent::Bootstrapped { shapes });
        self.events.push(CanvasEvent::RenderRequested);
        shapes
    }

    /// Apply an operation received from another peer.
    pub fn on_operation(&mut self, op: Operation) -> ApplyOutcome {
        let outcome = match op {
            Operation::Add { mut shape, fields } => {
                let id = shape.id().clone();
                match self.room.get_mut(&id) {
                    // Only the provided fields change, as with `modify`
                    Some(existing) => match existing.apply_patch(&fields) {
                        Ok(()) => {
                            self.events.push(CanvasEvent::ShapeModified(id));
                            ApplyOutcome::Merged
                        }
                        Err(e) => {
                            log::warn!("rejected duplicate add of {id}: {e}");
                            ApplyOutcome::Rejected
                        }
                    },
                    None => {
                        shape.set_interactive(self.tool == ToolKind::Select);
                        self.room.insert(shape);
                        self.events.push(CanvasEvent::ShapeAdded(id));
                        ApplyOutcome::Inserted
                    }
                }
            }
            Operation::Modify { id, patch } => match self.room.get_mut(&id) {
                Some(shape) => match shape.apply_patch(&patch) {
                    Ok(()) => {
                        self.events.push(CanvasEvent::ShapeModified(id));
                        ApplyOutcome::Modified
                    }
                    Err(e) => {
                        log::warn!("rejected modify of {id}: {e}");
                        ApplyOutcome::Rejected
                    }
                },
                None => {
                    self.report_unknown("modify", &id);
                    ApplyOutcome::UnknownId
                }
            },
            Operation::Remove { id } => match self.room.remove(&id) {
                Some(_) => {
                    self.events.push(CanvasEvent::ShapeRemoved(id));
                    ApplyOutcome::Removed
                }
                None => {
                    self.report_unknown("remove", &id);
                    ApplyOutcome::UnknownId
                }
            },
        };

        if matches!(
            outcome,
            ApplyOutcome::Inserted
                | ApplyOutcome::Merged
                | ApplyOutcome::Modified
                | ApplyOutcome::Removed
        ) {
            self.events.push(CanvasEvent::RenderRequested);
        }
        outcome
    }

    fn report_unknown(&mut self, action: &str, id: &ShapeId) {
        log::warn!("dropping {action} for unknown shape {id}");
        self.events.push(CanvasEvent::ProtocolViolation {
            message: format!("{action} for unknown shape {id}"),
        });
    }

    fn protocol_violation(&mut self, message: String) {
        log::warn!("{message}");
        self.events.push(CanvasEvent::ProtocolViolation { message });
    }

    fn is_current_room(&self, room_id: &str) -> bool {
        self.room_id.as_deref() == Some(room_id)
    }

    /// Handle a decoded broker message.
    pub fn handle_message(&mut self, message: ServerMessage, now: Instant) {
        match message {
            ServerMessage::RoomSnapshot { objects } => {
                if self.room_id.is_none() {
                    log::debug!("ignoring snapshot outside of a room");
                    return;
                }
                self.on_bootstrap(&objects);
            }
            ServerMessage::Joined {
                room_id,
                peer_id,
                peer_count,
            } => {
                if !self.is_current_room(&room_id) {
                    log::warn!("ignoring join confirmation for room {room_id}");
                    return;
                }
                log::info!("joined room {room_id} as {peer_id} ({peer_count} peer(s))");
                self.mark_joined(peer_id);
            }
            ServerMessage::CanvasOperation { room_id, op } => {
                if !self.is_current_room(&room_id) {
                    log::debug!("ignoring operation for room {room_id}");
                    return;
                }
                match Operation::from_wire(&op) {
                    Ok(op) => {
                        self.on_operation(op);
                    }
                    Err(e) => self.protocol_violation(format!("dropping operation: {e}")),
                }
            }
            ServerMessage::CursorMove {
                room_id,
                peer_id,
                x,
                y,
            } => {
                if !self.is_current_room(&room_id) {
                    return;
                }
                if self.presence.on_cursor_move(&peer_id, Point::new(x, y), now) {
                    self.events.push(CanvasEvent::CursorMoved { peer_id });
                }
            }
            ServerMessage::PeerJoined { peer_id } => {
                log::info!("peer {peer_id} joined");
                self.events.push(CanvasEvent::PeerJoined { peer_id });
            }
            ServerMessage::PeerLeft { peer_id } => {
                log::info!("peer {peer_id} left");
                if self.presence.on_peer_left(&peer_id) {
                    self.events.push(CanvasEvent::RenderRequested);
                }
                self.events.push(CanvasEvent::PeerLeft { peer_id });
            }
            ServerMessage::Error { message } => {
                log::warn!("broker error: {message}");
                self.events.push(CanvasEvent::ServerError { message });
            }
        }
    }

    /// Decode and handle a raw frame. Malformed frames are logged and dropped.
    pub fn handle_text(&mut self, text: &str, now: Instant) {
        match ServerMessage::from_json(text) {
            Ok(message) => self.handle_message(message, now),
            Err(e) => self.protocol_violation(format!("dropping malformed frame: {e}")),
        }
    }

    /// Take pending outgoing messages (drains the queue).
    pub fn take_outgoing(&mut self) -> Vec<ClientMessage> {
        std::mem::take(&mut self.outgoing)
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    pub(crate) fn push_event(&mut self, event: CanvasEvent) {
        self.events.push(event);
    }

    /// Take events raised since the last call.
    pub fn take_events(&mut self) -> Vec<CanvasEvent> {
        std::mem::take(&mut self.events)
    }
}
