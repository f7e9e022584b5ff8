//! Room registry and authoritative per-room object state.

use dashmap::DashMap;
use inkroom_core::protocol::{Operation, ServerMessage, WireOperation};
use inkroom_core::shapes::{Shape, ShapeError, ShapeId};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// A relayed message and the peer that caused it.
pub type RoomMessage = (String, ServerMessage);

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("room {0} is not open")]
    UnknownRoom(String),
    #[error("rejected {action} of {id}: {source}")]
    Rejected {
        action: &'static str,
        id: ShapeId,
        source: ShapeError,
    },
}

/// Stored shapes in insertion order.
///
/// Records are merged through [`Shape::apply_patch`], the same path clients
/// use, so the snapshot only ever holds records every client can parse.
#[derive(Debug, Default)]
pub struct ObjectStore {
    shapes: HashMap<ShapeId, Shape>,
    order: Vec<ShapeId>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an operation. `add` for a stored id merges the provided fields,
    /// `modify` merges, `remove` deletes. Returns `Ok(false)` if the
    /// operation referenced an id that is not stored. A patch that would
    /// leave the shape invalid is rejected whole and nothing changes.
    pub fn apply(&mut self, op: &Operation) -> Result<bool, ShapeError> {
        match op {
            Operation::Add { shape, fields } => {
                match self.shapes.get_mut(shape.id()) {
                    Some(existing) => existing.apply_patch(fields)?,
                    None => {
                        self.shapes.insert(shape.id().clone(), shape.clone());
                        self.order.push(shape.id().clone());
                    }
                }
                Ok(true)
            }
            Operation::Modify { id, patch } => match self.shapes.get_mut(id) {
                Some(existing) => {
                    existing.apply_patch(patch)?;
                    Ok(true)
                }
                None => Ok(false),
            },
            Operation::Remove { id } => {
                if self.shapes.remove(id).is_none() {
                    return Ok(false);
                }
                self.order.retain(|stored| stored != id);
                Ok(true)
            }
        }
    }

    pub fn get(&self, id: &ShapeId) -> Option<&Shape> {
        self.shapes.get(id)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Records for a `room-snapshot` frame.
    pub fn snapshot(&self) -> Vec<Value> {
        self.order
            .iter()
            .filter_map(|id| self.shapes.get(id))
            .map(|shape| Value::Object(shape.to_record()))
            .collect()
    }
}

/// Room state
struct Room {
    /// Broadcast channel for this room
    tx: broadcast::Sender<RoomMessage>,
    /// Connected peer IDs
    peers: HashSet<String>,
    objects: ObjectStore,
}

impl Room {
    fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            peers: HashSet::new(),
            objects: ObjectStore::new(),
        }
    }
}

/// What a newly joined peer needs to get going.
pub struct Membership {
    pub rx: broadcast::Receiver<RoomMessage>,
    pub snapshot: Vec<Value>,
    pub peer_count: usize,
}

/// Shared application state
pub struct AppState {
    rooms: DashMap<String, Room>,
    channel_capacity: usize,
}

impl AppState {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Add a peer to a room, creating the room if needed.
    pub fn join(&self, room_id: &str, peer_id: &str) -> Membership {
        let capacity = self.channel_capacity;
        let mut room = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Room::new(capacity));
        room.peers.insert(peer_id.to_string());
        Membership {
            rx: room.tx.subscribe(),
            snapshot: room.objects.snapshot(),
            peer_count: room.peers.len(),
        }
    }

    /// Remove a peer. Empty rooms are dropped along with their objects.
    /// Returns whether the peer was a member.
    pub fn leave(&self, room_id: &str, peer_id: &str) -> bool {
        let Some(mut room) = self.rooms.get_mut(room_id) else {
            return false;
        };
        let was_member = room.peers.remove(peer_id);
        if room.peers.is_empty() {
            drop(room);
            self.rooms.remove(room_id);
            debug!("room {room_id} closed");
        }
        was_member
    }

    /// Apply an operation and relay `op` to the room. Both happen under the
    /// room lock, so every member receives operations in the order they were
    /// stored. Rejected operations are not relayed.
    pub fn apply_operation(
        &self,
        room_id: &str,
        from: &str,
        operation: &Operation,
        op: WireOperation,
    ) -> Result<(), ApplyError> {
        let Some(mut room) = self.rooms.get_mut(room_id) else {
            return Err(ApplyError::UnknownRoom(room_id.to_string()));
        };
        let applied = room
            .objects
            .apply(operation)
            .map_err(|source| ApplyError::Rejected {
                action: operation.action(),
                id: operation.id().clone(),
                source,
            })?;
        if !applied {
            warn!(
                "room {room_id}: {} for unknown shape {}",
                operation.action(),
                operation.id()
            );
        }
        let message = ServerMessage::CanvasOperation {
            room_id: room_id.to_string(),
            op,
        };
        // No receivers is fine
        let _ = room.tx.send((from.to_string(), message));
        Ok(())
    }

    /// Fresh receiver and snapshot for a member that fell behind. Taken under
    /// the room lock, so the receiver starts exactly after the snapshot.
    pub fn resubscribe(&self, room_id: &str) -> Option<Membership> {
        let room = self.rooms.get_mut(room_id)?;
        Some(Membership {
            rx: room.tx.subscribe(),
            snapshot: room.objects.snapshot(),
            peer_count: room.peers.len(),
        })
    }

    /// Broadcast message to room
    pub fn broadcast(&self, room_id: &str, from: &str, msg: ServerMessage) {
        if let Some(room) = self.rooms.get(room_id) {
            // No receivers is fine
            let _ = room.tx.send((from.to_string(), msg));
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn peer_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, |room| room.peers.len())
    }

    pub fn object_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, |room| room.objects.len())
    }

    pub fn snapshot(&self, room_id: &str) -> Vec<Value> {
        self.rooms
            .get(room_id)
            .map(|room| room.objects.snapshot())
            .unwrap_or_default()
    }
}
