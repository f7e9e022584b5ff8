//! Wire protocol between clients and the room broker.
//!
//! Every frame is a JSON object tagged by `type`. Shapes travel as flat
//! records (see [`ShapeRecord`]) inside `canvas-operation` and
//! `room-snapshot` frames.

use crate::shapes::{Shape, ShapeError, ShapeId, ShapeRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Messages sent to the broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Request membership and a snapshot
    JoinRoom { room_id: String },
    /// Leave the current room
    LeaveRoom,
    /// Durable mutation, relayed to every other member
    CanvasOperation { room_id: String, op: WireOperation },
    /// Pointer position, relayed but never stored
    CursorMove { room_id: String, x: f64, y: f64 },
}

/// Messages received from the broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Full room state for bootstrap
    RoomSnapshot {
        #[serde(default)]
        objects: Vec<Value>,
    },
    /// Membership confirmed
    Joined {
        room_id: String,
        peer_id: String,
        peer_count: usize,
    },
    /// Operation from another peer
    CanvasOperation { room_id: String, op: WireOperation },
    /// Cursor position of another peer
    CursorMove {
        room_id: String,
        peer_id: String,
        x: f64,
        y: f64,
    },
    PeerJoined { peer_id: String },
    PeerLeft { peer_id: String },
    /// Error message
    Error { message: String },
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// The `op` payload as it appears on the wire.
///
/// Both fields are optional here so that an incomplete payload still decodes
/// and can be rejected with a precise [`ProtocolError`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireOperation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Value>,
}

/// Malformed or incomplete inbound payloads.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to decode message: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("operation has no action")]
    MissingAction,
    #[error("unknown operation action: {0}")]
    UnknownAction(String),
    #[error("operation has no object")]
    MissingObject,
    #[error("operation object has no id")]
    MissingId,
    #[error("invalid shape in operation: {0}")]
    InvalidShape(#[from] ShapeError),
}

/// A durable mutation of room state.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// `fields` is the record as provided, used when the id already exists.
    Add { shape: Shape, fields: ShapeRecord },
    /// Partial record: only the provided fields change.
    Modify { id: ShapeId, patch: ShapeRecord },
    Remove { id: ShapeId },
}

impl Operation {
    /// An `add` carrying the complete record of `shape`.
    pub fn add(shape: Shape) -> Self {
        let fields = shape.to_record();
        Operation::Add { shape, fields }
    }

    pub fn id(&self) -> &ShapeId {
        match self {
            Operation::Add { shape, .. } => shape.id(),
            Operation::Modify { id, .. } | Operation::Remove { id } => id,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Operation::Add { .. } => "add",
            Operation::Modify { .. } => "modify",
            Operation::Remove { .. } => "remove",
        }
    }

    /// Validate a wire payload.
    pub fn from_wire(wire: &WireOperation) -> Result<Self, ProtocolError> {
        let action = wire.action.as_deref().ok_or(ProtocolError::MissingAction)?;
        let object = match &wire.object {
            Some(Value::Object(map)) => map,
            _ => return Err(ProtocolError::MissingObject),
        };
        let id = match object.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => ShapeId::from(id),
            _ => return Err(ProtocolError::MissingId),
        };

        match action {
            "add" => Ok(Operation::Add {
                shape: Shape::from_record(object)?,
                fields: object.clone(),
            }),
            "modify" => {
                let mut patch = object.clone();
                patch.remove("id");
                Ok(Operation::Modify { id, patch })
            }
            "remove" => Ok(Operation::Remove { id }),
            other => Err(ProtocolError::UnknownAction(other.to_string())),
        }
    }

    /// Wire payload. `remove` carries only `{id}`.
    pub fn to_wire(&self) -> WireOperation {
        let object = match self {
            Operation::Add { shape, .. } => shape.to_record(),
            Operation::Modify { id, patch } => {
                let mut object = patch.clone();
                object.insert("id".to_string(), Value::from(id.as_str()));
                object
            }
            Operation::Remove { id } => {
                let mut object = ShapeRecord::new();
                object.insert("id".to_string(), Value::from(id.as_str()));
                object
            }
        };
        WireOperation {
            action: Some(self.action().to_string()),
            object: Some(Value::Object(object)),
        }
    }
}
