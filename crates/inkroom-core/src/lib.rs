//! InkRoom Core Library
//!
//! Platform-agnostic room replica, wire protocol and session logic for the
//! InkRoom shared whiteboard.

pub mod camera;
pub mod canvas;
pub mod collaboration;
pub mod config;
pub mod document;
pub mod event;
pub mod input;
pub mod presence;
pub mod protocol;
pub mod selection;
pub mod session;
pub mod shapes;
pub mod tools;
pub mod transport;

pub use camera::{CANVAS_SIZE, PanController, Viewport};
pub use canvas::Canvas;
pub use collaboration::{ApplyOutcome, SyncClient, SyncError};
pub use config::ClientConfig;
pub use document::RoomState;
pub use event::{CanvasEvent, EventBus, Subscription};
pub use input::{KeyEvent, Modifiers, MouseButton, PointerEvent};
pub use presence::{CursorMarker, PresenceChannel};
pub use protocol::{ClientMessage, Operation, ProtocolError, ServerMessage, WireOperation};
pub use selection::{MoveGesture, Selection};
pub use session::{Backoff, RoomSession, SessionState};
pub use shapes::{Shape, ShapeId, ShapeKind, ShapeRecord, ShapeStyle, StyleChange};
pub use tools::{ToolKind, ToolManager};
#[cfg(not(target_arch = "wasm32"))]
pub use transport::PlatformTransport;
pub use transport::{ConnectionState, MemoryHandle, MemoryTransport, Transport, TransportEvent};
