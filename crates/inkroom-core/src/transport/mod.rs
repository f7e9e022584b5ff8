//! Message transports between a room session and the broker.
//!
//! A transport moves opaque text frames and reports connection changes. It
//! never interprets the protocol; that is the session's job.

mod memory;
#[cfg(not(target_arch = "wasm32"))]
mod native;

pub use memory::{MemoryHandle, MemoryTransport};
#[cfg(not(target_arch = "wasm32"))]
pub use native::NativeWebSocket;

use thiserror::Error;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events reported by a transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    /// Connection closed, by either side.
    Disconnected,
    /// A text frame from the broker.
    Message(String),
    /// Connecting failed or the connection broke.
    Error { message: String },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("already connected")]
    AlreadyConnected,
    #[error("not connected")]
    NotConnected,
    #[error("connection refused: {0}")]
    Refused(String),
    #[error("send failed: {0}")]
    Send(String),
}

/// A non-blocking, poll-driven text frame channel.
pub trait Transport {
    /// Start connecting. Completion is reported by
    /// [`TransportEvent::Connected`] from [`Transport::poll_events`].
    fn connect(&mut self, url: &str) -> Result<(), TransportError>;

    /// Close the connection. No further events are reported.
    fn disconnect(&mut self);

    /// Queue a text frame for delivery.
    fn send(&mut self, text: &str) -> Result<(), TransportError>;

    /// Drain pending events without blocking.
    fn poll_events(&mut self) -> Vec<TransportEvent>;

    fn state(&self) -> ConnectionState;

    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

/// Platform-specific WebSocket transport.
#[cfg(not(target_arch = "wasm32"))]
pub type PlatformTransport = NativeWebSocket;
