//! In-process transport for tests and embedding.

use super::{ConnectionState, Transport, TransportError, TransportEvent};
use crate::protocol::{ClientMessage, ServerMessage};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Debug)]
struct Link {
    state: ConnectionState,
    pending: VecDeque<TransportEvent>,
    sent: Vec<String>,
    connect_count: usize,
    refuse: bool,
    url: Option<String>,
}

/// A transport whose far end is driven by a [`MemoryHandle`].
///
/// `connect` always succeeds asynchronously: the `Connected` event shows up
/// on the next poll unless the handle is refusing connections.
#[derive(Debug)]
pub struct MemoryTransport {
    link: Rc<RefCell<Link>>,
}

/// The broker side of a [`MemoryTransport`].
#[derive(Debug, Clone)]
pub struct MemoryHandle {
    link: Rc<RefCell<Link>>,
}

impl MemoryTransport {
    pub fn new() -> (Self, MemoryHandle) {
        let link = Rc::new(RefCell::new(Link {
            state: ConnectionState::Disconnected,
            pending: VecDeque::new(),
            sent: Vec::new(),
            connect_count: 0,
            refuse: false,
            url: None,
        }));
        (
            Self {
                link: Rc::clone(&link),
            },
            MemoryHandle { link },
        )
    }
}

impl Transport for MemoryTransport {
    fn connect(&mut self, url: &str) -> Result<(), TransportError> {
        let mut link = self.link.borrow_mut();
        if matches!(
            link.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            return Err(TransportError::AlreadyConnected);
        }
        link.connect_count += 1;
        link.url = Some(url.to_string());
        link.state = ConnectionState::Connecting;
        let event = if link.refuse {
            TransportEvent::Error {
                message: "connection refused".to_string(),
            }
        } else {
            TransportEvent::Connected
        };
        link.pending.push_back(event);
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut link = self.link.borrow_mut();
        link.state = ConnectionState::Disconnected;
        link.pending.clear();
    }

    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        let mut link = self.link.borrow_mut();
        if link.state != ConnectionState::Connected {
            return Err(TransportError::NotConnected);
        }
        link.sent.push(text.to_string());
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        let mut link = self.link.borrow_mut();
        let events: Vec<_> = link.pending.drain(..).collect();
        for event in &events {
            match event {
                TransportEvent::Connected => link.state = ConnectionState::Connected,
                TransportEvent::Disconnected => link.state = ConnectionState::Disconnected,
                TransportEvent::Error { .. } => link.state = ConnectionState::Error,
                TransportEvent::Message(_) => {}
            }
        }
        events
    }

    fn state(&self) -> ConnectionState {
        self.link.borrow().state
    }
}

impl MemoryHandle {
    /// Deliver a raw frame to the client.
    pub fn push_text(&self, text: impl Into<String>) {
        self.link
            .borrow_mut()
            .pending
            .push_back(TransportEvent::Message(text.into()));
    }

    /// Deliver a protocol message to the client.
    pub fn push_message(&self, message: &ServerMessage) {
        match message.to_json() {
            Ok(text) => self.push_text(text),
            Err(e) => log::error!("failed to encode {message:?}: {e}"),
        }
    }

    /// Simulate the network dropping the connection.
    pub fn drop_connection(&self) {
        self.link
            .borrow_mut()
            .pending
            .push_back(TransportEvent::Disconnected);
    }

    /// Make subsequent connection attempts fail.
    pub fn refuse_connections(&self, refuse: bool) {
        self.link.borrow_mut().refuse = refuse;
    }

    /// Frames sent by the client since the last call.
    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut self.link.borrow_mut().sent)
    }

    /// Sent frames decoded as protocol messages; undecodable frames are skipped.
    pub fn take_sent_messages(&self) -> Vec<ClientMessage> {
        self.take_sent()
            .iter()
            .filter_map(|text| ClientMessage::from_json(text).ok())
            .collect()
    }

    pub fn connect_count(&self) -> usize {
        self.link.borrow().connect_count
    }

    pub fn url(&self) -> Option<String> {
        self.link.borrow().url.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.link.borrow().state
    }
}
