//! WebSocket transport for native platforms.

use super::{ConnectionState, Transport, TransportError, TransportEvent};
use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tungstenite::{Message, connect};
use url::Url;

/// Commands sent to the WebSocket thread.
enum WsCommand {
    Send(String),
    Close,
}

/// WebSocket client for native platforms.
///
/// Uses a background thread for non-blocking operation.
pub struct NativeWebSocket {
    state: ConnectionState,
    /// Channel to send commands to the WebSocket thread.
    cmd_tx: Option<Sender<WsCommand>>,
    /// Channel to receive events from the WebSocket thread.
    event_rx: Option<Receiver<TransportEvent>>,
    /// Handle to the WebSocket thread.
    _thread: Option<JoinHandle<()>>,
}

impl NativeWebSocket {
    /// Create a new disconnected WebSocket client.
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            cmd_tx: None,
            event_rx: None,
            _thread: None,
        }
    }
}

fn validate_url(url: &str) -> Result<Url, TransportError> {
    let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
    if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
        return Err(TransportError::InvalidUrl(format!(
            "unsupported scheme: {}",
            parsed.scheme()
        )));
    }
    Ok(parsed)
}

fn preview(text: &str) -> &str {
    let end = text
        .char_indices()
        .nth(100)
        .map_or(text.len(), |(idx, _)| idx);
    &text[..end]
}

fn run_socket(url: String, cmd_rx: Receiver<WsCommand>, event_tx: Sender<TransportEvent>) {
    log::info!("WebSocket thread: connecting to {url}");

    let mut socket = match connect(url.as_str()) {
        Ok((socket, response)) => {
            log::info!("WebSocket connected, status: {}", response.status());
            socket
        }
        Err(e) => {
            log::error!("WebSocket connection failed: {e}");
            let _ = event_tx.send(TransportEvent::Error {
                message: format!("connection failed: {e}"),
            });
            return;
        }
    };
    let _ = event_tx.send(TransportEvent::Connected);

    // Short read timeout so the loop can interleave outbound commands
    match socket.get_mut() {
        tungstenite::stream::MaybeTlsStream::Plain(tcp) => {
            let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
            let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
        }
        #[allow(unreachable_patterns)]
        _ => log::debug!("non-plain stream, relying on default timeouts"),
    }

    loop {
        match cmd_rx.try_recv() {
            Ok(WsCommand::Send(msg)) => {
                log::debug!("WebSocket sending: {}", preview(&msg));
                if let Err(e) = socket.send(Message::Text(msg)) {
                    log::error!("WebSocket send error: {e}");
                    let _ = event_tx.send(TransportEvent::Error {
                        message: format!("send failed: {e}"),
                    });
                    break;
                }
            }
            Ok(WsCommand::Close) => {
                log::info!("WebSocket close requested");
                let _ = socket.close(None);
                // Closed by us; the owner is no longer listening
                return;
            }
            Err(TryRecvError::Disconnected) => {
                log::info!("WebSocket command channel disconnected");
                return;
            }
            Err(TryRecvError::Empty) => {}
        }

        match socket.read() {
            Ok(Message::Text(txt)) => {
                log::debug!("WebSocket received: {}", preview(&txt));
                let _ = event_tx.send(TransportEvent::Message(txt));
            }
            Ok(Message::Ping(data)) => {
                let _ = socket.send(Message::Pong(data));
            }
            Ok(Message::Close(_)) => {
                log::info!("WebSocket received close frame");
                break;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(ref e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(e) => {
                log::error!("WebSocket read error: {e}");
                break;
            }
        }
    }

    log::info!("WebSocket thread exiting");
    let _ = event_tx.send(TransportEvent::Disconnected);
}

impl Transport for NativeWebSocket {
    fn connect(&mut self, url: &str) -> Result<(), TransportError> {
        if self.cmd_tx.is_some() {
            return Err(TransportError::AlreadyConnected);
        }
        let url = validate_url(url)?.to_string();

        self.state = ConnectionState::Connecting;

        let (cmd_tx, cmd_rx) = channel::<WsCommand>();
        let (event_tx, event_rx) = channel::<TransportEvent>();
        let handle = thread::spawn(move || run_socket(url, cmd_rx, event_tx));

        self.cmd_tx = Some(cmd_tx);
        self.event_rx = Some(event_rx);
        self._thread = Some(handle);
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(WsCommand::Close);
        }
        self.event_rx = None;
        self._thread = None;
        self.state = ConnectionState::Disconnected;
    }

    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        match &self.cmd_tx {
            Some(tx) => tx
                .send(WsCommand::Send(text.to_string()))
                .map_err(|e| TransportError::Send(e.to_string())),
            None => Err(TransportError::NotConnected),
        }
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        let mut finished = false;
        if let Some(rx) = &self.event_rx {
            while let Ok(event) = rx.try_recv() {
                match &event {
                    TransportEvent::Connected => self.state = ConnectionState::Connected,
                    TransportEvent::Disconnected => {
                        self.state = ConnectionState::Disconnected;
                        finished = true;
                    }
                    TransportEvent::Error { .. } => {
                        self.state = ConnectionState::Error;
                        finished = true;
                    }
                    TransportEvent::Message(_) => {}
                }
                events.push(event);
            }
        }
        if finished {
            // The socket thread is gone; allow a fresh connect
            self.cmd_tx = None;
            self.event_rx = None;
            self._thread = None;
        }
        events
    }

    fn state(&self) -> ConnectionState {
        self.state
    }
}

impl Default for NativeWebSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NativeWebSocket {
    fn drop(&mut self) {
        self.disconnect();
    }
}
