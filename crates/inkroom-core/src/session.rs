//! Room session lifecycle: connect, join, bootstrap, reconnect.
//!
//! ```text
//! disconnected --connect--> connecting --joined--> joined
//!      ^                        |                    |
//!      +------- transport lost (backoff, retry) -----+
//! ```
//!
//! Every (re)connect sends a fresh `join-room` and is answered with a full
//! snapshot. Local state is never reconciled against a resumed stream.

use crate::collaboration::SyncClient;
use crate::config::ClientConfig;
use crate::event::{CanvasEvent, EventBus, Subscription};
use crate::transport::{Transport, TransportError, TransportEvent};
use std::time::{Duration, Instant};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Joined,
}

/// Exponential reconnect delay.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            attempt: 0,
        }
    }

    /// Delay before the next attempt: `base * 2^attempt`, capped at `max`.
    pub fn next_delay(&mut self) -> Duration {
        let factor = 1u32 << self.attempt.min(16);
        self.attempt = self.attempt.saturating_add(1);
        self.base.saturating_mul(factor).min(self.max)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// Drives one client's membership of one room over a transport.
///
/// Single-threaded and poll-driven: call [`RoomSession::poll`] regularly
/// (e.g. once per frame). Listeners registered with
/// [`RoomSession::subscribe`] are invoked from inside `poll`.
pub struct RoomSession<T: Transport> {
    transport: T,
    sync: SyncClient,
    config: ClientConfig,
    room_id: String,
    state: SessionState,
    bus: EventBus,
    backoff: Backoff,
    reconnect_at: Option<Instant>,
    closed_by_user: bool,
}

impl<T: Transport> RoomSession<T> {
    pub fn new(transport: T, config: ClientConfig, room_id: impl Into<String>) -> Self {
        let sync = SyncClient::new(&config);
        Self::with_sync(transport, sync, config, room_id)
    }

    pub fn with_sync(
        transport: T,
        sync: SyncClient,
        config: ClientConfig,
        room_id: impl Into<String>,
    ) -> Self {
        let backoff = Backoff::new(config.reconnect_base(), config.reconnect_max());
        Self {
            transport,
            sync,
            config,
            room_id: room_id.into(),
            state: SessionState::Disconnected,
            bus: EventBus::new(),
            backoff,
            reconnect_at: None,
            closed_by_user: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn sync(&self) -> &SyncClient {
        &self.sync
    }

    pub fn sync_mut(&mut self) -> &mut SyncClient {
        &mut self.sync
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// When the next reconnect attempt is due, if one is scheduled.
    pub fn reconnect_at(&self) -> Option<Instant> {
        self.reconnect_at
    }

    /// Listen for canvas events until the returned guard is dropped.
    pub fn subscribe(&self, listener: impl FnMut(&CanvasEvent) + 'static) -> Subscription {
        self.bus.subscribe(listener)
    }

    /// Open the transport. The join request goes out once it reports
    /// connected.
    pub fn connect(&mut self) -> Result<(), TransportError> {
        self.closed_by_user = false;
        self.reconnect_at = None;
        self.backoff.reset();
        self.open()
    }

    fn open(&mut self) -> Result<(), TransportError> {
        self.transport.connect(&self.config.server_url)?;
        log::info!("connecting to {} for room {}", self.config.server_url, self.room_id);
        self.set_state(SessionState::Connecting);
        Ok(())
    }

    /// Leave the room and close the transport. No reconnect follows.
    pub fn disconnect(&mut self) {
        self.closed_by_user = true;
        self.reconnect_at = None;
        self.sync.leave();
        self.flush();
        self.transport.disconnect();
        self.sync.mark_disconnected();
        self.set_state(SessionState::Disconnected);
        self.dispatch();
    }

    /// Run one dispatch step: due reconnects, transport events, outbound
    /// flush and listener notification.
    pub fn poll(&mut self, now: Instant) {
        if self.reconnect_at.is_some_and(|at| now >= at) {
            self.reconnect_at = None;
            log::info!("reconnecting to room {}", self.room_id);
            if let Err(e) = self.open() {
                log::warn!("reconnect failed: {e}");
                self.schedule_reconnect(now);
            }
        }

        for event in self.transport.poll_events() {
            match event {
                TransportEvent::Connected => {
                    log::info!("transport connected, joining room {}", self.room_id);
                    self.sync.begin_join(&self.room_id);
                }
                TransportEvent::Message(text) => {
                    self.sync.handle_text(&text, now);
                    if self.state != SessionState::Joined && self.sync.is_joined() {
                        self.backoff.reset();
                        self.set_state(SessionState::Joined);
                    }
                }
                TransportEvent::Disconnected => {
                    self.on_connection_lost(now, "connection closed");
                    break;
                }
                TransportEvent::Error { message } => {
                    self.on_connection_lost(now, &message);
                    break;
                }
            }
        }

        self.flush();
        self.dispatch();
    }

    fn on_connection_lost(&mut self, now: Instant, reason: &str) {
        log::warn!("lost connection to room {}: {reason}", self.room_id);
        self.transport.disconnect();
        self.sync.mark_disconnected();
        self.set_state(SessionState::Disconnected);
        if !self.closed_by_user {
            self.schedule_reconnect(now);
        }
    }

    fn schedule_reconnect(&mut self, now: Instant) {
        let delay = self.backoff.next_delay();
        log::info!(
            "reconnect attempt {} in {}ms",
            self.backoff.attempt(),
            delay.as_millis()
        );
        self.reconnect_at = Some(now + delay);
    }

    fn flush(&mut self) {
        for message in self.sync.take_outgoing() {
            if !self.transport.is_connected() {
                log::warn!("dropping outbound message: transport not connected");
                continue;
            }
            match message.to_json() {
                Ok(text) => {
                    if let Err(e) = self.transport.send(&text) {
                        log::warn!("failed to send message: {e}");
                    }
                }
                Err(e) => log::error!("failed to encode {message:?}: {e}"),
            }
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state == state {
            return;
        }
        log::debug!("session state {:?} -> {:?}", self.state, state);
        self.state = state;
        self.sync.push_event(CanvasEvent::SessionStateChanged(state));
    }

    fn dispatch(&mut self) {
        for event in self.sync.take_events() {
            self.bus.emit(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_until_cap() {
        let mut backoff = Backoff::new(Duration::from_millis(500), Duration::from_secs(10));
        let delays: Vec<u128> = (0..7).map(|_| backoff.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![500, 1000, 2000, 4000, 8000, 10_000, 10_000]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_backoff_survives_many_attempts() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30));
        for _ in 0..100 {
            assert!(backoff.next_delay() <= Duration::from_secs(30));
        }
    }
}
