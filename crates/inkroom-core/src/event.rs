//! Canvas events and scoped listener registration.

use crate::session::SessionState;
use crate::shapes::ShapeId;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Something a view or embedder may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasEvent {
    /// Local state changed and the canvas should be repainted.
    RenderRequested,
    /// Room state was replaced by a snapshot.
    Bootstrapped { shapes: usize },
    ShapeAdded(ShapeId),
    ShapeModified(ShapeId),
    ShapeRemoved(ShapeId),
    CursorMoved { peer_id: String },
    PeerJoined { peer_id: String },
    PeerLeft { peer_id: String },
    SessionStateChanged(SessionState),
    /// An inbound payload was malformed or referenced an unknown shape.
    ProtocolViolation { message: String },
    /// The broker rejected something we sent.
    ServerError { message: String },
}

type Listener = Box<dyn FnMut(&CanvasEvent)>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
    /// Ids unsubscribed while their listener was out for dispatch.
    removed: Vec<u64>,
}

/// Single-threaded fan-out of [`CanvasEvent`]s to subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Rc<RefCell<Registry>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. It stays registered until the returned guard is
    /// dropped.
    pub fn subscribe(&self, listener: impl FnMut(&CanvasEvent) + 'static) -> Subscription {
        let mut registry = self.registry.borrow_mut();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.listeners.push((id, Box::new(listener)));
        Subscription {
            id,
            registry: Rc::downgrade(&self.registry),
        }
    }

    /// Deliver an event to every current listener, in subscription order.
    ///
    /// Listeners may subscribe or unsubscribe while being called; a listener
    /// subscribed during dispatch first hears the next event.
    pub fn emit(&self, event: &CanvasEvent) {
        let mut listeners = std::mem::take(&mut self.registry.borrow_mut().listeners);
        for (id, listener) in &mut listeners {
            if self.registry.borrow().removed.contains(id) {
                continue;
            }
            listener(event);
        }

        let mut registry = self.registry.borrow_mut();
        let removed = std::mem::take(&mut registry.removed);
        listeners.retain(|(id, _)| !removed.contains(id));
        listeners.append(&mut registry.listeners);
        registry.listeners = listeners;
    }

    pub fn listener_count(&self) -> usize {
        self.registry.borrow().listeners.len()
    }
}

/// Guard for a registered listener.
///
/// Dropping it (or calling [`Subscription::unsubscribe`]) removes the
/// listener. Release happens exactly once.
#[must_use = "the listener is removed as soon as the subscription is dropped"]
pub struct Subscription {
    id: u64,
    registry: Weak<RefCell<Registry>>,
}

impl Subscription {
    /// Remove the listener now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut registry = registry.borrow_mut();
        let before = registry.listeners.len();
        registry.listeners.retain(|(id, _)| *id != self.id);
        if registry.listeners.len() == before {
            // Currently being dispatched
            registry.removed.push(self.id);
        }
    }
}
