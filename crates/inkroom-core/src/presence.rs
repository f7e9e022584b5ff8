//! Live cursors of other peers in the room.
//!
//! Cursor positions are ephemeral: they are never part of room state, are
//! dropped on bootstrap and disappear as soon as their peer leaves.

use kurbo::Point;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Time a marker takes to glide to a new position.
pub const CURSOR_SMOOTHING: Duration = Duration::from_millis(50);

/// Deterministic hue in `0..360` for a peer id.
pub fn peer_hue(peer_id: &str) -> u16 {
    // FNV-1a
    let hash = peer_id
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
        });
    (hash % 360) as u16
}

/// A remote peer's pointer indicator.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorMarker {
    from: Point,
    target: Point,
    started: Instant,
    hue: u16,
}

impl CursorMarker {
    fn new(peer_id: &str, position: Point, now: Instant) -> Self {
        Self {
            from: position,
            target: position,
            started: now,
            hue: peer_hue(peer_id),
        }
    }

    /// Start animating from wherever the marker is now toward `target`.
    fn retarget(&mut self, target: Point, now: Instant) {
        self.from = self.position_at(now);
        self.target = target;
        self.started = now;
    }

    /// Last reported position.
    pub fn target(&self) -> Point {
        self.target
    }

    /// Animated position at `now`.
    pub fn position_at(&self, now: Instant) -> Point {
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed >= CURSOR_SMOOTHING {
            return self.target;
        }
        let t = elapsed.as_secs_f64() / CURSOR_SMOOTHING.as_secs_f64();
        self.from.lerp(self.target, t)
    }

    pub fn hue(&self) -> u16 {
        self.hue
    }

    /// CSS color for the marker.
    pub fn color(&self) -> String {
        format!("hsl({}, 70%, 50%)", self.hue)
    }
}

/// Tracks remote cursors and rate-limits our own.
#[derive(Debug, Clone)]
pub struct PresenceChannel {
    self_id: Option<String>,
    cursors: HashMap<String, CursorMarker>,
    throttle: Duration,
    last_sent: Option<Instant>,
}

impl PresenceChannel {
    pub fn new(throttle: Duration) -> Self {
        Self {
            self_id: None,
            cursors: HashMap::new(),
            throttle,
            last_sent: None,
        }
    }

    /// Our own peer id as assigned by the broker; used to drop echoes.
    pub fn set_self_id(&mut self, peer_id: Option<String>) {
        self.self_id = peer_id;
    }

    pub fn self_id(&self) -> Option<&str> {
        self.self_id.as_deref()
    }

    /// Whether a local cursor update may be sent at `now`. Records the send
    /// when it returns true.
    pub fn should_send(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_sent {
            if now.saturating_duration_since(last) < self.throttle {
                return false;
            }
        }
        self.last_sent = Some(now);
        true
    }

    /// Handle a remote cursor update. Returns false for our own echo.
    pub fn on_cursor_move(&mut self, peer_id: &str, position: Point, now: Instant) -> bool {
        if self.self_id.as_deref() == Some(peer_id) {
            return false;
        }
        match self.cursors.get_mut(peer_id) {
            Some(marker) => marker.retarget(position, now),
            None => {
                self.cursors
                    .insert(peer_id.to_string(), CursorMarker::new(peer_id, position, now));
            }
        }
        true
    }

    /// Remove a peer's marker. Returns whether one existed.
    pub fn on_peer_left(&mut self, peer_id: &str) -> bool {
        self.cursors.remove(peer_id).is_some()
    }

    pub fn clear(&mut self) {
        self.cursors.clear();
    }

    pub fn cursor(&self, peer_id: &str) -> Option<&CursorMarker> {
        self.cursors.get(peer_id)
    }

    pub fn cursors(&self) -> impl Iterator<Item = (&str, &CursorMarker)> {
        self.cursors.iter().map(|(id, marker)| (id.as_str(), marker))
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> PresenceChannel {
        let mut presence = PresenceChannel::new(Duration::from_millis(30));
        presence.set_self_id(Some("me".to_string()));
        presence
    }

    #[test]
    fn test_hue_is_deterministic() {
        assert_eq!(peer_hue("alice"), peer_hue("alice"));
        assert!(peer_hue("alice") < 360);
        assert!(peer_hue("") < 360);
    }

    #[test]
    fn test_self_echo_ignored() {
        let mut presence = channel();
        let now = Instant::now();
        assert!(!presence.on_cursor_move("me", Point::new(1.0, 1.0), now));
        assert!(presence.is_empty());
        assert!(presence.on_cursor_move("bob", Point::new(1.0, 1.0), now));
        assert_eq!(presence.len(), 1);
    }

    #[test]
    fn test_marker_animates_toward_target() {
        let mut presence = channel();
        let start = Instant::now();
        presence.on_cursor_move("bob", Point::new(0.0, 0.0), start);
        presence.on_cursor_move("bob", Point::new(100.0, 0.0), start);

        let marker = presence.cursor("bob").unwrap();
        let halfway = marker.position_at(start + Duration::from_millis(25));
        assert!((halfway.x - 50.0).abs() < 1e-9);
        let done = marker.position_at(start + Duration::from_millis(80));
        assert_eq!(done, Point::new(100.0, 0.0));
        assert_eq!(marker.target(), Point::new(100.0, 0.0));
    }

    #[test]
    fn test_peer_left_removes_only_that_peer() {
        let mut presence = channel();
        let now = Instant::now();
        presence.on_cursor_move("bob", Point::new(1.0, 1.0), now);
        presence.on_cursor_move("carol", Point::new(2.0, 2.0), now);

        assert!(presence.on_peer_left("bob"));
        assert!(presence.cursor("bob").is_none());
        assert!(presence.cursor("carol").is_some());

        assert!(!presence.on_peer_left("bob"));
        assert_eq!(presence.len(), 1);
    }

    #[test]
    fn test_throttle() {
        let mut presence = channel();
        let start = Instant::now();
        assert!(presence.should_send(start));
        assert!(!presence.should_send(start + Duration::from_millis(10)));
        assert!(presence.should_send(start + Duration::from_millis(30)));
    }

    #[test]
    fn test_color_format() {
        let mut presence = channel();
        presence.on_cursor_move("bob", Point::ZERO, Instant::now());
        let marker = presence.cursor("bob").unwrap();
        assert_eq!(marker.color(), format!("hsl({}, 70%, 50%)", peer_hue("bob")));
    }
}
