//! Viewport module for pan transforms.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Size of the virtual canvas in world units.
pub const CANVAS_SIZE: Size = Size::new(5000.0, 5000.0);

/// The view transform for the canvas.
///
/// Converts between screen coordinates and world coordinates. The view only
/// translates; there is no zoom.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Current translation offset (pan)
    pub offset: Vec2,
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the affine transform for rendering (world to screen).
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset)
    }

    /// Get the inverse transform for input handling (screen to world).
    pub fn inverse_transform(&self) -> Affine {
        Affine::translate(-self.offset)
    }

    /// Convert a screen point to world coordinates.
    pub fn screen_to_world(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    /// Convert a world point to screen coordinates.
    pub fn world_to_screen(&self, world_point: Point) -> Point {
        self.transform() * world_point
    }

    /// Pan the view by a delta in screen coordinates.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Reset to the world origin.
    pub fn reset(&mut self) {
        self.offset = Vec2::ZERO;
    }

    /// Place the center of the virtual canvas in the middle of the screen.
    pub fn center_on_canvas(&mut self, viewport: Size) {
        let canvas_center = CANVAS_SIZE.to_rect().center();
        let screen_center = viewport.to_rect().center();
        self.offset = screen_center - canvas_center;
    }

    /// The world-space rectangle visible in a viewport of the given size.
    pub fn visible_world_rect(&self, viewport: Size) -> Rect {
        viewport.to_rect() - self.offset
    }
}

/// Space-held panning.
///
/// While engaged, pointer drags move the view instead of reaching tools or
/// selection. Each move pans by the delta from the last tracked point, so
/// the view follows the pointer without drift.
#[derive(Debug, Clone, Default)]
pub struct PanController {
    engaged: bool,
    last: Option<Point>,
}

impl PanController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pan modifier pressed.
    pub fn engage(&mut self) {
        self.engaged = true;
    }

    /// Pan modifier released. Any drag in progress ends.
    pub fn release(&mut self) {
        self.engaged = false;
        self.last = None;
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    pub fn is_dragging(&self) -> bool {
        self.last.is_some()
    }

    /// Start tracking at a screen point. Returns whether the event was consumed.
    pub fn pointer_down(&mut self, screen: Point) -> bool {
        if !self.engaged {
            return false;
        }
        self.last = Some(screen);
        true
    }

    /// Pan by the delta from the last tracked point. Returns whether the
    /// event was consumed.
    pub fn pointer_move(&mut self, screen: Point, viewport: &mut Viewport) -> bool {
        if !self.engaged {
            return false;
        }
        if let Some(last) = self.last {
            viewport.pan(screen - last);
            self.last = Some(screen);
        }
        true
    }

    /// Stop dragging. Returns whether the event was consumed.
    pub fn pointer_up(&mut self) -> bool {
        let was_dragging = self.last.take().is_some();
        self.engaged || was_dragging
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_to_world_with_offset() {
        let mut viewport = Viewport::new();
        viewport.offset = Vec2::new(50.0, 100.0);
        let world = viewport.screen_to_world(Point::new(100.0, 200.0));
        assert!((world.x - 50.0).abs() < f64::EPSILON);
        assert!((world.y - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_roundtrip_conversion() {
        let mut viewport = Viewport::new();
        viewport.offset = Vec2::new(30.0, -20.0);
        let original = Point::new(123.0, 456.0);
        let back = viewport.world_to_screen(viewport.screen_to_world(original));
        assert!((back.x - original.x).abs() < 1e-10);
        assert!((back.y - original.y).abs() < 1e-10);
    }

    #[test]
    fn test_center_on_canvas() {
        let mut viewport = Viewport::new();
        viewport.center_on_canvas(Size::new(800.0, 600.0));
        let center = viewport.screen_to_world(Point::new(400.0, 300.0));
        assert!((center.x - 2500.0).abs() < f64::EPSILON);
        assert!((center.y - 2500.0).abs() < f64::EPSILON);

        let visible = viewport.visible_world_rect(Size::new(800.0, 600.0));
        assert!((visible.x0 - 2100.0).abs() < f64::EPSILON);
        assert!((visible.y1 - 2800.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pan_uses_delta_from_last_point() {
        let mut viewport = Viewport::new();
        let mut pan = PanController::new();
        pan.engage();
        assert!(pan.pointer_down(Point::new(100.0, 100.0)));
        assert!(pan.pointer_move(Point::new(110.0, 100.0), &mut viewport));
        assert!(pan.pointer_move(Point::new(120.0, 105.0), &mut viewport));
        // Cumulative, not 10 + 20 from the start point
        assert_eq!(viewport.offset, Vec2::new(20.0, 5.0));
        assert!(pan.pointer_up());
        assert!(!pan.is_dragging());
    }

    #[test]
    fn test_pan_ignored_when_not_engaged() {
        let mut viewport = Viewport::new();
        let mut pan = PanController::new();
        assert!(!pan.pointer_down(Point::ZERO));
        assert!(!pan.pointer_move(Point::new(50.0, 50.0), &mut viewport));
        assert_eq!(viewport.offset, Vec2::ZERO);
    }

    #[test]
    fn test_release_ends_drag() {
        let mut viewport = Viewport::new();
        let mut pan = PanController::new();
        pan.engage();
        pan.pointer_down(Point::ZERO);
        pan.release();
        assert!(!pan.pointer_move(Point::new(10.0, 10.0), &mut viewport));
        assert_eq!(viewport.offset, Vec2::ZERO);
    }
}
