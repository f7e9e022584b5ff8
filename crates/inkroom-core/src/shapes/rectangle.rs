//! Rectangle geometry.

use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// An axis-aligned box anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rectangle {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Box spanned by two corner points, in either order.
    pub fn from_corners(p1: Point, p2: Point) -> Self {
        let min_x = p1.x.min(p2.x);
        let min_y = p1.y.min(p2.y);
        let width = (p2.x - p1.x).abs();
        let height = (p2.y - p1.y).abs();

        Self::new(min_x, min_y, width, height)
    }

    /// Get the rectangle as a kurbo Rect.
    pub fn as_rect(&self) -> Rect {
        Rect::new(
            self.left,
            self.top,
            self.left + self.width,
            self.top + self.height,
        )
    }

    pub fn bounds(&self) -> Rect {
        self.as_rect()
    }

    pub fn is_degenerate(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.left += delta.x;
        self.top += delta.y;
    }

    pub fn hit_test(&self, point: Point, tolerance: f64, stroke_width: f64, filled: bool) -> bool {
        let rect = self.as_rect();
        if filled {
            return rect.inflate(tolerance, tolerance).contains(point);
        }
        // Outline only: hit on the border
        let margin = tolerance + stroke_width / 2.0;
        let outer = rect.inflate(margin, margin);
        let inner = rect.inflate(-margin, -margin);
        outer.contains(point) && !inner.contains(point)
    }
}
