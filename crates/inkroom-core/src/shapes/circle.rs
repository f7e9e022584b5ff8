//! Circle geometry.

use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// A circle given by its center and radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub cx: f64,
    pub cy: f64,
    pub radius: f64,
}

impl Circle {
    pub fn new(center: Point, radius: f64) -> Self {
        Self {
            cx: center.x,
            cy: center.y,
            radius,
        }
    }

    /// Circle whose diameter runs from `a` to `b`.
    pub fn from_diameter(a: Point, b: Point) -> Self {
        Self::new(a.midpoint(b), a.distance(b) / 2.0)
    }

    pub fn center(&self) -> Point {
        Point::new(self.cx, self.cy)
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_center_size(self.center(), (self.radius * 2.0, self.radius * 2.0))
    }

    pub fn is_degenerate(&self) -> bool {
        self.radius <= 0.0
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.cx += delta.x;
        self.cy += delta.y;
    }

    pub fn hit_test(&self, point: Point, tolerance: f64, stroke_width: f64, filled: bool) -> bool {
        let dist = self.center().distance(point);
        if filled {
            dist <= self.radius + tolerance
        } else {
            (dist - self.radius).abs() <= tolerance + stroke_width / 2.0
        }
    }
}
