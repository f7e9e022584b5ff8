//! Straight line segment.

use super::point_to_segment_dist;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// A line segment from `(x1, y1)` to `(x2, y2)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Line {
    pub fn new(start: Point, end: Point) -> Self {
        Self {
            x1: start.x,
            y1: start.y,
            x2: end.x,
            y2: end.y,
        }
    }

    pub fn start(&self) -> Point {
        Point::new(self.x1, self.y1)
    }

    pub fn end(&self) -> Point {
        Point::new(self.x2, self.y2)
    }

    pub fn length(&self) -> f64 {
        self.start().distance(self.end())
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_points(self.start(), self.end())
    }

    /// Coincident endpoints.
    pub fn is_degenerate(&self) -> bool {
        self.length() <= 0.0
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.x1 += delta.x;
        self.y1 += delta.y;
        self.x2 += delta.x;
        self.y2 += delta.y;
    }

    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        point_to_segment_dist(point, self.start(), self.end()) <= tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_length() {
        let line = Line::new(Point::new(0.0, 0.0), Point::new(3.0, 4.0));
        assert!((line.length() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_coincident_endpoints_are_degenerate() {
        let p = Point::new(4.0, 2.0);
        assert!(Line::new(p, p).is_degenerate());
        assert!(!Line::new(p, Point::new(4.0, 3.0)).is_degenerate());
    }

    #[test]
    fn test_hit_test() {
        let line = Line::new(Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        assert!(line.hit_test(Point::new(50.0, 3.0), 5.0));
        assert!(!line.hit_test(Point::new(50.0, 10.0), 5.0));
        assert!(!line.hit_test(Point::new(110.0, 0.0), 5.0));
    }
}
