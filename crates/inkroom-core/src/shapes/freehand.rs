//! Freehand stroke geometry.

use super::point_to_polyline_dist;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Tolerance used when a committed stroke is simplified.
pub const SIMPLIFY_TOLERANCE: f64 = 0.5;

/// A freehand drawing (series of points).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Freehand {
    #[serde(default)]
    pub points: Vec<Point>,
}

impl Freehand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn add_point(&mut self, point: Point) {
        // Pointer-move may repeat the last position
        if self.points.last() != Some(&point) {
            self.points.push(point);
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Fewer than two distinct points.
    pub fn is_degenerate(&self) -> bool {
        match self.points.first() {
            Some(first) => self.points.iter().all(|p| p == first),
            None => true,
        }
    }

    /// Simplify the path by removing redundant points.
    pub fn simplify(&mut self, tolerance: f64) {
        if self.points.len() < 3 {
            return;
        }

        // Ramer-Douglas-Peucker algorithm
        self.points = rdp_simplify(&self.points, tolerance);
    }

    pub fn bounds(&self) -> Rect {
        let mut points = self.points.iter();
        let Some(first) = points.next() else {
            return Rect::ZERO;
        };
        points.fold(Rect::from_points(*first, *first), |rect, p| rect.union_pt(*p))
    }

    pub fn translate(&mut self, delta: Vec2) {
        for point in &mut self.points {
            *point += delta;
        }
    }

    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        point_to_polyline_dist(point, &self.points) <= tolerance
    }
}

/// Ramer-Douglas-Peucker line simplification.
fn rdp_simplify(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let first = points[0];
    let last = points[points.len() - 1];

    let mut max_dist = 0.0;
    let mut max_index = 0;

    for (i, point) in points.iter().enumerate().skip(1).take(points.len() - 2) {
        let dist = perpendicular_distance(*point, first, last);
        if dist > max_dist {
            max_dist = dist;
            max_index = i;
        }
    }

    if max_dist > tolerance {
        let mut left = rdp_simplify(&points[..=max_index], tolerance);
        let right = rdp_simplify(&points[max_index..], tolerance);

        // Junction point appears in both halves
        left.pop();
        left.extend(right);
        left
    } else {
        vec![first, last]
    }
}

/// Distance from `point` to the infinite line through `line_start` and `line_end`.
fn perpendicular_distance(point: Point, line_start: Point, line_end: Point) -> f64 {
    let dir = line_end - line_start;
    let len_sq = dir.hypot2();
    if len_sq < f64::EPSILON {
        return (point - line_start).hypot();
    }
    // Twice the triangle area over the base
    (point - line_start).cross(dir).abs() / len_sq.sqrt()
}
