//! Local selection and the move gesture.
//!
//! A selection is never sent over the network. Every mutation of its members
//! is emitted as an independent per-shape operation.

use crate::shapes::{Shape, ShapeId};
use kurbo::{Point, Vec2};

/// Ordered set of selected shape ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: Vec<ShapeId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selection with a single shape.
    pub fn select(&mut self, id: ShapeId) {
        self.ids.clear();
        self.ids.push(id);
    }

    pub fn add(&mut self, id: ShapeId) {
        if !self.contains(&id) {
            self.ids.push(id);
        }
    }

    /// Add if absent, remove if present.
    pub fn toggle(&mut self, id: ShapeId) {
        if self.contains(&id) {
            self.deselect(&id);
        } else {
            self.ids.push(id);
        }
    }

    pub fn deselect(&mut self, id: &ShapeId) {
        self.ids.retain(|selected| selected != id);
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn contains(&self, id: &ShapeId) -> bool {
        self.ids.contains(id)
    }

    pub fn ids(&self) -> &[ShapeId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Drop ids for which `exists` returns false, e.g. shapes removed by a peer.
    pub fn retain_existing(&mut self, exists: impl Fn(&ShapeId) -> bool) {
        self.ids.retain(|id| exists(id));
    }
}

/// Drag of one or more selected shapes.
#[derive(Debug, Clone)]
pub struct MoveGesture {
    /// Starting point of the drag (world coordinates).
    start: Point,
    /// Current point of the drag (world coordinates).
    current: Point,
    /// Shapes as they were when the drag began.
    originals: Vec<Shape>,
}

impl MoveGesture {
    pub fn new(start: Point, originals: Vec<Shape>) -> Self {
        Self {
            start,
            current: start,
            originals,
        }
    }

    pub fn update(&mut self, point: Point) {
        self.current = point;
    }

    /// Get the drag delta.
    pub fn delta(&self) -> Vec2 {
        self.current - self.start
    }

    pub fn shape_ids(&self) -> impl Iterator<Item = &ShapeId> {
        self.originals.iter().map(Shape::id)
    }

    /// The moved shapes at the current pointer position.
    pub fn preview(&self) -> Vec<Shape> {
        let delta = self.delta();
        self.originals
            .iter()
            .map(|shape| {
                let mut moved = shape.clone();
                moved.translate(delta);
                moved
            })
            .collect()
    }

    /// End the drag at `point`. Returns the moved shapes, or nothing if the
    /// pointer came back to where it started.
    pub fn finish(mut self, point: Point) -> Vec<Shape> {
        self.update(point);
        if self.delta() == Vec2::ZERO {
            return Vec::new();
        }
        self.preview()
    }
}
