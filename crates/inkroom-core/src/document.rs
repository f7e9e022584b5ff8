//! Local replica of a room's shapes.

use crate::shapes::{Shape, ShapeId, ShapeRecord};
use kurbo::{Point, Rect};
use std::collections::HashMap;

/// All shapes in a room, keyed by id, with a stable back-to-front order.
///
/// Read access is public. Mutation is crate-private so that every durable
/// change goes through [`SyncClient`](crate::collaboration::SyncClient).
#[derive(Debug, Clone, Default)]
pub struct RoomState {
    shapes: HashMap<ShapeId, Shape>,
    /// Z-order of shapes (back to front).
    z_order: Vec<ShapeId>,
}

impl RoomState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ShapeId) -> Option<&Shape> {
        self.shapes.get(id)
    }

    pub fn contains(&self, id: &ShapeId) -> bool {
        self.shapes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Ids in z-order (back to front).
    pub fn ids(&self) -> impl Iterator<Item = &ShapeId> {
        self.z_order.iter()
    }

    /// Get shapes in z-order (back to front).
    pub fn shapes_ordered(&self) -> impl Iterator<Item = &Shape> {
        self.z_order.iter().filter_map(|id| self.shapes.get(id))
    }

    /// Find shapes at a point (in world coordinates), front to back.
    pub fn shapes_at_point(&self, point: Point, tolerance: f64) -> Vec<ShapeId> {
        self.z_order
            .iter()
            .rev()
            .filter(|id| {
                self.shapes
                    .get(*id)
                    .is_some_and(|s| s.hit_test(point, tolerance))
            })
            .cloned()
            .collect()
    }

    /// Get the bounding box of all shapes.
    pub fn bounds(&self) -> Option<Rect> {
        self.shapes
            .values()
            .map(Shape::bounds)
            .reduce(|acc, bounds| acc.union(bounds))
    }

    /// Every shape as a record, in z-order.
    pub fn to_records(&self) -> Vec<ShapeRecord> {
        self.shapes_ordered().map(Shape::to_record).collect()
    }

    /// Insert or replace. A replaced shape keeps its position in the z-order.
    pub(crate) fn insert(&mut self, shape: Shape) -> Option<Shape> {
        let id = shape.id().clone();
        let previous = self.shapes.insert(id.clone(), shape);
        if previous.is_none() {
            self.z_order.push(id);
        }
        previous
    }

    pub(crate) fn get_mut(&mut self, id: &ShapeId) -> Option<&mut Shape> {
        self.shapes.get_mut(id)
    }

    pub(crate) fn remove(&mut self, id: &ShapeId) -> Option<Shape> {
        let removed = self.shapes.remove(id)?;
        self.z_order.retain(|shape_id| shape_id != id);
        Some(removed)
    }

    pub(crate) fn clear(&mut self) {
        self.shapes.clear();
        self.z_order.clear();
    }

    pub(crate) fn set_interactive_all(&mut self, interactive: bool) {
        for shape in self.shapes.values_mut() {
            shape.set_interactive(interactive);
        }
    }
}
