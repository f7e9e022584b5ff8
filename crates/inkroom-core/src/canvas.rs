//! Canvas controller: routes input to the viewport, tools and selection.
//!
//! The canvas never touches room state directly. Every durable change goes
//! through the [`SyncClient`] it is handed, which applies it locally and
//! queues the broadcast.

use crate::camera::{PanController, Viewport};
use crate::collaboration::{SyncClient, SyncError};
use crate::input::{KeyEvent, Modifiers, MouseButton, PointerEvent, is_delete_key, is_pan_key};
use crate::selection::{MoveGesture, Selection};
use crate::shapes::{Shape, ShapeId, StyleChange};
use crate::tools::{ToolKind, ToolManager};
use kurbo::{Point, Size};
use std::time::Instant;

/// Default hit tolerance in world units.
pub const HIT_TOLERANCE: f64 = 4.0;

/// Runtime canvas state (never sent).
#[derive(Debug, Clone)]
pub struct Canvas {
    /// View transform.
    pub viewport: Viewport,
    pan: PanController,
    tools: ToolManager,
    selection: Selection,
    gesture: Option<MoveGesture>,
    modifiers: Modifiers,
    hit_tolerance: f64,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas {
    pub fn new() -> Self {
        Self {
            viewport: Viewport::new(),
            pan: PanController::new(),
            tools: ToolManager::new(),
            selection: Selection::new(),
            gesture: None,
            modifiers: Modifiers::default(),
            hit_tolerance: HIT_TOLERANCE,
        }
    }

    /// A canvas whose view starts centered on the virtual canvas.
    pub fn with_viewport_size(size: Size) -> Self {
        let mut canvas = Self::new();
        canvas.viewport.center_on_canvas(size);
        canvas
    }

    pub fn tool(&self) -> ToolKind {
        self.tools.current_tool()
    }

    pub fn tools(&self) -> &ToolManager {
        &self.tools
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn set_modifiers(&mut self, modifiers: Modifiers) {
        self.modifiers = modifiers;
    }

    pub fn is_panning(&self) -> bool {
        self.pan.is_engaged()
    }

    /// Shape being drawn, for rendering.
    pub fn preview_shape(&self) -> Option<&Shape> {
        self.tools.preview_shape()
    }

    /// Shapes being dragged at their current position, for rendering.
    pub fn move_preview(&self) -> Vec<Shape> {
        self.gesture
            .as_ref()
            .map(MoveGesture::preview)
            .unwrap_or_default()
    }

    /// Switch tools. Discards anything in progress and, when leaving the
    /// select tool, the selection.
    pub fn set_tool(&mut self, tool: ToolKind, sync: &mut SyncClient) {
        self.tools.set_tool(tool);
        self.gesture = None;
        if tool != ToolKind::Select {
            self.selection.clear();
        }
        sync.set_tool(tool);
    }

    /// Handle a pointer event in screen coordinates.
    pub fn handle_pointer(&mut self, event: &PointerEvent, sync: &mut SyncClient, now: Instant) {
        let room = sync.room();
        self.selection.retain_existing(|id| room.contains(id));
        let world = self.viewport.screen_to_world(event.position());

        match *event {
            PointerEvent::Move { position } => {
                sync.send_cursor(world, now);
                if self.pan.pointer_move(position, &mut self.viewport) {
                    return;
                }
                if let Some(gesture) = &mut self.gesture {
                    gesture.update(world);
                    return;
                }
                self.tools.update(world);
            }
            PointerEvent::Down { position, button } => {
                if self.pan.pointer_down(position) || button != MouseButton::Left {
                    return;
                }
                if let Some(id) = self.hit_interactive(world, sync) {
                    self.begin_move(id, world, sync);
                    return;
                }
                // Empty canvas under the select tool: nothing happens
                if self.tools.current_tool().creates_shapes() {
                    let id = sync.next_id();
                    self.tools.begin(world, id);
                }
            }
            PointerEvent::Up { button, .. } => {
                if self.pan.pointer_up() || button != MouseButton::Left {
                    return;
                }
                if let Some(gesture) = self.gesture.take() {
                    let moved = gesture.finish(world);
                    if !moved.is_empty() {
                        sync.commit_modified_shapes(moved);
                    }
                    return;
                }
                if let Some(shape) = self.tools.end(world) {
                    commit_new_shape(shape, sync);
                }
            }
            PointerEvent::Scroll { delta, .. } => {
                self.viewport.pan(-delta);
            }
        }
    }

    /// Handle a key press or release. Returns whether the key was used.
    pub fn handle_key(&mut self, event: &KeyEvent, sync: &mut SyncClient) -> bool {
        match event {
            KeyEvent::Pressed(key) => self.key_pressed(key, sync),
            KeyEvent::Released(key) => self.key_released(key),
        }
    }

    fn key_pressed(&mut self, key: &str, sync: &mut SyncClient) -> bool {
        if self.track_modifier(key, true) {
            return true;
        }
        if is_pan_key(key) {
            if !self.pan.is_engaged() {
                // Shape creation and selection are suspended while panning
                self.tools.cancel();
                self.gesture = None;
                self.pan.engage();
            }
            return true;
        }
        if is_delete_key(key) {
            return self.delete_selection(sync) > 0;
        }
        if self.modifiers.command() {
            if key.eq_ignore_ascii_case("a") {
                self.select_all(sync);
                return true;
            }
            return false;
        }
        if key == "Escape" {
            self.tools.cancel();
            self.gesture = None;
            self.selection.clear();
            return true;
        }
        match ToolKind::from_shortcut(key) {
            Some(tool) => {
                self.set_tool(tool, sync);
                true
            }
            None => false,
        }
    }

    fn key_released(&mut self, key: &str) -> bool {
        if self.track_modifier(key, false) {
            return true;
        }
        if is_pan_key(key) {
            self.pan.release();
            return true;
        }
        false
    }

    fn track_modifier(&mut self, key: &str, down: bool) -> bool {
        let flag = match key {
            "Shift" => &mut self.modifiers.shift,
            "Control" => &mut self.modifiers.ctrl,
            "Alt" => &mut self.modifiers.alt,
            "Meta" => &mut self.modifiers.meta,
            _ => return false,
        };
        *flag = down;
        true
    }

    /// Select every interactive shape. Returns how many were selected.
    pub fn select_all(&mut self, sync: &SyncClient) -> usize {
        self.selection.clear();
        for shape in sync.room().shapes_ordered() {
            if shape.is_interactive() {
                self.selection.add(shape.id().clone());
            }
        }
        self.selection.len()
    }

    /// Remove every selected shape, one `remove` per shape. Returns how many
    /// were removed locally.
    pub fn delete_selection(&mut self, sync: &mut SyncClient) -> usize {
        let mut removed = 0;
        for id in self.selection.ids().to_vec() {
            match sync.commit_remove(&id) {
                Ok(()) | Err(SyncError::NotJoined) => removed += 1,
                Err(e) => log::warn!("could not delete {id}: {e}"),
            }
        }
        self.selection.clear();
        self.gesture = None;
        removed
    }

    /// Apply a style change to every selected shape and to newly drawn ones.
    /// Each selected shape is broadcast with its full property set. Returns
    /// how many shapes changed.
    pub fn apply_style(&mut self, change: &StyleChange, sync: &mut SyncClient) -> usize {
        change.apply_to(&mut self.tools.current_style);

        let patch = change.to_patch();
        let mut updated = Vec::new();
        for id in self.selection.ids() {
            let Some(mut shape) = sync.room().get(id).cloned() else {
                continue;
            };
            match shape.apply_patch(&patch) {
                Ok(()) => updated.push(shape),
                Err(e) => log::warn!("style change rejected for {id}: {e}"),
            }
        }
        if updated.is_empty() {
            return 0;
        }
        sync.commit_modified_shapes(updated)
    }

    /// Commit geometry produced by a resize or rotate gesture handled in the
    /// rendering layer. One `modify` per shape.
    pub fn commit_transformed(&mut self, shapes: Vec<Shape>, sync: &mut SyncClient) -> usize {
        sync.commit_modified_shapes(shapes)
    }

    fn hit_interactive(&self, world: Point, sync: &SyncClient) -> Option<ShapeId> {
        let room = sync.room();
        room.shapes_at_point(world, self.hit_tolerance)
            .into_iter()
            .find(|id| room.get(id).is_some_and(Shape::is_interactive))
    }

    fn begin_move(&mut self, id: ShapeId, world: Point, sync: &SyncClient) {
        if self.modifiers.shift {
            self.selection.toggle(id.clone());
            if !self.selection.contains(&id) {
                return;
            }
        } else if !self.selection.contains(&id) {
            self.selection.select(id);
        }

        let originals: Vec<Shape> = self
            .selection
            .ids()
            .iter()
            .filter_map(|id| sync.room().get(id))
            .filter(|shape| shape.is_interactive())
            .cloned()
            .collect();
        self.gesture = Some(MoveGesture::new(world, originals));
    }
}

fn commit_new_shape(shape: Shape, sync: &mut SyncClient) {
    let id = shape.id().clone();
    match sync.commit_add(shape) {
        Ok(()) => log::debug!("committed {id}"),
        Err(SyncError::NotJoined) => log::debug!("{id} kept locally while offline"),
        Err(e) => log::error!("failed to commit {id}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::protocol::ClientMessage;
    use crate::shapes::{Geometry, IdGenerator, Rectangle};
    use kurbo::Vec2;

    fn joined_client() -> SyncClient {
        let mut sync = SyncClient::with_ids(IdGenerator::new("me"), &ClientConfig::default());
        sync.begin_join("room");
        sync.mark_joined("peer-me".to_string());
        sync.take_outgoing();
        sync
    }

    fn down(x: f64, y: f64) -> PointerEvent {
        PointerEvent::Down {
            position: Point::new(x, y),
            button: MouseButton::Left,
        }
    }

    fn up(x: f64, y: f64) -> PointerEvent {
        PointerEvent::Up {
            position: Point::new(x, y),
            button: MouseButton::Left,
        }
    }

    fn mv(x: f64, y: f64) -> PointerEvent {
        PointerEvent::Move {
            position: Point::new(x, y),
        }
    }

    fn press(key: &str) -> KeyEvent {
        KeyEvent::Pressed(key.to_string())
    }

    fn release(key: &str) -> KeyEvent {
        KeyEvent::Released(key.to_string())
    }

    fn drag(canvas: &mut Canvas, sync: &mut SyncClient, from: (f64, f64), to: (f64, f64)) {
        let now = Instant::now();
        canvas.handle_pointer(&down(from.0, from.1), sync, now);
        canvas.handle_pointer(&mv(to.0, to.1), sync, now);
        canvas.handle_pointer(&up(to.0, to.1), sync, now);
    }

    fn operations(sync: &mut SyncClient) -> Vec<String> {
        sync.take_outgoing()
            .into_iter()
            .filter_map(|msg| match msg {
                ClientMessage::CanvasOperation { op, .. } => op.action,
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_draw_rectangle_commits_add() {
        let mut canvas = Canvas::new();
        let mut sync = joined_client();
        canvas.set_tool(ToolKind::Rectangle, &mut sync);

        drag(&mut canvas, &mut sync, (10.0, 10.0), (60.0, 40.0));
        assert_eq!(sync.room().len(), 1);
        let shape = sync.room().shapes_ordered().next().unwrap();
        assert_eq!(shape.geometry, Geometry::Rect(Rectangle::new(10.0, 10.0, 50.0, 30.0)));
        assert!(shape.id().as_str().starts_with("me_"));
        assert_eq!(operations(&mut sync), vec!["add".to_string()]);
    }

    #[test]
    fn test_zero_size_draw_emits_nothing() {
        let mut canvas = Canvas::new();
        let mut sync = joined_client();
        canvas.set_tool(ToolKind::Rectangle, &mut sync);
        drag(&mut canvas, &mut sync, (10.0, 10.0), (10.0, 10.0));
        assert!(sync.room().is_empty());
        assert!(operations(&mut sync).is_empty());
    }

    #[test]
    fn test_space_pan_suspends_drawing() {
        let mut canvas = Canvas::new();
        let mut sync = joined_client();
        canvas.set_tool(ToolKind::Line, &mut sync);

        assert!(canvas.handle_key(&press(" "), &mut sync));
        drag(&mut canvas, &mut sync, (100.0, 100.0), (130.0, 90.0));
        assert_eq!(canvas.viewport.offset, Vec2::new(30.0, -10.0));
        assert!(sync.room().is_empty());
        assert!(operations(&mut sync).is_empty());

        assert!(canvas.handle_key(&release(" "), &mut sync));
        assert_eq!(canvas.tool(), ToolKind::Line);
        drag(&mut canvas, &mut sync, (100.0, 100.0), (130.0, 90.0));
        assert_eq!(sync.room().len(), 1);
    }

    #[test]
    fn test_space_cancels_in_progress_draw() {
        let mut canvas = Canvas::new();
        let mut sync = joined_client();
        canvas.set_tool(ToolKind::Circle, &mut sync);
        let now = Instant::now();
        canvas.handle_pointer(&down(0.0, 0.0), &mut sync, now);
        canvas.handle_pointer(&mv(20.0, 20.0), &mut sync, now);
        canvas.handle_key(&press(" "), &mut sync);
        assert!(canvas.preview_shape().is_none());
    }

    #[test]
    fn test_cursor_sent_while_panning() {
        let mut canvas = Canvas::new();
        let mut sync = joined_client();
        canvas.handle_key(&press(" "), &mut sync);
        canvas.handle_pointer(&mv(5.0, 5.0), &mut sync, Instant::now());
        assert!(matches!(
            sync.take_outgoing().as_slice(),
            [ClientMessage::CursorMove { .. }]
        ));
    }

    #[test]
    fn test_move_selection_emits_modify_per_shape() {
        let mut canvas = Canvas::new();
        let mut sync = joined_client();
        canvas.set_tool(ToolKind::Rectangle, &mut sync);
        drag(&mut canvas, &mut sync, (0.0, 0.0), (50.0, 50.0));
        drag(&mut canvas, &mut sync, (100.0, 0.0), (150.0, 50.0));
        canvas.set_tool(ToolKind::Select, &mut sync);
        operations(&mut sync);

        canvas.handle_key(&press("Control"), &mut sync);
        assert!(canvas.handle_key(&press("a"), &mut sync));
        canvas.handle_key(&release("Control"), &mut sync);
        assert_eq!(canvas.selection().len(), 2);

        // Grab the first rectangle by its edge and drag both.
        drag(&mut canvas, &mut sync, (0.0, 25.0), (10.0, 35.0));
        assert_eq!(operations(&mut sync), vec!["modify".to_string(), "modify".to_string()]);
        let lefts: Vec<f64> = sync
            .room()
            .shapes_ordered()
            .filter_map(|s| match s.geometry {
                Geometry::Rect(r) => Some(r.left),
                _ => None,
            })
            .collect();
        assert_eq!(lefts, vec![10.0, 110.0]);
    }

    #[test]
    fn test_click_on_empty_canvas_does_nothing() {
        let mut canvas = Canvas::new();
        let mut sync = joined_client();
        canvas.set_tool(ToolKind::Rectangle, &mut sync);
        drag(&mut canvas, &mut sync, (0.0, 0.0), (50.0, 50.0));
        canvas.set_tool(ToolKind::Select, &mut sync);
        canvas.select_all(&sync);
        assert_eq!(canvas.selection().len(), 1);

        drag(&mut canvas, &mut sync, (500.0, 500.0), (520.0, 520.0));
        assert_eq!(canvas.selection().len(), 1);
        assert_eq!(sync.room().len(), 1);
        assert_eq!(operations(&mut sync), vec!["add".to_string()]);
    }

    #[test]
    fn test_delete_selection_removes_each() {
        let mut canvas = Canvas::new();
        let mut sync = joined_client();
        canvas.set_tool(ToolKind::Line, &mut sync);
        drag(&mut canvas, &mut sync, (0.0, 0.0), (50.0, 0.0));
        drag(&mut canvas, &mut sync, (0.0, 20.0), (50.0, 20.0));
        canvas.set_tool(ToolKind::Select, &mut sync);
        operations(&mut sync);

        canvas.select_all(&sync);
        assert!(canvas.handle_key(&press("Delete"), &mut sync));
        assert!(sync.room().is_empty());
        assert_eq!(operations(&mut sync), vec!["remove".to_string(), "remove".to_string()]);
        assert!(!canvas.handle_key(&press("Backspace"), &mut sync));
    }

    #[test]
    fn test_apply_style_sends_full_records() {
        let mut canvas = Canvas::new();
        let mut sync = joined_client();
        canvas.set_tool(ToolKind::Rectangle, &mut sync);
        drag(&mut canvas, &mut sync, (0.0, 0.0), (50.0, 50.0));
        canvas.set_tool(ToolKind::Select, &mut sync);
        canvas.select_all(&sync);
        sync.take_outgoing();

        assert_eq!(canvas.apply_style(&StyleChange::Dash(vec![5.0, 5.0]), &mut sync), 1);
        let shape = sync.room().shapes_ordered().next().unwrap();
        assert_eq!(shape.style.dash, vec![5.0, 5.0]);
        assert_eq!(canvas.tools().current_style.dash, vec![5.0, 5.0]);

        let sent = sync.take_outgoing();
        let [ClientMessage::CanvasOperation { op, .. }] = sent.as_slice() else {
            panic!("expected one operation");
        };
        let object = op.object.as_ref().unwrap();
        assert!(object.get("left").is_some());
        assert!(object.get("strokeDashArray").is_some());
    }

    #[test]
    fn test_shortcut_switches_tool_and_escape_clears() {
        let mut canvas = Canvas::new();
        let mut sync = joined_client();
        assert!(canvas.handle_key(&press("p"), &mut sync));
        assert_eq!(canvas.tool(), ToolKind::Pencil);
        assert_eq!(sync.tool(), ToolKind::Pencil);
        assert!(canvas.handle_key(&press("Escape"), &mut sync));
        assert!(!canvas.handle_key(&press("q"), &mut sync));
    }

    #[test]
    fn test_centered_viewport() {
        let canvas = Canvas::with_viewport_size(Size::new(1000.0, 800.0));
        let center = canvas.viewport.screen_to_world(Point::new(500.0, 400.0));
        assert_eq!(center, Point::new(2500.0, 2500.0));
    }
}
