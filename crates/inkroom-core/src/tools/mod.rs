//! Tool system for the whiteboard.

use crate::shapes::{
    Circle, Freehand, Geometry, Line, Rectangle, SIMPLIFY_TOLERANCE, Shape, ShapeId, ShapeStyle,
};
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    #[default]
    Select,
    Pencil,
    Rectangle,
    Circle,
    Line,
}

impl ToolKind {
    pub const ALL: [ToolKind; 5] = [
        ToolKind::Select,
        ToolKind::Pencil,
        ToolKind::Rectangle,
        ToolKind::Circle,
        ToolKind::Line,
    ];

    /// Keyboard shortcut lookup.
    pub fn from_shortcut(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "v" => Some(ToolKind::Select),
            "p" => Some(ToolKind::Pencil),
            "r" => Some(ToolKind::Rectangle),
            "c" | "o" => Some(ToolKind::Circle),
            "l" => Some(ToolKind::Line),
            _ => None,
        }
    }

    /// Whether dragging with this tool draws a new shape.
    pub fn creates_shapes(&self) -> bool {
        !matches!(self, ToolKind::Select)
    }
}

/// State of a tool interaction.
#[derive(Debug, Clone, Default)]
pub enum ToolState {
    /// Tool is idle, waiting for interaction.
    #[default]
    Idle,
    /// A shape is being drawn. The preview is local only.
    Drawing {
        anchor: Point,
        current: Point,
        preview: Shape,
    },
}

/// Manages the current tool and its state.
#[derive(Debug, Clone, Default)]
pub struct ToolManager {
    current_tool: ToolKind,
    state: ToolState,
    /// Current style to apply to new shapes.
    pub current_style: ShapeStyle,
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_tool(&self) -> ToolKind {
        self.current_tool
    }

    pub fn state(&self) -> &ToolState {
        &self.state
    }

    /// Switch tools. A shape being drawn is discarded; it was never sent.
    pub fn set_tool(&mut self, tool: ToolKind) {
        if self.is_active() {
            log::debug!("discarding in-progress {:?} shape on tool switch", self.current_tool);
        }
        self.current_tool = tool;
        self.state = ToolState::Idle;
    }

    /// Start drawing at `point`. Does nothing for the select tool.
    pub fn begin(&mut self, point: Point, id: ShapeId) {
        let Some(geometry) = self.geometry_for(point, point) else {
            return;
        };
        let preview = Shape::new(id, geometry, self.current_style.clone());
        self.state = ToolState::Drawing {
            anchor: point,
            current: point,
            preview,
        };
    }

    /// Recompute the preview from the anchor and the pointer position.
    pub fn update(&mut self, point: Point) {
        let ToolState::Drawing {
            anchor,
            current,
            preview,
        } = &mut self.state
        else {
            return;
        };
        *current = point;
        match &mut preview.geometry {
            Geometry::Path(path) => path.add_point(point),
            Geometry::Rect(rect) => *rect = Rectangle::from_corners(*anchor, point),
            Geometry::Circle(circle) => *circle = Circle::from_diameter(*anchor, point),
            Geometry::Line(line) => *line = Line::new(*anchor, point),
        }
    }

    /// Finish drawing at `point`. Returns the shape to commit, or `None` if
    /// nothing was being drawn or the result is degenerate.
    pub fn end(&mut self, point: Point) -> Option<Shape> {
        self.update(point);
        let ToolState::Drawing { mut preview, .. } = std::mem::take(&mut self.state) else {
            return None;
        };
        if let Geometry::Path(path) = &mut preview.geometry {
            path.simplify(SIMPLIFY_TOLERANCE);
        }
        if preview.is_degenerate() {
            log::debug!("discarding degenerate {}", preview.kind().as_str());
            return None;
        }
        preview.set_interactive(true);
        Some(preview)
    }

    /// Abandon the current interaction.
    pub fn cancel(&mut self) {
        self.state = ToolState::Idle;
    }

    /// Check if a tool interaction is active.
    pub fn is_active(&self) -> bool {
        matches!(self.state, ToolState::Drawing { .. })
    }

    /// Get the preview shape for the current interaction.
    pub fn preview_shape(&self) -> Option<&Shape> {
        match &self.state {
            ToolState::Drawing { preview, .. } => Some(preview),
            ToolState::Idle => None,
        }
    }

    fn geometry_for(&self, anchor: Point, current: Point) -> Option<Geometry> {
        match self.current_tool {
            ToolKind::Select => None,
            ToolKind::Pencil => Some(Geometry::Path(Freehand::from_points(vec![anchor]))),
            ToolKind::Rectangle => Some(Geometry::Rect(Rectangle::from_corners(anchor, current))),
            ToolKind::Circle => Some(Geometry::Circle(Circle::from_diameter(anchor, current))),
            ToolKind::Line => Some(Geometry::Line(Line::new(anchor, current))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(tool: ToolKind) -> ToolManager {
        let mut tools = ToolManager::new();
        tools.set_tool(tool);
        tools
    }

    fn draw(tool: ToolKind, from: Point, to: Point) -> Option<Shape> {
        let mut tools = manager(tool);
        tools.begin(from, ShapeId::from("t_1"));
        tools.update(to);
        tools.end(to)
    }

    #[test]
    fn test_tool_shortcuts() {
        assert_eq!(ToolKind::from_shortcut("R"), Some(ToolKind::Rectangle));
        assert_eq!(ToolKind::from_shortcut("o"), Some(ToolKind::Circle));
        assert_eq!(ToolKind::from_shortcut("z"), None);
        assert!(!ToolKind::Select.creates_shapes());
        assert!(ToolKind::ALL.iter().filter(|t| t.creates_shapes()).count() == 4);
    }

    #[test]
    fn test_preview_is_not_interactive() {
        let mut tools = manager(ToolKind::Rectangle);
        tools.begin(Point::new(0.0, 0.0), ShapeId::from("t_1"));
        tools.update(Point::new(20.0, 20.0));
        let preview = tools.preview_shape().unwrap();
        assert!(!preview.is_interactive());
        assert_eq!(preview.id().as_str(), "t_1");
    }

    #[test]
    fn test_rectangle_from_any_drag_direction() {
        let shape = draw(ToolKind::Rectangle, Point::new(50.0, 40.0), Point::new(10.0, 10.0)).unwrap();
        let Geometry::Rect(rect) = shape.geometry else {
            panic!("expected a rectangle");
        };
        assert_eq!(rect, Rectangle::new(10.0, 10.0, 40.0, 30.0));
        assert!(shape.is_interactive());
    }

    #[test]
    fn test_zero_movement_rectangle_is_discarded() {
        let p = Point::new(10.0, 10.0);
        assert!(draw(ToolKind::Rectangle, p, p).is_none());
    }

    #[test]
    fn test_circle_from_drag() {
        let shape = draw(ToolKind::Circle, Point::new(0.0, 0.0), Point::new(3.0, 4.0)).unwrap();
        let Geometry::Circle(circle) = shape.geometry else {
            panic!("expected a circle");
        };
        assert!((circle.radius - 2.5).abs() < f64::EPSILON);
        assert!((circle.cx - 1.5).abs() < f64::EPSILON);
        assert!((circle.cy - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_degenerate_line_and_circle() {
        let p = Point::new(5.0, 5.0);
        assert!(draw(ToolKind::Line, p, p).is_none());
        assert!(draw(ToolKind::Circle, p, p).is_none());
        let line = draw(ToolKind::Line, p, Point::new(6.0, 5.0)).unwrap();
        assert_eq!(line.geometry, Geometry::Line(Line::new(p, Point::new(6.0, 5.0))));
    }

    #[test]
    fn test_pencil_accumulates_and_simplifies() {
        let mut tools = manager(ToolKind::Pencil);
        tools.begin(Point::new(0.0, 0.0), ShapeId::from("t_1"));
        for i in 1..=10 {
            tools.update(Point::new(f64::from(i), 0.0));
        }
        tools.update(Point::new(10.0, 10.0));
        let shape = tools.end(Point::new(10.0, 10.0)).unwrap();
        let Geometry::Path(path) = shape.geometry else {
            panic!("expected a path");
        };
        assert_eq!(
            path.points,
            vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)]
        );
    }

    #[test]
    fn test_pencil_click_is_discarded() {
        let p = Point::new(3.0, 3.0);
        assert!(draw(ToolKind::Pencil, p, p).is_none());
    }

    #[test]
    fn test_select_tool_draws_nothing() {
        let mut tools = manager(ToolKind::Select);
        tools.begin(Point::ZERO, ShapeId::from("t_1"));
        assert!(!tools.is_active());
        assert!(tools.end(Point::new(10.0, 10.0)).is_none());
    }

    #[test]
    fn test_tool_switch_discards_in_progress_shape() {
        let mut tools = manager(ToolKind::Line);
        tools.begin(Point::ZERO, ShapeId::from("t_1"));
        tools.update(Point::new(40.0, 0.0));
        tools.set_tool(ToolKind::Rectangle);
        assert!(!tools.is_active());
        assert!(tools.end(Point::new(50.0, 50.0)).is_none());
    }

    #[test]
    fn test_new_shapes_use_current_style() {
        let mut tools = manager(ToolKind::Rectangle);
        tools.current_style.stroke = "#16A34A".to_string();
        tools.begin(Point::ZERO, ShapeId::from("t_1"));
        let shape = tools.end(Point::new(5.0, 5.0)).unwrap();
        assert_eq!(shape.style.stroke, "#16A34A");
    }
}
