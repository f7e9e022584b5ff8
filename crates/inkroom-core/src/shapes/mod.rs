//! Shape definitions for the shared canvas.

mod circle;
mod freehand;
mod line;
mod record;
mod rectangle;

pub use circle::Circle;
pub use freehand::{Freehand, SIMPLIFY_TOLERANCE};
pub use line::Line;
pub use record::{ShapeError, ShapeRecord};
pub use rectangle::Rectangle;

use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Globally unique shape identifier.
///
/// Assigned once when a shape is created and never changed afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeId(String);

impl ShapeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty id can never be broadcast.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShapeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ShapeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Hands out collision-free ids without coordination: `"{peer}_{counter}"`.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    peer: String,
    counter: u64,
}

impl IdGenerator {
    /// Create a generator for the given peer prefix.
    pub fn new(peer: impl Into<String>) -> Self {
        Self {
            peer: peer.into(),
            counter: 0,
        }
    }

    /// Create a generator with a random peer prefix.
    pub fn random() -> Self {
        Self::new(Uuid::new_v4().simple().to_string())
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Allocate the next id.
    pub fn next_id(&mut self) -> ShapeId {
        self.counter += 1;
        ShapeId(format!("{}_{}", self.peer, self.counter))
    }
}

/// Default stroke color.
pub const DEFAULT_STROKE: &str = "#000000";
/// Default stroke width.
pub const DEFAULT_STROKE_WIDTH: f64 = 2.0;
/// Default fill (no fill).
pub const DEFAULT_FILL: &str = "transparent";

fn default_stroke() -> String {
    DEFAULT_STROKE.to_string()
}

fn default_stroke_width() -> f64 {
    DEFAULT_STROKE_WIDTH
}

fn default_fill() -> String {
    DEFAULT_FILL.to_string()
}

fn default_opacity() -> f64 {
    1.0
}

// Peers may send `null` for unset style fields; treat it like an absent field.
fn stroke_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_stroke))
}

fn stroke_width_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(DEFAULT_STROKE_WIDTH))
}

fn fill_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_fill))
}

fn opacity_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(1.0))
}

fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Style properties for shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeStyle {
    /// Stroke color as a CSS color string.
    #[serde(default = "default_stroke", deserialize_with = "stroke_or_default")]
    pub stroke: String,
    /// Stroke width.
    #[serde(default = "default_stroke_width", deserialize_with = "stroke_width_or_default")]
    pub stroke_width: f64,
    /// Dash pattern (empty = solid).
    #[serde(rename = "strokeDashArray", default, deserialize_with = "or_default")]
    pub dash: Vec<f64>,
    /// Fill color as a CSS color string, `"transparent"` for none.
    #[serde(default = "default_fill", deserialize_with = "fill_or_default")]
    pub fill: String,
    /// Overall opacity (0.0 = fully transparent, 1.0 = fully opaque).
    #[serde(default = "default_opacity", deserialize_with = "opacity_or_default")]
    pub opacity: f64,
    #[serde(default, deserialize_with = "or_default")]
    pub flip_x: bool,
    #[serde(default, deserialize_with = "or_default")]
    pub flip_y: bool,
}

impl ShapeStyle {
    /// Whether the interior of a closed shape is painted.
    pub fn is_filled(&self) -> bool {
        !self.fill.is_empty() && self.fill != DEFAULT_FILL
    }
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            stroke: default_stroke(),
            stroke_width: DEFAULT_STROKE_WIDTH,
            dash: Vec::new(),
            fill: default_fill(),
            opacity: 1.0,
            flip_x: false,
            flip_y: false,
        }
    }
}

/// A single style property change, applied to every shape in a selection.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleChange {
    Stroke(String),
    StrokeWidth(f64),
    Dash(Vec<f64>),
    Fill(String),
    Opacity(f64),
    FlipX(bool),
    FlipY(bool),
}

impl StyleChange {
    /// The partial record carrying just this property.
    pub fn to_patch(&self) -> ShapeRecord {
        let (key, value) = match self {
            StyleChange::Stroke(color) => ("stroke", Value::from(color.as_str())),
            StyleChange::StrokeWidth(width) => ("strokeWidth", Value::from(*width)),
            StyleChange::Dash(dash) => ("strokeDashArray", Value::from(dash.clone())),
            StyleChange::Fill(color) => ("fill", Value::from(color.as_str())),
            StyleChange::Opacity(opacity) => ("opacity", Value::from(opacity.clamp(0.0, 1.0))),
            StyleChange::FlipX(flip) => ("flipX", Value::from(*flip)),
            StyleChange::FlipY(flip) => ("flipY", Value::from(*flip)),
        };
        let mut patch = ShapeRecord::new();
        patch.insert(key.to_string(), value);
        patch
    }

    /// Apply the change to a style directly.
    pub fn apply_to(&self, style: &mut ShapeStyle) {
        match self {
            StyleChange::Stroke(color) => style.stroke = color.clone(),
            StyleChange::StrokeWidth(width) => style.stroke_width = *width,
            StyleChange::Dash(dash) => style.dash = dash.clone(),
            StyleChange::Fill(color) => style.fill = color.clone(),
            StyleChange::Opacity(opacity) => style.opacity = opacity.clamp(0.0, 1.0),
            StyleChange::FlipX(flip) => style.flip_x = *flip,
            StyleChange::FlipY(flip) => style.flip_y = *flip,
        }
    }
}

/// The kind of a shape, as named on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    FreehandPath,
    Rectangle,
    Circle,
    Line,
}

impl ShapeKind {
    /// Wire name used in the `type` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeKind::FreehandPath => "path",
            ShapeKind::Rectangle => "rect",
            ShapeKind::Circle => "circle",
            ShapeKind::Line => "line",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "path" => Some(ShapeKind::FreehandPath),
            "rect" => Some(ShapeKind::Rectangle),
            "circle" => Some(ShapeKind::Circle),
            "line" => Some(ShapeKind::Line),
            _ => None,
        }
    }
}

/// Kind-specific geometry, tagged by `type` in the flat record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Geometry {
    Path(Freehand),
    Rect(Rectangle),
    Circle(Circle),
    Line(Line),
}

impl Geometry {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Geometry::Path(_) => ShapeKind::FreehandPath,
            Geometry::Rect(_) => ShapeKind::Rectangle,
            Geometry::Circle(_) => ShapeKind::Circle,
            Geometry::Line(_) => ShapeKind::Line,
        }
    }

    pub fn bounds(&self) -> Rect {
        match self {
            Geometry::Path(s) => s.bounds(),
            Geometry::Rect(s) => s.bounds(),
            Geometry::Circle(s) => s.bounds(),
            Geometry::Line(s) => s.bounds(),
        }
    }

    /// Zero-extent geometry that must never be committed.
    pub fn is_degenerate(&self) -> bool {
        match self {
            Geometry::Path(s) => s.is_degenerate(),
            Geometry::Rect(s) => s.is_degenerate(),
            Geometry::Circle(s) => s.is_degenerate(),
            Geometry::Line(s) => s.is_degenerate(),
        }
    }

    pub fn translate(&mut self, delta: Vec2) {
        match self {
            Geometry::Path(s) => s.translate(delta),
            Geometry::Rect(s) => s.translate(delta),
            Geometry::Circle(s) => s.translate(delta),
            Geometry::Line(s) => s.translate(delta),
        }
    }
}

/// A drawable object with a stable identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shape {
    id: ShapeId,
    #[serde(flatten)]
    pub geometry: Geometry,
    /// Rotation in degrees around the shape's center.
    #[serde(default, deserialize_with = "or_default")]
    pub angle: f64,
    #[serde(flatten)]
    pub style: ShapeStyle,
    /// Local presentation state: whether the shape is selectable.
    #[serde(skip)]
    interactive: bool,
}

// Interactivity is local presentation state and takes no part in equality.
impl PartialEq for Shape {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.geometry == other.geometry
            && self.angle == other.angle
            && self.style == other.style
    }
}

impl Shape {
    /// Create a non-interactive shape.
    pub fn new(id: ShapeId, geometry: Geometry, style: ShapeStyle) -> Self {
        Self {
            id,
            geometry,
            angle: 0.0,
            style,
            interactive: false,
        }
    }

    pub fn rectangle(id: ShapeId, rect: Rectangle, style: ShapeStyle) -> Self {
        Self::new(id, Geometry::Rect(rect), style)
    }

    pub fn circle(id: ShapeId, circle: Circle, style: ShapeStyle) -> Self {
        Self::new(id, Geometry::Circle(circle), style)
    }

    pub fn line(id: ShapeId, line: Line, style: ShapeStyle) -> Self {
        Self::new(id, Geometry::Line(line), style)
    }

    pub fn freehand(id: ShapeId, path: Freehand, style: ShapeStyle) -> Self {
        Self::new(id, Geometry::Path(path), style)
    }

    pub fn id(&self) -> &ShapeId {
        &self.id
    }

    pub fn kind(&self) -> ShapeKind {
        self.geometry.kind()
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    pub fn bounds(&self) -> Rect {
        self.geometry.bounds()
    }

    pub fn is_degenerate(&self) -> bool {
        self.geometry.is_degenerate()
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.geometry.translate(delta);
    }

    /// Check if a point (in world coordinates) hits this shape.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let stroke_width = self.style.stroke_width;
        let filled = self.style.is_filled();
        match &self.geometry {
            Geometry::Path(s) => s.hit_test(point, tolerance + stroke_width / 2.0),
            Geometry::Rect(s) => s.hit_test(point, tolerance, stroke_width, filled),
            Geometry::Circle(s) => s.hit_test(point, tolerance, stroke_width, filled),
            Geometry::Line(s) => s.hit_test(point, tolerance + stroke_width / 2.0),
        }
    }
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = a + seg * t;
    (point - proj).hypot()
}

/// Minimum distance from a point to a polyline (sequence of connected segments).
pub fn point_to_polyline_dist(point: Point, points: &[Point]) -> f64 {
    match points {
        [] => f64::INFINITY,
        [only] => (point - *only).hypot(),
        _ => points
            .windows(2)
            .map(|w| point_to_segment_dist(point, w[0], w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}
