//! Scene model: placed elements, their visual properties, and stacking order.
//!
//! Elements live in a single ordered `Vec`; index 0 is drawn first (bottom)
//! and the last element is on top. Every element carries a UUID assigned at
//! construction, so connectors and selections can refer to it at any time.
//!
//! Geometry follows the 2D canvas convention: an element's local box is
//! scaled by `(scale_x, scale_y)`, rotated clockwise by `rotation` degrees,
//! then translated to `(x, y)`. With `Origin::Center` the local box is
//! centered on `(x, y)`; with `Origin::TopLeft` its corner sits there.
//! Lines ignore the pose and store absolute endpoints.

#[cfg(test)]
#[path = "scene_test.rs"]
mod scene_test;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consts;
use crate::viewport::{Point, Rect};

/// Unique identifier for a scene element.
pub type ElementId = Uuid;

/// Pointer distance, in virtual units, within which a line counts as hit.
const LINE_HIT_TOLERANCE: f64 = 5.0;

/// Where the pose position sits relative to the element's local box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    TopLeft,
    #[default]
    Center,
}

/// Position, scale and rotation shared by every element kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    /// Clockwise rotation in degrees.
    pub rotation: f64,
    #[serde(default)]
    pub origin: Origin,
}

impl Pose {
    #[must_use]
    pub fn at(position: Point) -> Self {
        Self { x: position.x, y: position.y, scale_x: 1.0, scale_y: 1.0, rotation: 0.0, origin: Origin::Center }
    }

    /// Map a local point into virtual space.
    #[must_use]
    pub fn apply(&self, local: Point) -> Point {
        let (sin, cos) = self.rotation.to_radians().sin_cos();
        let sx = local.x * self.scale_x;
        let sy = local.y * self.scale_y;
        Point::new(self.x + sx * cos - sy * sin, self.y + sx * sin + sy * cos)
    }

    /// Map a virtual point into local space. `None` when a scale factor is zero.
    #[must_use]
    pub fn invert(&self, point: Point) -> Option<Point> {
        if self.scale_x == 0.0 || self.scale_y == 0.0 {
            return None;
        }
        let (sin, cos) = self.rotation.to_radians().sin_cos();
        let dx = point.x - self.x;
        let dy = point.y - self.y;
        let rx = dx * cos + dy * sin;
        let ry = -dx * sin + dy * cos;
        Some(Point::new(rx / self.scale_x, ry / self.scale_y))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub color: String,
    pub width: f64,
}

/// Paint applied to an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub fill: Option<String>,
    pub stroke: Option<Stroke>,
    /// 0.0 (transparent) to 1.0 (opaque).
    pub opacity: f64,
}

impl Style {
    #[must_use]
    pub fn filled(color: &str) -> Self {
        Self { fill: Some(color.to_owned()), stroke: None, opacity: 1.0 }
    }

    #[must_use]
    pub fn stroked(color: &str, width: f64) -> Self {
        Self { fill: None, stroke: Some(Stroke { color: color.to_owned(), width }), opacity: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub family: String,
    pub size: f64,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            family: consts::DEFAULT_FONT_FAMILY.to_owned(),
            size: consts::DEFAULT_FONT_SIZE,
            bold: false,
            italic: false,
            underline: false,
        }
    }
}

impl TextStyle {
    /// CSS `font` shorthand, e.g. `"italic bold 24px Arial"`.
    #[must_use]
    pub fn css_font(&self) -> String {
        let mut parts = Vec::new();
        if self.italic {
            parts.push("italic".to_owned());
        }
        if self.bold {
            parts.push("bold".to_owned());
        }
        parts.push(format!("{}px {}", self.size, self.family));
        parts.join(" ")
    }
}

/// Image adjustments, expressed the way CSS filter functions take them.
/// Ratios are neutral at 1.0; blur is in pixels.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageFilters {
    pub brightness: f64,
    pub contrast: f64,
    pub saturation: f64,
    pub blur: f64,
    pub grayscale: bool,
    pub sepia: bool,
    pub invert: bool,
}

impl Default for ImageFilters {
    fn default() -> Self {
        Self { brightness: 1.0, contrast: 1.0, saturation: 1.0, blur: 0.0, grayscale: false, sepia: false, invert: false }
    }
}

impl ImageFilters {
    #[must_use]
    pub fn is_neutral(&self) -> bool {
        *self == Self::default()
    }

    /// Value for `CanvasRenderingContext2d.filter`; `"none"` when neutral.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn css_filter(&self) -> String {
        let mut parts = Vec::new();
        if self.brightness != 1.0 {
            parts.push(format!("brightness({})", self.brightness));
        }
        if self.contrast != 1.0 {
            parts.push(format!("contrast({})", self.contrast));
        }
        if self.saturation != 1.0 {
            parts.push(format!("saturate({})", self.saturation));
        }
        if self.blur > 0.0 {
            parts.push(format!("blur({}px)", self.blur));
        }
        if self.grayscale {
            parts.push("grayscale(1)".to_owned());
        }
        if self.sepia {
            parts.push("sepia(1)".to_owned());
        }
        if self.invert {
            parts.push("invert(1)".to_owned());
        }
        if parts.is_empty() { "none".to_owned() } else { parts.join(" ") }
    }
}

/// Kind-specific payload of an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementKind {
    Text { text: String, font: TextStyle },
    Rectangle { width: f64, height: f64 },
    Circle { radius: f64 },
    /// Isosceles triangle pointing up, apex at the top edge midpoint.
    Triangle { width: f64, height: f64 },
    /// Closed polygon; points are relative to the pose position.
    Polygon { points: Vec<Point> },
    /// Open polyline; points are relative to the pose position.
    Path { points: Vec<Point> },
    Image { src: String, width: f64, height: f64, #[serde(default)] filters: ImageFilters },
    /// Straight segment between absolute virtual endpoints.
    Line { x1: f64, y1: f64, x2: f64, y2: f64, #[serde(default)] dash: Vec<f64> },
}

impl ElementKind {
    /// Short lowercase name used in the properties panel.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Rectangle { .. } => "rectangle",
            Self::Circle { .. } => "circle",
            Self::Triangle { .. } => "triangle",
            Self::Polygon { .. } => "polygon",
            Self::Path { .. } => "path",
            Self::Image { .. } => "image",
            Self::Line { .. } => "line",
        }
    }
}

/// A placed visual item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    pub kind: ElementKind,
    pub pose: Pose,
    pub style: Style,
    /// `false` for elements the user cannot pick, such as connector lines.
    #[serde(default = "default_interactive")]
    pub interactive: bool,
}

fn default_interactive() -> bool {
    true
}

impl Element {
    /// Build an element with a fresh id.
    #[must_use]
    pub fn new(kind: ElementKind, pose: Pose, style: Style) -> Self {
        Self { id: Uuid::new_v4(), kind, pose, style, interactive: true }
    }

    #[must_use]
    pub fn text(content: &str, font: TextStyle, color: &str, at: Point) -> Self {
        Self::new(ElementKind::Text { text: content.to_owned(), font }, Pose::at(at), Style::filled(color))
    }

    #[must_use]
    pub fn rectangle(at: Point, color: &str) -> Self {
        let size = consts::DEFAULT_SHAPE_SIZE;
        Self::new(ElementKind::Rectangle { width: size, height: size }, Pose::at(at), Style::filled(color))
    }

    #[must_use]
    pub fn circle(at: Point, color: &str) -> Self {
        Self::new(ElementKind::Circle { radius: consts::DEFAULT_RADIUS }, Pose::at(at), Style::filled(color))
    }

    #[must_use]
    pub fn triangle(at: Point, color: &str) -> Self {
        let size = consts::DEFAULT_SHAPE_SIZE;
        Self::new(ElementKind::Triangle { width: size, height: size }, Pose::at(at), Style::filled(color))
    }

    /// Regular-ish pentagon inscribed in the default radius.
    #[must_use]
    pub fn pentagon(at: Point, color: &str) -> Self {
        let points = [(0.0, -50.0), (47.0, -15.0), (29.0, 40.0), (-29.0, 40.0), (-47.0, -15.0)]
            .into_iter()
            .map(|(x, y)| Point::new(x, y))
            .collect();
        Self::new(ElementKind::Polygon { points }, Pose::at(at), Style::filled(color))
    }

    /// Image scaled so its longest side is at most `max_dimension`.
    #[must_use]
    pub fn image(src: String, natural_width: f64, natural_height: f64, max_dimension: f64, at: Point) -> Self {
        let longest = natural_width.max(natural_height);
        let factor = if longest > max_dimension && longest > 0.0 { max_dimension / longest } else { 1.0 };
        let mut pose = Pose::at(at);
        pose.scale_x = factor;
        pose.scale_y = factor;
        let kind = ElementKind::Image { src, width: natural_width, height: natural_height, filters: ImageFilters::default() };
        Self::new(kind, pose, Style { fill: None, stroke: None, opacity: 1.0 })
    }

    /// Non-interactive segment used by connectors.
    #[must_use]
    pub fn line(from: Point, to: Point, color: &str, width: f64, dash: Vec<f64>) -> Self {
        let kind = ElementKind::Line { x1: from.x, y1: from.y, x2: to.x, y2: to.y, dash };
        let mut element = Self::new(kind, Pose::at(Point::default()), Style::stroked(color, width));
        element.interactive = false;
        element
    }

    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self.kind, ElementKind::Text { .. })
    }

    #[must_use]
    pub fn is_image(&self) -> bool {
        matches!(self.kind, ElementKind::Image { .. })
    }

    /// Unscaled, unrotated box relative to the pose position.
    #[must_use]
    pub fn local_rect(&self) -> Rect {
        let (width, height) = match &self.kind {
            ElementKind::Text { text, font } => text_extent(text, font),
            ElementKind::Rectangle { width, height }
            | ElementKind::Triangle { width, height }
            | ElementKind::Image { width, height, .. } => (*width, *height),
            ElementKind::Circle { radius } => (radius * 2.0, radius * 2.0),
            ElementKind::Polygon { points } | ElementKind::Path { points } => {
                return Rect::from_points(points.iter().copied()).unwrap_or_default();
            }
            ElementKind::Line { x1, y1, x2, y2, .. } => {
                return Rect::from_points([Point::new(*x1, *y1), Point::new(*x2, *y2)]).unwrap_or_default();
            }
        };
        match self.pose.origin {
            Origin::Center => Rect::new(-width / 2.0, -height / 2.0, width, height),
            Origin::TopLeft => Rect::new(0.0, 0.0, width, height),
        }
    }

    /// Axis-aligned bounding box in virtual space, after scale and rotation.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        let local = self.local_rect();
        if matches!(self.kind, ElementKind::Line { .. }) {
            return local;
        }
        let corners = [
            Point::new(local.x, local.y),
            Point::new(local.right(), local.y),
            Point::new(local.right(), local.bottom()),
            Point::new(local.x, local.bottom()),
        ];
        Rect::from_points(corners.into_iter().map(|c| self.pose.apply(c))).unwrap_or(local)
    }

    /// Center of the transformed local box; the midpoint for lines.
    #[must_use]
    pub fn center(&self) -> Point {
        let local = self.local_rect();
        if matches!(self.kind, ElementKind::Line { .. }) {
            return local.center();
        }
        self.pose.apply(local.center())
    }

    /// Whether a virtual point falls on this element.
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        if let ElementKind::Line { x1, y1, x2, y2, .. } = self.kind {
            let half_width = self.style.stroke.as_ref().map_or(0.0, |s| s.width / 2.0);
            let tolerance = half_width.max(LINE_HIT_TOLERANCE);
            return distance_to_segment(point, Point::new(x1, y1), Point::new(x2, y2)) <= tolerance;
        }
        let Some(local) = self.pose.invert(point) else {
            return false;
        };
        match &self.kind {
            ElementKind::Circle { radius } => {
                let c = self.local_rect().center();
                (local.x - c.x).hypot(local.y - c.y) <= *radius
            }
            _ => self.local_rect().contains(local),
        }
    }

    /// Translate by a virtual delta.
    pub fn move_by(&mut self, dx: f64, dy: f64) {
        if let ElementKind::Line { x1, y1, x2, y2, .. } = &mut self.kind {
            *x1 += dx;
            *y1 += dy;
            *x2 += dx;
            *y2 += dy;
        } else {
            self.pose.x += dx;
            self.pose.y += dy;
        }
    }

    /// Copy with a fresh id, shifted by `(offset, offset)`.
    #[must_use]
    pub fn duplicate(&self, offset: f64) -> Self {
        let mut copy = self.clone();
        copy.id = Uuid::new_v4();
        copy.move_by(offset, offset);
        copy
    }
}

/// Approximate text box: 0.6 em per glyph, 1.2 em per line.
fn text_extent(text: &str, font: &TextStyle) -> (f64, f64) {
    let longest = text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
    let lines = text.lines().count().max(1);
    #[allow(clippy::cast_precision_loss)]
    let (longest, lines) = (longest as f64, lines as f64);
    (
        longest * font.size * consts::TEXT_ADVANCE_RATIO,
        lines * font.size * consts::TEXT_LINE_HEIGHT_RATIO,
    )
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let (vx, vy) = (b.x - a.x, b.y - a.y);
    let len_sq = vx * vx + vy * vy;
    if len_sq == 0.0 {
        return (p.x - a.x).hypot(p.y - a.y);
    }
    let t = (((p.x - a.x) * vx + (p.y - a.y) * vy) / len_sq).clamp(0.0, 1.0);
    (p.x - (a.x + t * vx)).hypot(p.y - (a.y + t * vy))
}

/// Ordered element store. Later elements are drawn above earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    elements: Vec<Element>,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a scene from elements in bottom-to-top order.
    #[must_use]
    pub fn from_elements(elements: Vec<Element>) -> Self {
        Self { elements }
    }

    /// Add an element on top of the stack and return its id.
    pub fn add(&mut self, element: Element) -> ElementId {
        let id = element.id;
        self.elements.push(element);
        id
    }

    /// Remove an element, returning it if it was present.
    pub fn remove(&mut self, id: &ElementId) -> Option<Element> {
        let index = self.index_of(id)?;
        Some(self.elements.remove(index))
    }

    #[must_use]
    pub fn get(&self, id: &ElementId) -> Option<&Element> {
        self.elements.iter().find(|e| &e.id == id)
    }

    pub fn get_mut(&mut self, id: &ElementId) -> Option<&mut Element> {
        self.elements.iter_mut().find(|e| &e.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &ElementId) -> bool {
        self.index_of(id).is_some()
    }

    /// Stack position, 0 being the bottom.
    #[must_use]
    pub fn index_of(&self, id: &ElementId) -> Option<usize> {
        self.elements.iter().position(|e| &e.id == id)
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    /// Elements in draw order.
    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }

    #[must_use]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Swap with the element above. Returns `false` if already on top or missing.
    pub fn bring_forward(&mut self, id: &ElementId) -> bool {
        match self.index_of(id) {
            Some(i) if i + 1 < self.elements.len() => {
                self.elements.swap(i, i + 1);
                true
            }
            _ => false,
        }
    }

    /// Swap with the element below. Returns `false` if already at the bottom or missing.
    pub fn send_backward(&mut self, id: &ElementId) -> bool {
        match self.index_of(id) {
            Some(i) if i > 0 => {
                self.elements.swap(i, i - 1);
                true
            }
            _ => false,
        }
    }

    pub fn bring_to_front(&mut self, id: &ElementId) -> bool {
        match self.index_of(id) {
            Some(i) if i + 1 < self.elements.len() => {
                let element = self.elements.remove(i);
                self.elements.push(element);
                true
            }
            _ => false,
        }
    }

    pub fn send_to_back(&mut self, id: &ElementId) -> bool {
        match self.index_of(id) {
            Some(i) if i > 0 => {
                let element = self.elements.remove(i);
                self.elements.insert(0, element);
                true
            }
            _ => false,
        }
    }

    /// Topmost interactive element under a virtual point.
    #[must_use]
    pub fn hit_test(&self, point: Point) -> Option<ElementId> {
        self.elements.iter().rev().find(|e| e.interactive && e.contains(point)).map(|e| e.id)
    }

    #[must_use]
    pub fn bounds(&self, id: &ElementId) -> Option<Rect> {
        self.get(id).map(Element::bounds)
    }

    #[must_use]
    pub fn center(&self, id: &ElementId) -> Option<Point> {
        self.get(id).map(Element::center)
    }

    /// Union of the bounding boxes of the given elements. Missing ids are skipped.
    #[must_use]
    pub fn union_bounds(&self, ids: &[ElementId]) -> Option<Rect> {
        ids.iter().filter_map(|id| self.bounds(id)).reduce(|a, b| a.union(&b))
    }

    /// Serialize the whole scene to JSON text.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; in practice only non-string map keys fail.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a scene previously produced by [`Scene::to_json`].
    ///
    /// # Errors
    ///
    /// Returns the parse error for malformed or mismatched JSON.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
