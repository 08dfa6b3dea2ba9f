//! Selection, the properties panel model, and style edits.
//!
//! At most one element or one group is active. Non-interactive elements
//! (connector lines and arrowheads) can never be selected: a selection that
//! names only such elements collapses to nothing. The properties view is
//! read from the first selected element; edits are written to every
//! selected element the edit applies to.

#[cfg(test)]
#[path = "properties_test.rs"]
mod properties_test;

use serde::Serialize;
use serde_json::Value;

use crate::color::normalize_hex_color;
use crate::consts;
use crate::scene::{Element, ElementId, ElementKind, ImageFilters, Scene, Stroke, TextStyle};

/// The active element or group.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    None,
    Single(ElementId),
    Group(Vec<ElementId>),
}

impl Selection {
    /// Build a selection from requested ids, dropping missing and
    /// non-interactive elements.
    #[must_use]
    pub fn sanitize(scene: &Scene, requested: &[ElementId]) -> Self {
        let mut ids: Vec<ElementId> = Vec::new();
        for id in requested {
            let pickable = scene.get(id).is_some_and(|e| e.interactive);
            if pickable && !ids.contains(id) {
                ids.push(*id);
            }
        }
        match ids.len() {
            0 => Self::None,
            1 => Self::Single(ids[0]),
            _ => Self::Group(ids),
        }
    }

    #[must_use]
    pub fn ids(&self) -> Vec<ElementId> {
        match self {
            Self::None => Vec::new(),
            Self::Single(id) => vec![*id],
            Self::Group(ids) => ids.clone(),
        }
    }

    #[must_use]
    pub fn primary(&self) -> Option<ElementId> {
        match self {
            Self::None => None,
            Self::Single(id) => Some(*id),
            Self::Group(ids) => ids.first().copied(),
        }
    }

    #[must_use]
    pub fn contains(&self, id: &ElementId) -> bool {
        match self {
            Self::None => false,
            Self::Single(s) => s == id,
            Self::Group(ids) => ids.contains(id),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::None)
    }

    /// The same selection without `id`, collapsing a group of one.
    #[must_use]
    pub fn without(&self, id: &ElementId) -> Self {
        let remaining: Vec<ElementId> = self.ids().into_iter().filter(|s| s != id).collect();
        match remaining.len() {
            0 => Self::None,
            1 => Self::Single(remaining[0]),
            _ => Self::Group(remaining),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextProperties {
    pub color: String,
    pub family: String,
    pub size: f64,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

/// What the properties panel shows for the active selection.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertiesView {
    pub ids: Vec<ElementId>,
    /// Element kind name, or `"group"`.
    pub kind: String,
    /// Opacity as a whole percentage for the slider.
    pub opacity_percent: u32,
    pub stroke_enabled: bool,
    pub stroke_color: String,
    pub stroke_width: f64,
    pub fill: Option<String>,
    pub text: Option<TextProperties>,
    pub filters: Option<ImageFilters>,
    pub rotation: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl PropertiesView {
    /// `None` when nothing (valid) is selected.
    #[must_use]
    pub fn build(scene: &Scene, selection: &Selection) -> Option<Self> {
        let element = scene.get(&selection.primary()?)?;
        let kind = match selection {
            Selection::Group(_) => "group".to_owned(),
            _ => element.kind.name().to_owned(),
        };
        let (stroke_enabled, stroke_color, stroke_width) = match &element.style.stroke {
            Some(s) => (true, normalize_hex_color(&s.color, consts::DEFAULT_STROKE_COLOR), s.width),
            None => (false, consts::DEFAULT_STROKE_COLOR.to_owned(), consts::DEFAULT_STROKE_WIDTH),
        };
        let text = match &element.kind {
            ElementKind::Text { font, .. } => Some(TextProperties {
                color: fill_hex(element),
                family: font.family.clone(),
                size: font.size,
                bold: font.bold,
                italic: font.italic,
                underline: font.underline,
            }),
            _ => None,
        };
        let filters = match &element.kind {
            ElementKind::Image { filters, .. } => Some(filters.clone()),
            _ => None,
        };
        let fill = text.is_none().then(|| match &element.style.fill {
            Some(color) => normalize_hex_color(color, consts::DEFAULT_COLOR),
            None => consts::EMPTY_FILL.to_owned(),
        });
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let opacity_percent = (element.style.opacity.clamp(0.0, 1.0) * 100.0).round() as u32;
        Some(Self {
            ids: selection.ids(),
            kind,
            opacity_percent,
            stroke_enabled,
            stroke_color,
            stroke_width,
            fill,
            text,
            filters,
            rotation: element.pose.rotation,
            scale_x: element.pose.scale_x,
            scale_y: element.pose.scale_y,
        })
    }
}

fn fill_hex(element: &Element) -> String {
    normalize_hex_color(element.style.fill.as_deref().unwrap_or(""), consts::DEFAULT_COLOR)
}

/// One change made in the properties panel.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyEdit {
    /// 0.0 to 1.0; out-of-range values are clamped.
    Opacity(f64),
    /// `Some` turns the border on with the given paint, `None` turns it off.
    Stroke(Option<Stroke>),
    /// Only affects elements that already have a border.
    StrokeColor(String),
    /// Only affects elements that already have a border.
    StrokeWidth(f64),
    /// Fill for shapes, and the backdrop behind an image; ignored by text and lines.
    Fill(String),
    TextColor(String),
    TextContent(String),
    FontFamily(String),
    FontSize(f64),
    Bold(bool),
    Italic(bool),
    Underline(bool),
    Filters(ImageFilters),
    Rotation(f64),
    Scale { x: f64, y: f64 },
}

impl PropertyEdit {
    /// Whether connectors must be refreshed after this edit.
    #[must_use]
    pub fn changes_geometry(&self) -> bool {
        matches!(
            self,
            Self::Rotation(_) | Self::Scale { .. } | Self::FontSize(_) | Self::FontFamily(_) | Self::TextContent(_)
        )
    }
}

impl PropertyEdit {
    /// Build an edit from a properties-panel field name and its JSON value.
    /// Opacity arrives as a whole percentage, the way the slider reports it.
    ///
    /// # Errors
    ///
    /// Returns a message naming the field for unknown fields and values of
    /// the wrong shape.
    pub fn from_field(field: &str, value: &Value) -> Result<Self, String> {
        let number = || value.as_f64().ok_or_else(|| format!("{field}: expected a number"));
        let text = || value.as_str().map(str::to_owned).ok_or_else(|| format!("{field}: expected a string"));
        let flag = || value.as_bool().ok_or_else(|| format!("{field}: expected a boolean"));
        Ok(match field {
            "opacity" => Self::Opacity(number()? / 100.0),
            "stroke" => Self::Stroke(flag()?.then(|| Stroke {
                color: consts::DEFAULT_STROKE_COLOR.to_owned(),
                width: consts::DEFAULT_STROKE_WIDTH,
            })),
            "stroke-color" => Self::StrokeColor(text()?),
            "stroke-width" => Self::StrokeWidth(number()?),
            "fill" => Self::Fill(text()?),
            "text-color" => Self::TextColor(text()?),
            "text" => Self::TextContent(text()?),
            "font-family" => Self::FontFamily(text()?),
            "font-size" => Self::FontSize(number()?),
            "bold" => Self::Bold(flag()?),
            "italic" => Self::Italic(flag()?),
            "underline" => Self::Underline(flag()?),
            "rotation" => Self::Rotation(number()?),
            "scale" => {
                let factor = number()?;
                Self::Scale { x: factor, y: factor }
            }
            "filters" => Self::Filters(
                serde_json::from_value(value.clone()).map_err(|e| format!("{field}: {e}"))?,
            ),
            other => return Err(format!("unknown property: {other}")),
        })
    }
}

/// Apply an edit to every listed element it is meaningful for.
/// Returns the number of elements changed.
pub fn apply_edit(scene: &mut Scene, ids: &[ElementId], edit: &PropertyEdit) -> usize {
    let mut changed = 0;
    for id in ids {
        let Some(element) = scene.get_mut(id) else {
            continue;
        };
        if !element.interactive {
            continue;
        }
        if apply_to(element, edit) {
            changed += 1;
        }
    }
    changed
}

fn apply_to(element: &mut Element, edit: &PropertyEdit) -> bool {
    let is_shape = matches!(
        element.kind,
        ElementKind::Rectangle { .. }
            | ElementKind::Circle { .. }
            | ElementKind::Triangle { .. }
            | ElementKind::Polygon { .. }
            | ElementKind::Path { .. }
    );
    match edit {
        PropertyEdit::Opacity(value) => {
            element.style.opacity = value.clamp(0.0, 1.0);
        }
        PropertyEdit::Stroke(stroke) => {
            element.style.stroke = stroke.as_ref().map(|s| Stroke {
                color: normalize_hex_color(&s.color, consts::DEFAULT_STROKE_COLOR),
                width: s.width.max(0.0),
            });
        }
        PropertyEdit::StrokeColor(color) => {
            let Some(stroke) = element.style.stroke.as_mut() else {
                return false;
            };
            stroke.color = normalize_hex_color(color, &stroke.color);
        }
        PropertyEdit::StrokeWidth(width) => {
            let Some(stroke) = element.style.stroke.as_mut() else {
                return false;
            };
            stroke.width = width.max(0.0);
        }
        PropertyEdit::Fill(color) => {
            if !(is_shape || element.is_image()) {
                return false;
            }
            element.style.fill = Some(normalize_hex_color(color, consts::DEFAULT_COLOR));
        }
        PropertyEdit::TextColor(color) => {
            if !element.is_text() {
                return false;
            }
            element.style.fill = Some(normalize_hex_color(color, consts::DEFAULT_COLOR));
        }
        PropertyEdit::TextContent(content) => {
            let ElementKind::Text { text, .. } = &mut element.kind else {
                return false;
            };
            text.clone_from(content);
        }
        PropertyEdit::FontFamily(_)
        | PropertyEdit::FontSize(_)
        | PropertyEdit::Bold(_)
        | PropertyEdit::Italic(_)
        | PropertyEdit::Underline(_) => {
            let ElementKind::Text { font, .. } = &mut element.kind else {
                return false;
            };
            apply_font(font, edit);
        }
        PropertyEdit::Filters(filters) => {
            let ElementKind::Image { filters: current, .. } = &mut element.kind else {
                return false;
            };
            *current = filters.clone();
        }
        PropertyEdit::Rotation(degrees) => {
            element.pose.rotation = *degrees;
        }
        PropertyEdit::Scale { x, y } => {
            element.pose.scale_x = *x;
            element.pose.scale_y = *y;
        }
    }
    true
}

fn apply_font(font: &mut TextStyle, edit: &PropertyEdit) {
    match edit {
        PropertyEdit::FontFamily(family) => font.family.clone_from(family),
        PropertyEdit::FontSize(size) if *size > 0.0 => font.size = *size,
        PropertyEdit::Bold(on) => font.bold = *on,
        PropertyEdit::Italic(on) => font.italic = *on,
        PropertyEdit::Underline(on) => font.underline = *on,
        _ => {}
    }
}

/// Toolbar state used when creating new elements.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawingDefaults {
    pub color: String,
    pub font: TextStyle,
    pub swatches: Vec<String>,
}

impl Default for DrawingDefaults {
    fn default() -> Self {
        Self {
            color: consts::DEFAULT_COLOR.to_owned(),
            font: TextStyle::default(),
            swatches: consts::DEFAULT_SWATCHES.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

impl DrawingDefaults {
    /// Add a swatch in canonical form. Returns `false` for duplicates and
    /// unparseable colors.
    pub fn add_swatch(&mut self, color: &str) -> bool {
        if crate::color::parse_color(color).is_none() {
            return false;
        }
        let hex = normalize_hex_color(color, consts::DEFAULT_COLOR);
        if self.swatches.contains(&hex) {
            return false;
        }
        self.swatches.push(hex);
        true
    }

    pub fn set_color(&mut self, color: &str) {
        self.color = normalize_hex_color(color, &self.color);
    }
}
