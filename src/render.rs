//! Rendering: draws the board, the minimap and export rasters to 2D contexts.
//!
//! This module is the only place that touches [`web_sys::CanvasRenderingContext2d`].
//! It receives read-only views of engine state and produces pixels; the only
//! state it owns is the cache of decoded images.
//!
//! All fallible `Canvas2D` calls propagate errors via `Result<(), JsValue>`.
//! The top-level caller ([`crate::engine::Engine::render`]) handles the result.

use std::collections::HashMap;
use std::f64::consts::TAU;

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlImageElement};

use crate::consts::{GRID_SPACING, SELECTION_DASH_PX, TEXT_LINE_HEIGHT_RATIO};
use crate::engine::EngineCore;
use crate::export::ExportPlan;
use crate::minimap::MinimapView;
use crate::scene::{Element, ElementKind, Scene, TextStyle};
use crate::viewport::{Point, Rect};

const CANVAS_BACKGROUND: &str = "#ffffff";
const CANVAS_BORDER: &str = "#d0d0d0";
const GRID_COLOR: &str = "#e5e5e5";
const SELECTION_COLOR: &str = "#1e88e5";
const PREVIEW_COLOR: &str = "#1e88e5";
const MINIMAP_BACKGROUND: &str = "#f0f0f0";
const MINIMAP_ELEMENT: &str = "#9e9e9e";
const MINIMAP_VIEWPORT: &str = "#e74c3c";

/// Selection outline padding in screen pixels.
const SELECTION_PADDING_PX: f64 = 4.0;

/// Decoded images keyed by source URL.
///
/// Uploads insert their already-decoded element; sources seen for the first
/// time while drawing (restored boards) start loading and appear on a later
/// frame.
#[derive(Default)]
pub struct ImageCache {
    images: HashMap<String, HtmlImageElement>,
}

impl ImageCache {
    pub fn insert(&mut self, src: String, image: HtmlImageElement) {
        self.images.insert(src, image);
    }

    /// Start loading every image source in the scene that is not cached yet
    /// and return the new elements so the caller can redraw once they decode.
    ///
    /// # Errors
    ///
    /// Fails if an `<img>` element cannot be created.
    pub fn preload(&mut self, scene: &Scene) -> Result<Vec<HtmlImageElement>, JsValue> {
        let mut started = Vec::new();
        for element in scene.iter() {
            if let ElementKind::Image { src, .. } = &element.kind {
                if !self.images.contains_key(src) {
                    let image = HtmlImageElement::new()?;
                    image.set_src(src);
                    self.images.insert(src.clone(), image.clone());
                    started.push(image);
                }
            }
        }
        Ok(started)
    }

    /// The image for `src` if it has finished decoding.
    #[must_use]
    pub fn ready(&self, src: &str) -> Option<&HtmlImageElement> {
        self.images.get(src).filter(|img| img.complete() && img.natural_width() > 0)
    }
}

/// The 2D context of a canvas element.
///
/// # Errors
///
/// Fails if the browser refuses a 2D context.
pub fn context_2d(canvas: &HtmlCanvasElement) -> Result<CanvasRenderingContext2d, JsValue> {
    canvas
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("canvas has no 2d context"))?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(JsValue::from)
}

/// Size the backing store for `width` x `height` CSS pixels at `dpr`.
pub fn size_canvas(canvas: &HtmlCanvasElement, width_css: f64, height_css: f64, dpr: f64) {
    canvas.set_width(to_pixels(width_css * dpr));
    canvas.set_height(to_pixels(height_css * dpr));
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_pixels(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 { value.round().min(f64::from(u32::MAX)) as u32 } else { 0 }
}

/// Draw the full board: canvas background, grid, elements, connection
/// preview and selection outline.
///
/// # Errors
///
/// Returns `Err` if any `Canvas2D` call fails (e.g. invalid context state).
pub fn draw(
    ctx: &CanvasRenderingContext2d,
    core: &EngineCore,
    images: &ImageCache,
    dpr: f64,
) -> Result<(), JsValue> {
    let vp = &core.viewport;

    // Layer 1: clear and set up transforms.
    ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0)?;
    ctx.clear_rect(0.0, 0.0, vp.window_width, vp.window_height);
    ctx.translate(vp.offset_x, vp.offset_y)?;
    ctx.scale(vp.scale, vp.scale)?;

    // Layer 2: the virtual canvas itself.
    let canvas = vp.virtual_rect();
    ctx.set_fill_style_str(CANVAS_BACKGROUND);
    ctx.fill_rect(canvas.x, canvas.y, canvas.width, canvas.height);
    ctx.set_stroke_style_str(CANVAS_BORDER);
    ctx.set_line_width(1.0 / vp.scale);
    ctx.stroke_rect(canvas.x, canvas.y, canvas.width, canvas.height);
    if core.ui.show_grid {
        draw_grid(ctx, canvas, vp.scale);
    }

    // Layer 3: elements in z-order (bottom first).
    draw_scene(ctx, &core.scene, images)?;

    // Layer 4: connection preview.
    if let (Some(source), Some(to)) = (core.ui.pending_source, core.ui.connect_preview) {
        if let Some(from) = core.scene.center(&source) {
            draw_preview(ctx, from, to, vp.scale)?;
        }
    }

    // Layer 5: selection UI.
    for id in core.ui.selection.ids() {
        if let Some(bounds) = core.scene.bounds(&id) {
            draw_selection(ctx, bounds, vp.scale)?;
        }
    }

    Ok(())
}

/// Draw the minimap: canvas outline, one box per element, visible window.
///
/// # Errors
///
/// Propagates `Canvas2D` failures.
pub fn draw_minimap(ctx: &CanvasRenderingContext2d, view: &MinimapView, dpr: f64) -> Result<(), JsValue> {
    ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0)?;
    ctx.clear_rect(0.0, 0.0, view.canvas.width, view.canvas.height);
    ctx.set_fill_style_str(MINIMAP_BACKGROUND);
    ctx.fill_rect(view.canvas.x, view.canvas.y, view.canvas.width, view.canvas.height);

    ctx.set_fill_style_str(MINIMAP_ELEMENT);
    for (_, rect) in &view.elements {
        ctx.fill_rect(rect.x, rect.y, rect.width.max(1.0), rect.height.max(1.0));
    }

    ctx.set_stroke_style_str(MINIMAP_VIEWPORT);
    ctx.set_line_width(2.0);
    ctx.stroke_rect(view.viewport.x, view.viewport.y, view.viewport.width, view.viewport.height);
    Ok(())
}

/// Draw the region of the board named by `plan` into an export context
/// already sized to the plan's pixel dimensions.
///
/// # Errors
///
/// Propagates `Canvas2D` failures.
pub fn draw_export(
    ctx: &CanvasRenderingContext2d,
    scene: &Scene,
    images: &ImageCache,
    plan: &ExportPlan,
) -> Result<(), JsValue> {
    let s = plan.pixel_scale;
    ctx.set_transform(s, 0.0, 0.0, s, -plan.crop.x * s, -plan.crop.y * s)?;
    ctx.set_fill_style_str(CANVAS_BACKGROUND);
    ctx.fill_rect(plan.crop.x, plan.crop.y, plan.crop.width, plan.crop.height);
    draw_scene(ctx, scene, images)
}

fn draw_scene(ctx: &CanvasRenderingContext2d, scene: &Scene, images: &ImageCache) -> Result<(), JsValue> {
    for element in scene.iter() {
        draw_element(ctx, element, images)?;
    }
    Ok(())
}

// =============================================================
// Element dispatch
// =============================================================

fn draw_element(ctx: &CanvasRenderingContext2d, element: &Element, images: &ImageCache) -> Result<(), JsValue> {
    ctx.save();
    ctx.set_global_alpha(element.style.opacity.clamp(0.0, 1.0));

    if let ElementKind::Line { x1, y1, x2, y2, dash } = &element.kind {
        draw_line(ctx, element, Point::new(*x1, *y1), Point::new(*x2, *y2), dash)?;
        ctx.restore();
        return Ok(());
    }

    let pose = &element.pose;
    ctx.translate(pose.x, pose.y)?;
    ctx.rotate(pose.rotation.to_radians())?;
    ctx.scale(pose.scale_x, pose.scale_y)?;
    let local = element.local_rect();

    match &element.kind {
        ElementKind::Rectangle { .. } => {
            ctx.begin_path();
            ctx.rect(local.x, local.y, local.width, local.height);
            paint(ctx, element);
        }
        ElementKind::Circle { radius } => {
            let c = local.center();
            ctx.begin_path();
            ctx.arc(c.x, c.y, *radius, 0.0, TAU)?;
            paint(ctx, element);
        }
        ElementKind::Triangle { .. } => {
            ctx.begin_path();
            ctx.move_to(local.center().x, local.y);
            ctx.line_to(local.right(), local.bottom());
            ctx.line_to(local.x, local.bottom());
            ctx.close_path();
            paint(ctx, element);
        }
        ElementKind::Polygon { points } => {
            trace(ctx, points);
            ctx.close_path();
            paint(ctx, element);
        }
        ElementKind::Path { points } => {
            trace(ctx, points);
            apply_stroke(ctx, element);
            ctx.stroke();
        }
        ElementKind::Image { src, filters, .. } => {
            if let Some(fill) = &element.style.fill {
                ctx.set_fill_style_str(fill);
                ctx.fill_rect(local.x, local.y, local.width, local.height);
            }
            if let Some(image) = images.ready(src) {
                ctx.set_filter(&filters.css_filter());
                ctx.draw_image_with_html_image_element_and_dw_and_dh(
                    image,
                    local.x,
                    local.y,
                    local.width,
                    local.height,
                )?;
                ctx.set_filter("none");
            }
            if element.style.stroke.is_some() {
                ctx.begin_path();
                ctx.rect(local.x, local.y, local.width, local.height);
                apply_stroke(ctx, element);
                ctx.stroke();
            }
        }
        ElementKind::Text { text, font } => draw_text(ctx, element, text, font, local)?,
        ElementKind::Line { .. } => {}
    }

    ctx.restore();
    Ok(())
}

/// Fill (if any) then stroke (if any) the current path.
fn paint(ctx: &CanvasRenderingContext2d, element: &Element) {
    if let Some(fill) = &element.style.fill {
        ctx.set_fill_style_str(fill);
        ctx.fill();
    }
    if element.style.stroke.is_some() {
        apply_stroke(ctx, element);
        ctx.stroke();
    }
}

fn apply_stroke(ctx: &CanvasRenderingContext2d, element: &Element) {
    if let Some(stroke) = &element.style.stroke {
        ctx.set_stroke_style_str(&stroke.color);
        ctx.set_line_width(stroke.width);
    }
}

fn trace(ctx: &CanvasRenderingContext2d, points: &[Point]) {
    ctx.begin_path();
    let mut iter = points.iter();
    if let Some(first) = iter.next() {
        ctx.move_to(first.x, first.y);
    }
    for p in iter {
        ctx.line_to(p.x, p.y);
    }
}

fn set_dash(ctx: &CanvasRenderingContext2d, pattern: &[f64]) -> Result<(), JsValue> {
    let segments: js_sys::Array = pattern.iter().map(|d| JsValue::from_f64(*d)).collect();
    ctx.set_line_dash(&segments)
}

fn draw_line(
    ctx: &CanvasRenderingContext2d,
    element: &Element,
    from: Point,
    to: Point,
    dash: &[f64],
) -> Result<(), JsValue> {
    set_dash(ctx, dash)?;
    apply_stroke(ctx, element);
    ctx.begin_path();
    ctx.move_to(from.x, from.y);
    ctx.line_to(to.x, to.y);
    ctx.stroke();
    Ok(())
}

// =============================================================
// Text
// =============================================================

fn draw_text(
    ctx: &CanvasRenderingContext2d,
    element: &Element,
    text: &str,
    font: &TextStyle,
    local: Rect,
) -> Result<(), JsValue> {
    let color = element.style.fill.as_deref().unwrap_or("#000000");
    ctx.set_font(&font.css_font());
    ctx.set_fill_style_str(color);
    ctx.set_text_align("center");
    ctx.set_text_baseline("middle");

    let line_height = font.size * TEXT_LINE_HEIGHT_RATIO;
    let center_x = local.center().x;
    let mut y = local.y + line_height / 2.0;
    for line in text.lines() {
        ctx.fill_text(line, center_x, y)?;
        if font.underline {
            let width = ctx.measure_text(line)?.width();
            let underline_y = y + font.size * 0.5;
            ctx.set_stroke_style_str(color);
            ctx.set_line_width((font.size / 15.0).max(1.0));
            ctx.begin_path();
            ctx.move_to(center_x - width / 2.0, underline_y);
            ctx.line_to(center_x + width / 2.0, underline_y);
            ctx.stroke();
        }
        y += line_height;
    }
    Ok(())
}

// =============================================================
// Overlays
// =============================================================

fn draw_grid(ctx: &CanvasRenderingContext2d, canvas: Rect, scale: f64) {
    ctx.set_stroke_style_str(GRID_COLOR);
    ctx.set_line_width(1.0 / scale);
    ctx.begin_path();
    let mut x = canvas.x + GRID_SPACING;
    while x < canvas.right() {
        ctx.move_to(x, canvas.y);
        ctx.line_to(x, canvas.bottom());
        x += GRID_SPACING;
    }
    let mut y = canvas.y + GRID_SPACING;
    while y < canvas.bottom() {
        ctx.move_to(canvas.x, y);
        ctx.line_to(canvas.right(), y);
        y += GRID_SPACING;
    }
    ctx.stroke();
}

fn draw_preview(ctx: &CanvasRenderingContext2d, from: Point, to: Point, scale: f64) -> Result<(), JsValue> {
    ctx.save();
    let dash = SELECTION_DASH_PX / scale;
    set_dash(ctx, &[dash, dash])?;
    ctx.set_stroke_style_str(PREVIEW_COLOR);
    ctx.set_line_width(1.5 / scale);
    ctx.begin_path();
    ctx.move_to(from.x, from.y);
    ctx.line_to(to.x, to.y);
    ctx.stroke();
    ctx.restore();
    Ok(())
}

fn draw_selection(ctx: &CanvasRenderingContext2d, bounds: Rect, scale: f64) -> Result<(), JsValue> {
    let outline = bounds.expand(SELECTION_PADDING_PX / scale);
    ctx.save();
    let dash = SELECTION_DASH_PX / scale;
    set_dash(ctx, &[dash, dash])?;
    ctx.set_stroke_style_str(SELECTION_COLOR);
    ctx.set_line_width(1.0 / scale);
    ctx.stroke_rect(outline.x, outline.y, outline.width, outline.height);
    ctx.restore();
    Ok(())
}
