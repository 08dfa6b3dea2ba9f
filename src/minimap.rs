//! Minimap projection of the virtual canvas.
//!
//! Pure re-derivation from the scene and viewport on every refresh; the
//! minimap holds no state of its own.

#[cfg(test)]
#[path = "minimap_test.rs"]
mod minimap_test;

use crate::scene::{ElementId, Scene};
use crate::viewport::{Point, Rect, Viewport};

/// What the minimap canvas should draw, in minimap pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct MinimapView {
    pub scale: f64,
    /// The whole virtual canvas.
    pub canvas: Rect,
    /// One box per element, bottom to top.
    pub elements: Vec<(ElementId, Rect)>,
    /// The visible window.
    pub viewport: Rect,
}

/// Factor that fits the virtual canvas inside a `width` by `height` minimap.
#[must_use]
pub fn minimap_scale(viewport: &Viewport, width: f64, height: f64) -> f64 {
    (width / viewport.virtual_width).min(height / viewport.virtual_height)
}

/// Project the scene and the visible window onto the minimap.
#[must_use]
pub fn project(scene: &Scene, viewport: &Viewport, width: f64, height: f64) -> MinimapView {
    let scale = minimap_scale(viewport, width, height);
    MinimapView {
        scale,
        canvas: viewport.virtual_rect().scaled(scale),
        elements: scene.iter().map(|e| (e.id, e.bounds().scaled(scale))).collect(),
        viewport: viewport.visible_rect().scaled(scale),
    }
}

/// Map a click on the minimap back to the virtual point it represents.
#[must_use]
pub fn to_virtual(viewport: &Viewport, width: f64, height: f64, minimap_point: Point) -> Point {
    let scale = minimap_scale(viewport, width, height);
    Point::new(minimap_point.x / scale, minimap_point.y / scale)
}
