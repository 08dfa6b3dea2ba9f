//! Viewport: maps the oversized virtual canvas onto the visible window.
//!
//! A screen point `s` and a virtual point `v` are related by
//! `s = v * scale + offset`. The offset is the screen position of the
//! virtual origin and is never clamped, so the canvas can be panned
//! arbitrarily far. Scale is multiplicative and bounded to
//! `[min_scale, max_scale]`.

#[cfg(test)]
#[path = "viewport_test.rs"]
mod viewport_test;

use serde::{Deserialize, Serialize};

use crate::config::BoardConfig;

/// A point in either screen or virtual space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle given by its top-left corner and size.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Smallest rectangle containing every point. `None` for an empty iterator.
    pub fn from_points<I: IntoIterator<Item = Point>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in iter {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    #[must_use]
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(x, y, self.right().max(other.right()) - x, self.bottom().max(other.bottom()) - y)
    }

    /// Grow on every side by `amount`.
    #[must_use]
    pub fn expand(&self, amount: f64) -> Rect {
        Rect::new(self.x - amount, self.y - amount, self.width + amount * 2.0, self.height + amount * 2.0)
    }

    /// Multiply position and size by `factor`.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Rect {
        Rect::new(self.x * factor, self.y * factor, self.width * factor, self.height * factor)
    }
}

/// Offset + scale transform between the virtual canvas and the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Current scale factor (1.0 = one virtual unit per CSS pixel).
    pub scale: f64,
    /// Screen x of the virtual origin, in CSS pixels.
    pub offset_x: f64,
    /// Screen y of the virtual origin, in CSS pixels.
    pub offset_y: f64,
    /// Visible window width in CSS pixels, read from the container.
    pub window_width: f64,
    /// Visible window height in CSS pixels, read from the container.
    pub window_height: f64,
    pub virtual_width: f64,
    pub virtual_height: f64,
    pub min_scale: f64,
    pub max_scale: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(&BoardConfig::default())
    }
}

impl Viewport {
    #[must_use]
    pub fn new(config: &BoardConfig) -> Self {
        Self {
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
            window_width: 0.0,
            window_height: 0.0,
            virtual_width: config.virtual_width,
            virtual_height: config.virtual_height,
            min_scale: config.min_scale,
            max_scale: config.max_scale,
        }
    }

    /// Convert a screen-space point (CSS pixels) to virtual coordinates.
    #[must_use]
    pub fn screen_to_virtual(&self, screen: Point) -> Point {
        Point {
            x: (screen.x - self.offset_x) / self.scale,
            y: (screen.y - self.offset_y) / self.scale,
        }
    }

    /// Convert a virtual point to screen coordinates (CSS pixels).
    #[must_use]
    pub fn virtual_to_screen(&self, point: Point) -> Point {
        Point {
            x: point.x * self.scale + self.offset_x,
            y: point.y * self.scale + self.offset_y,
        }
    }

    /// Convert a screen-space distance to a virtual-space distance.
    #[must_use]
    pub fn screen_dist_to_virtual(&self, screen_dist: f64) -> f64 {
        screen_dist / self.scale
    }

    /// Shift the virtual canvas by a screen-space delta. Never clamped.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.offset_x += dx;
        self.offset_y += dy;
    }

    /// Multiply the scale by `factor`, keeping the virtual point under
    /// `anchor` fixed on screen.
    ///
    /// Returns `false` without touching any state when the clamped scale
    /// equals the current scale, which keeps repeated zooms at a limit from
    /// drifting the offset.
    #[allow(clippy::float_cmp)]
    pub fn zoom_at_point(&mut self, factor: f64, anchor: Point) -> bool {
        if !(factor.is_finite() && factor > 0.0) {
            return false;
        }
        let before = self.screen_to_virtual(anchor);
        let next = (self.scale * factor).clamp(self.min_scale, self.max_scale);
        if next == self.scale {
            return false;
        }
        self.scale = next;
        self.offset_x = anchor.x - before.x * next;
        self.offset_y = anchor.y - before.y * next;
        true
    }

    /// Scale 1.0 with the virtual canvas centered in the window.
    pub fn reset_view(&mut self) {
        self.scale = 1.0;
        self.offset_x = (self.window_width - self.virtual_width) / 2.0;
        self.offset_y = (self.window_height - self.virtual_height) / 2.0;
    }

    /// Record the container's current size. Scale and offset are unchanged.
    pub fn set_window_size(&mut self, width: f64, height: f64) {
        self.window_width = width.max(0.0);
        self.window_height = height.max(0.0);
    }

    /// Center of the visible window in screen coordinates.
    #[must_use]
    pub fn window_center(&self) -> Point {
        Point::new(self.window_width / 2.0, self.window_height / 2.0)
    }

    /// Pan so that `point` (virtual) sits at the window center.
    pub fn center_on(&mut self, point: Point) {
        let center = self.window_center();
        self.offset_x = center.x - point.x * self.scale;
        self.offset_y = center.y - point.y * self.scale;
    }

    /// The part of the virtual canvas currently visible, in virtual units.
    #[must_use]
    pub fn visible_rect(&self) -> Rect {
        let top_left = self.screen_to_virtual(Point::new(0.0, 0.0));
        Rect::new(
            top_left.x,
            top_left.y,
            self.window_width / self.scale,
            self.window_height / self.scale,
        )
    }

    /// The whole virtual canvas as a rectangle.
    #[must_use]
    pub fn virtual_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.virtual_width, self.virtual_height)
    }

    /// Scale rounded to a whole percentage, for the zoom indicator.
    #[must_use]
    pub fn zoom_percent(&self) -> u32 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let percent = (self.scale * 100.0).round().max(0.0) as u32;
        percent
    }
}
