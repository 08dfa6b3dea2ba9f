//! Export planning: which part of the board to rasterize, at what size, and
//! under what file name. The web layer turns an [`ExportPlan`] into pixels
//! with an offscreen canvas and `toDataURL`.

#[cfg(test)]
#[path = "export_test.rs"]
mod export_test;

use std::str::FromStr;

use crate::consts;
use crate::scene::{ElementId, Scene};
use crate::viewport::{Rect, Viewport};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("unknown export format: {0}")]
    UnknownFormat(String),

    #[error("unknown export area: {0}")]
    UnknownArea(String),

    #[error("export multiplier {0} must be between 0 and {max}", max = consts::MAX_EXPORT_MULTIPLIER)]
    InvalidMultiplier(f64),

    #[error("nothing is selected to export")]
    EmptySelection,

    #[error("export area has no size")]
    EmptyArea,

    #[error("browser failed to encode the image: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Png,
    Jpeg,
}

impl ExportFormat {
    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            other => Err(ExportError::UnknownFormat(other.to_owned())),
        }
    }
}

/// Part of the board to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportArea {
    /// The whole virtual canvas.
    #[default]
    Canvas,
    /// Bounding box of the active selection.
    Selection,
    /// What is currently visible in the window.
    Viewport,
}

impl FromStr for ExportArea {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "canvas" => Ok(Self::Canvas),
            "selection" => Ok(Self::Selection),
            "viewport" => Ok(Self::Viewport),
            other => Err(ExportError::UnknownArea(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportRequest {
    pub format: ExportFormat,
    pub area: ExportArea,
    /// Resolution multiplier on the base pixel size.
    pub multiplier: f64,
    /// Encoder quality, 0.0 to 1.0; only JPEG uses it.
    pub quality: f64,
}

impl Default for ExportRequest {
    fn default() -> Self {
        Self { format: ExportFormat::Png, area: ExportArea::Canvas, multiplier: 1.0, quality: 1.0 }
    }
}

/// Resolved export parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPlan {
    pub file_name: String,
    pub mime: &'static str,
    pub quality: f64,
    /// Region of the virtual canvas to draw.
    pub crop: Rect,
    /// Output pixels per virtual unit.
    pub pixel_scale: f64,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

/// Resolve a request against the current board.
///
/// The base pixel size is one pixel per virtual unit for the canvas and
/// selection areas, and the on-screen window size for the viewport area.
///
/// # Errors
///
/// Returns [`ExportError::InvalidMultiplier`] outside `(0, MAX]`,
/// [`ExportError::EmptySelection`] when exporting a selection with nothing
/// selected, and [`ExportError::EmptyArea`] for a zero-sized region.
pub fn plan(
    request: &ExportRequest,
    scene: &Scene,
    viewport: &Viewport,
    selection: &[ElementId],
) -> Result<ExportPlan, ExportError> {
    let multiplier = request.multiplier;
    if !(multiplier.is_finite() && multiplier > 0.0 && multiplier <= consts::MAX_EXPORT_MULTIPLIER) {
        return Err(ExportError::InvalidMultiplier(multiplier));
    }
    let (crop, base_scale) = match request.area {
        ExportArea::Canvas => (viewport.virtual_rect(), 1.0),
        ExportArea::Selection => (scene.union_bounds(selection).ok_or(ExportError::EmptySelection)?, 1.0),
        ExportArea::Viewport => (viewport.visible_rect(), viewport.scale),
    };
    let pixel_scale = base_scale * multiplier;
    let pixel_width = to_pixels(crop.width * pixel_scale);
    let pixel_height = to_pixels(crop.height * pixel_scale);
    if pixel_width == 0 || pixel_height == 0 {
        return Err(ExportError::EmptyArea);
    }
    Ok(ExportPlan {
        file_name: format!("{}.{}", consts::EXPORT_FILE_STEM, request.format.extension()),
        mime: request.format.mime(),
        quality: request.quality.clamp(0.0, 1.0),
        crop,
        pixel_scale,
        pixel_width,
        pixel_height,
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_pixels(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 { value.ceil().min(f64::from(u32::MAX)) as u32 } else { 0 }
}
