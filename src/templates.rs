//! Starter layouts inserted around a point on the board.

#[cfg(test)]
#[path = "templates_test.rs"]
mod templates_test;

use std::str::FromStr;

use crate::consts;
use crate::scene::{Element, ElementKind, Pose, Stroke, Style, TextStyle};
use crate::viewport::Point;

const PLACEHOLDER_FILL: &str = "#ecf0f1";
const PLACEHOLDER_STROKE: &str = "#bdc3c7";
const FRAME_FILL: &str = "#ffffff";
const LABEL_COLOR: &str = "#2c3e50";

const GRID_CELL_WIDTH: f64 = 200.0;
const GRID_CELL_HEIGHT: f64 = 150.0;
const GRID_GAP: f64 = 20.0;
const GRID_SIZE: usize = 3;

const PALETTE_BLOCK: f64 = 120.0;
const PALETTE_GAP: f64 = 20.0;
const PALETTE_COUNT: usize = 5;

/// (dx, dy, width, height, rotation) of each collage frame relative to the center.
const COLLAGE_FRAMES: [(f64, f64, f64, f64, f64); 5] = [
    (-220.0, -80.0, 260.0, 200.0, -8.0),
    (60.0, -110.0, 220.0, 260.0, 5.0),
    (250.0, 40.0, 200.0, 160.0, -3.0),
    (-120.0, 150.0, 240.0, 180.0, 7.0),
    (140.0, 190.0, 180.0, 140.0, -5.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    /// 3x3 grid of image placeholders.
    Grid,
    /// Overlapping rotated frames with a title.
    Collage,
    /// Five swatch blocks labelled with their hex values.
    Palette,
}

impl FromStr for Template {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grid" => Ok(Self::Grid),
            "collage" => Ok(Self::Collage),
            "palette" => Ok(Self::Palette),
            other => Err(format!("unknown template: {other}")),
        }
    }
}

/// Elements for `template`, bottom to top, laid out around `center`.
/// The palette takes its colors from `swatches`, padded with the defaults.
#[must_use]
pub fn build(template: Template, center: Point, swatches: &[String]) -> Vec<Element> {
    match template {
        Template::Grid => grid(center),
        Template::Collage => collage(center),
        Template::Palette => palette(center, swatches),
    }
}

fn placeholder(at: Point, width: f64, height: f64, fill: &str) -> Element {
    let style = Style {
        fill: Some(fill.to_owned()),
        stroke: Some(Stroke { color: PLACEHOLDER_STROKE.to_owned(), width: 2.0 }),
        opacity: 1.0,
    };
    Element::new(ElementKind::Rectangle { width, height }, Pose::at(at), style)
}

fn label(content: &str, at: Point, size: f64) -> Element {
    let font = TextStyle { size, ..TextStyle::default() };
    Element::text(content, font, LABEL_COLOR, at)
}

#[allow(clippy::cast_precision_loss)]
fn grid(center: Point) -> Vec<Element> {
    let step_x = GRID_CELL_WIDTH + GRID_GAP;
    let step_y = GRID_CELL_HEIGHT + GRID_GAP;
    let half = (GRID_SIZE as f64 - 1.0) / 2.0;
    let mut elements = Vec::with_capacity(GRID_SIZE * GRID_SIZE);
    for row in 0..GRID_SIZE {
        for col in 0..GRID_SIZE {
            let at = Point::new(
                center.x + (col as f64 - half) * step_x,
                center.y + (row as f64 - half) * step_y,
            );
            elements.push(placeholder(at, GRID_CELL_WIDTH, GRID_CELL_HEIGHT, PLACEHOLDER_FILL));
        }
    }
    elements
}

fn collage(center: Point) -> Vec<Element> {
    let mut elements: Vec<Element> = COLLAGE_FRAMES
        .iter()
        .map(|&(dx, dy, width, height, rotation)| {
            let mut frame = placeholder(Point::new(center.x + dx, center.y + dy), width, height, FRAME_FILL);
            frame.pose.rotation = rotation;
            frame
        })
        .collect();
    elements.push(label("Mood Board", Point::new(center.x, center.y - 280.0), 48.0));
    elements
}

#[allow(clippy::cast_precision_loss)]
fn palette(center: Point, swatches: &[String]) -> Vec<Element> {
    let colors: Vec<String> = swatches
        .iter()
        .cloned()
        .chain(consts::DEFAULT_SWATCHES.iter().map(|s| (*s).to_owned()))
        .take(PALETTE_COUNT)
        .collect();
    let step = PALETTE_BLOCK + PALETTE_GAP;
    let half = (colors.len() as f64 - 1.0) / 2.0;
    let mut elements = Vec::with_capacity(colors.len() * 2);
    for (i, color) in colors.iter().enumerate() {
        let x = center.x + (i as f64 - half) * step;
        let mut block = Element::rectangle(Point::new(x, center.y), color);
        if let ElementKind::Rectangle { width, height } = &mut block.kind {
            *width = PALETTE_BLOCK;
            *height = PALETTE_BLOCK;
        }
        elements.push(block);
        elements.push(label(color, Point::new(x, center.y + PALETTE_BLOCK / 2.0 + 20.0), 16.0));
    }
    elements
}
