//! Shared numeric constants and default values for the board engine.

// ── Virtual canvas ──────────────────────────────────────────────

/// Width of the virtual canvas in semantic units.
pub const VIRTUAL_WIDTH: f64 = 3000.0;

/// Height of the virtual canvas in semantic units.
pub const VIRTUAL_HEIGHT: f64 = 2000.0;

// ── Viewport ────────────────────────────────────────────────────

/// Lowest allowed viewport scale.
pub const MIN_SCALE: f64 = 0.1;

/// Highest allowed viewport scale.
pub const MAX_SCALE: f64 = 5.0;

/// Multiplicative step used by zoom buttons and the mouse wheel.
pub const ZOOM_STEP: f64 = 1.1;

/// Minimap footprint in CSS pixels.
pub const MINIMAP_WIDTH: f64 = 200.0;
pub const MINIMAP_HEIGHT: f64 = 150.0;

// ── History ─────────────────────────────────────────────────────

/// Maximum number of snapshots kept for undo/redo.
pub const HISTORY_CAP: usize = 30;

/// Quiet period before a burst of mutations is captured as one snapshot.
pub const HISTORY_QUIET_MS: f64 = 500.0;

// ── Connectors ──────────────────────────────────────────────────

/// Added to the line angle so the arrowhead triangle points along the line.
pub const ARROWHEAD_ANGLE_OFFSET_DEG: f64 = 90.0;

/// Arrowhead triangle edge length in virtual units.
pub const ARROWHEAD_SIZE: f64 = 15.0;

pub const CONNECTOR_COLOR: &str = "#333333";
pub const CONNECTOR_WIDTH: f64 = 2.0;

/// Dash patterns (on, off) for connector line styles.
pub const DASHED_PATTERN: [f64; 2] = [10.0, 5.0];
pub const DOTTED_PATTERN: [f64; 2] = [2.0, 4.0];

// ── Elements ────────────────────────────────────────────────────

pub const DEFAULT_COLOR: &str = "#3498db";

/// Fill shown in the properties panel for an element that has none yet.
pub const EMPTY_FILL: &str = "#ffffff";
pub const DEFAULT_FONT_FAMILY: &str = "Arial";
pub const DEFAULT_FONT_SIZE: f64 = 24.0;
pub const DEFAULT_TEXT: &str = "Double-click to edit";

/// Edge length of newly created rectangles, triangles and color blocks.
pub const DEFAULT_SHAPE_SIZE: f64 = 100.0;

/// Radius of newly created circles and of the default pentagon.
pub const DEFAULT_RADIUS: f64 = 50.0;

/// Uploaded images are scaled down so their longest side fits this size.
pub const IMAGE_MAX_DIMENSION: f64 = 300.0;

/// Offset applied to pasted and duplicated elements.
pub const PASTE_OFFSET: f64 = 20.0;

/// Rough glyph advance and line height, as fractions of the font size,
/// used to size text boxes without a measuring context.
pub const TEXT_ADVANCE_RATIO: f64 = 0.6;
pub const TEXT_LINE_HEIGHT_RATIO: f64 = 1.2;

// ── Rendering ───────────────────────────────────────────────────

/// Spacing of the optional background grid in virtual units.
pub const GRID_SPACING: f64 = 50.0;

/// Screen-space dash length for the selection outline.
pub const SELECTION_DASH_PX: f64 = 4.0;

// ── Storage ─────────────────────────────────────────────────────

pub const CANVAS_STORAGE_KEY: &str = "moodboard:canvas";
pub const CONNECTORS_STORAGE_KEY: &str = "moodboard:connectors";
pub const THEME_STORAGE_KEY: &str = "moodboard:theme";

// ── Properties ──────────────────────────────────────────────────

/// Border applied when the stroke toggle is switched on without a color.
pub const DEFAULT_STROKE_COLOR: &str = "#000000";
pub const DEFAULT_STROKE_WIDTH: f64 = 1.0;

/// Swatches present before the user adds any.
pub const DEFAULT_SWATCHES: [&str; 6] = ["#e74c3c", "#3498db", "#2ecc71", "#f1c40f", "#9b59b6", "#34495e"];

// ── Export ──────────────────────────────────────────────────────

/// Largest accepted export resolution multiplier.
pub const MAX_EXPORT_MULTIPLIER: f64 = 4.0;

/// Downloaded files are named `mood-board.<ext>`.
pub const EXPORT_FILE_STEM: &str = "mood-board";
