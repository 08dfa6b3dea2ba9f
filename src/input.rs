//! Input model: tools, modifier keys, shortcuts, and the pointer gesture state machine.
//!
//! `Tool` and `Modifiers` capture the user's intent at the time of an event.
//! `InputState` is the gesture tracked between pointer-down and pointer-up.
//! `Shortcut` maps key chords to editor operations.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::connector::ConnectorStyle;
use crate::properties::{DrawingDefaults, Selection};
use crate::scene::ElementId;
use crate::viewport::Point;

/// Which tool is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Select, drag elements, pan empty canvas.
    #[default]
    Select,
    /// Pick two elements to join with a connector of the given style.
    Connect(ConnectorStyle),
}

impl Tool {
    #[must_use]
    pub fn is_connect(self) -> bool {
        matches!(self, Self::Connect(_))
    }
}

/// Keyboard/mouse modifier keys held during an event.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    /// Meta / Command key.
    pub meta: bool,
}

impl Modifiers {
    /// Ctrl on most platforms, Cmd on macOS.
    #[must_use]
    pub fn command(self) -> bool {
        self.ctrl || self.meta
    }
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Primary,
    Middle,
    Secondary,
}

impl Button {
    /// Map a DOM `MouseEvent.button` value.
    #[must_use]
    pub fn from_dom(button: i16) -> Self {
        match button {
            1 => Self::Middle,
            2 => Self::Secondary,
            _ => Self::Primary,
        }
    }
}

/// A keyboard key as reported by `KeyboardEvent.key` (e.g. `"Delete"`, `"z"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key(pub String);

/// Wheel / trackpad scroll delta.
#[derive(Debug, Clone, Copy)]
pub struct WheelDelta {
    pub dx: f64,
    /// Positive = down.
    pub dy: f64,
}

/// Editor operations reachable from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Undo,
    Redo,
    Copy,
    Paste,
    Duplicate,
    Delete,
    Save,
    Cancel,
}

impl Shortcut {
    /// Resolve a key chord. Letter keys are matched case-insensitively
    /// because Shift changes the reported key.
    #[must_use]
    pub fn from_key(key: &Key, mods: Modifiers) -> Option<Self> {
        let name = key.0.as_str();
        match name {
            "Delete" | "Backspace" => return Some(Self::Delete),
            "Escape" => return Some(Self::Cancel),
            _ => {}
        }
        if !mods.command() {
            return None;
        }
        match name.to_ascii_lowercase().as_str() {
            "z" if mods.shift => Some(Self::Redo),
            "z" => Some(Self::Undo),
            "y" => Some(Self::Redo),
            "c" => Some(Self::Copy),
            "v" => Some(Self::Paste),
            "d" => Some(Self::Duplicate),
            "s" => Some(Self::Save),
            _ => None,
        }
    }

    /// Whether the browser default for this chord should be suppressed.
    #[must_use]
    pub fn prevents_default(self) -> bool {
        matches!(self, Self::Save | Self::Duplicate | Self::Undo | Self::Redo)
    }
}

/// Persistent UI state visible to the renderer.
#[derive(Debug, Clone, Default)]
pub struct UiState {
    pub tool: Tool,
    pub selection: Selection,
    /// First element picked in connection mode, waiting for the second.
    pub pending_source: Option<ElementId>,
    /// Pointer position (virtual) for the connection preview line.
    pub connect_preview: Option<Point>,
    pub defaults: DrawingDefaults,
    pub show_grid: bool,
}

/// Gesture in progress between pointer-down and pointer-up.
#[derive(Debug, Clone, Default)]
pub enum InputState {
    #[default]
    Idle,
    /// Dragging empty canvas; the viewport follows the pointer.
    Panning {
        /// Screen position at the previous event.
        last_screen: Point,
    },
    /// Moving every selected element together.
    DraggingSelection {
        /// Virtual position at the previous event.
        last_virtual: Point,
        /// Whether any movement happened; a click without movement is not a mutation.
        moved: bool,
    },
}
