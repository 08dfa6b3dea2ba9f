//! Board engine: every piece of editor state behind one explicit object.
//!
//! `EngineCore` owns the scene, connectors, viewport, history and UI state.
//! Toolbar buttons, menu entries, shortcuts and pointer events all reduce to
//! calls on it, and each call returns the [`Action`]s the host must carry out
//! (re-render, arm the history timer, refresh the properties panel, ...).
//! Time is passed in as milliseconds so the history debounce is deterministic
//! under test.
//!
//! `Engine` wraps the core together with the browser canvases it draws to.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use std::collections::HashMap;
use std::str::FromStr;

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use crate::color::normalize_hex_color;
use crate::config::BoardConfig;
use crate::connector::{ConnectorManager, ConnectorRecord, ConnectorStyle};
use crate::consts;
use crate::export::{self, ExportError, ExportPlan, ExportRequest};
use crate::history::{BoardSnapshot, History, SnapshotError};
use crate::input::{Button, InputState, Key, Modifiers, Shortcut, Tool, UiState, WheelDelta};
use crate::minimap::{self, MinimapView};
use crate::persistence::{self, KeyValueStore, StorageError};
use crate::properties::{PropertiesView, PropertyEdit, Selection, apply_edit};
use crate::render::{self, ImageCache};
use crate::scene::{Element, ElementId, ElementKind, Scene};
use crate::templates::{self, Template};
use crate::viewport::{Point, Viewport};

/// Actions returned from engine calls for the host to process.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    RenderNeeded,
    /// Pan or zoom changed; refresh the minimap and zoom display.
    ViewportChanged { zoom_percent: u32 },
    /// The properties panel should show this view, or hide when `None`.
    SelectionChanged(Option<PropertiesView>),
    HistoryChanged { can_undo: bool, can_redo: bool },
    /// (Re)arm the history timer; call [`EngineCore::tick`] when it fires.
    ScheduleHistory { delay_ms: f64 },
    /// Open the host text editor for a text element.
    EditTextRequested { id: ElementId, text: String },
    /// Connection mode picked (or dropped) its first endpoint.
    ConnectionPending { source: Option<ElementId> },
    /// Current color, font defaults or swatches changed.
    DefaultsChanged,
    /// The host should persist the board with [`EngineCore::save`].
    SaveRequested,
    /// Short message for the user.
    Notify(String),
}

/// Built-in shapes offered by the shape picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Rectangle,
    Circle,
    Triangle,
    Pentagon,
}

impl FromStr for ShapeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rect" | "rectangle" => Ok(Self::Rectangle),
            "circle" => Ok(Self::Circle),
            "triangle" => Ok(Self::Triangle),
            "polygon" | "pentagon" => Ok(Self::Pentagon),
            other => Err(format!("unknown shape: {other}")),
        }
    }
}

/// Editor operations shared by the toolbar, context menu and shortcuts.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddShape(ShapeKind),
    AddText,
    AddColorBlock,
    AddTemplate(Template),
    /// A decoded upload with its natural pixel size.
    AddImage { src: String, width: f64, height: f64 },
    /// Commit text typed into the host editor.
    SetText { id: ElementId, text: String },
    Select(Vec<ElementId>),
    Delete,
    Duplicate,
    Copy,
    Paste,
    BringForward,
    SendBackward,
    BringToFront,
    SendToBack,
    StartConnection(ConnectorStyle),
    /// Leave connection mode, or drop the selection.
    Cancel,
    Undo,
    Redo,
    Save,
    Clear,
    ZoomIn,
    ZoomOut,
    ResetView,
    ToggleGrid,
    Edit(PropertyEdit),
    /// A swatch was clicked: fill the selected shapes, or set the current color.
    ApplySwatch(String),
    AddSwatch(String),
    SetColor(String),
    SetFontFamily(String),
    SetFontSize(f64),
    ToggleBold,
    ToggleItalic,
    ToggleUnderline,
}

impl Command {
    /// Resolve a toolbar command name. `arg` carries the shape, template,
    /// connector style, color or font value for commands that take one.
    ///
    /// # Errors
    ///
    /// Returns a message for unknown names and missing or malformed arguments.
    pub fn from_name(name: &str, arg: Option<&str>) -> Result<Self, String> {
        let required = || arg.map(str::to_owned).ok_or_else(|| format!("{name}: missing argument"));
        Ok(match name {
            "add-shape" => Self::AddShape(required()?.parse()?),
            "add-text" => Self::AddText,
            "add-color" => Self::AddColorBlock,
            "template" => Self::AddTemplate(required()?.parse()?),
            "delete" => Self::Delete,
            "duplicate" => Self::Duplicate,
            "copy" => Self::Copy,
            "paste" => Self::Paste,
            "bring-forward" => Self::BringForward,
            "send-backward" => Self::SendBackward,
            "bring-to-front" => Self::BringToFront,
            "send-to-back" => Self::SendToBack,
            "connect" => Self::StartConnection(match arg {
                Some(style) => style.parse()?,
                None => ConnectorStyle::default(),
            }),
            "cancel" => Self::Cancel,
            "undo" => Self::Undo,
            "redo" => Self::Redo,
            "save" => Self::Save,
            "clear" => Self::Clear,
            "zoom-in" => Self::ZoomIn,
            "zoom-out" => Self::ZoomOut,
            "reset-view" => Self::ResetView,
            "toggle-grid" => Self::ToggleGrid,
            "swatch" => Self::ApplySwatch(required()?),
            "add-swatch" => Self::AddSwatch(required()?),
            "color" => Self::SetColor(required()?),
            "font-family" => Self::SetFontFamily(required()?),
            "font-size" => {
                let size = required()?;
                Self::SetFontSize(size.parse().map_err(|_| format!("font-size: not a number: {size}"))?)
            }
            "bold" => Self::ToggleBold,
            "italic" => Self::ToggleItalic,
            "underline" => Self::ToggleUnderline,
            other => return Err(format!("unknown command: {other}")),
        })
    }

    /// Question the user must accept before the command runs.
    #[must_use]
    pub fn confirmation(&self) -> Option<&'static str> {
        match self {
            Self::Clear => Some("Clear the whole board?"),
            _ => None,
        }
    }
}

/// One context menu entry.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuItem {
    pub label: &'static str,
    pub command: Command,
    pub enabled: bool,
}

impl MenuItem {
    fn new(label: &'static str, command: Command) -> Self {
        Self { label, command, enabled: true }
    }
}

/// Context menu for a pointer position.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextMenu {
    /// Element under the pointer; the host selects it before showing the menu.
    pub target: Option<ElementId>,
    pub items: Vec<MenuItem>,
}

#[derive(Debug, Clone, Default)]
struct Clipboard {
    elements: Vec<Element>,
    /// Connectors whose endpoints were both copied.
    connectors: Vec<ConnectorRecord>,
}

impl Clipboard {
    fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Core engine state: all logic that doesn't depend on the canvas element.
///
/// Separated from `Engine` so it can be tested without WASM/browser dependencies.
pub struct EngineCore {
    pub config: BoardConfig,
    pub scene: Scene,
    pub connectors: ConnectorManager,
    pub viewport: Viewport,
    pub history: History,
    pub ui: UiState,
    pub input: InputState,
    clipboard: Clipboard,
}

impl Default for EngineCore {
    fn default() -> Self {
        Self::new(BoardConfig::default())
    }
}

impl EngineCore {
    /// Empty board seeded as history position 0.
    #[must_use]
    pub fn new(config: BoardConfig) -> Self {
        let mut core = Self {
            scene: Scene::new(),
            connectors: ConnectorManager::new(&config.connector_color, config.connector_width),
            viewport: Viewport::new(&config),
            history: History::new(config.history_cap, config.history_quiet_ms),
            ui: UiState::default(),
            input: InputState::default(),
            clipboard: Clipboard::default(),
            config,
        };
        core.seed_history();
        core
    }

    // --- Commands ---

    /// Run one editor command at time `now` (milliseconds).
    pub fn execute(&mut self, command: Command, now: f64) -> Vec<Action> {
        match command {
            Command::AddShape(kind) => {
                let at = self.insertion_point();
                let color = self.ui.defaults.color.clone();
                let element = match kind {
                    ShapeKind::Rectangle => Element::rectangle(at, &color),
                    ShapeKind::Circle => Element::circle(at, &color),
                    ShapeKind::Triangle => Element::triangle(at, &color),
                    ShapeKind::Pentagon => Element::pentagon(at, &color),
                };
                self.insert(vec![element], now)
            }
            Command::AddColorBlock => {
                let element = Element::rectangle(self.insertion_point(), &self.ui.defaults.color);
                self.insert(vec![element], now)
            }
            Command::AddText => self.add_text(now),
            Command::AddTemplate(template) => {
                let elements = templates::build(template, self.insertion_point(), &self.ui.defaults.swatches);
                self.insert(elements, now)
            }
            Command::AddImage { src, width, height } => {
                let element =
                    Element::image(src, width, height, self.config.image_max_dimension, self.insertion_point());
                self.insert(vec![element], now)
            }
            Command::SetText { id, text } => self.set_text(id, text, now),
            Command::Select(ids) => self.select(&ids),
            Command::Delete => self.delete_selection(now),
            Command::Duplicate => {
                let clip = self.capture_clipboard(&self.ui.selection.ids());
                self.paste_copies(&clip, now).1
            }
            Command::Copy => {
                self.clipboard = self.capture_clipboard(&self.ui.selection.ids());
                Vec::new()
            }
            Command::Paste => {
                if self.clipboard.is_empty() {
                    return Vec::new();
                }
                let clip = self.clipboard.clone();
                let (pasted, actions) = self.paste_copies(&clip, now);
                self.clipboard = pasted;
                actions
            }
            Command::BringForward => self.reorder(Scene::bring_forward, now),
            Command::SendBackward => self.reorder(Scene::send_backward, now),
            Command::BringToFront => self.reorder(Scene::bring_to_front, now),
            Command::SendToBack => self.reorder(Scene::send_to_back, now),
            Command::StartConnection(style) => self.start_connection(style),
            Command::Cancel => self.cancel(),
            Command::Undo => self.step_history(false, now),
            Command::Redo => self.step_history(true, now),
            Command::Save => vec![Action::SaveRequested],
            Command::Clear => self.clear(now),
            Command::ZoomIn => self.zoom_centered(self.config.zoom_step),
            Command::ZoomOut => self.zoom_centered(1.0 / self.config.zoom_step),
            Command::ResetView => {
                self.viewport.reset_view();
                self.viewport_actions()
            }
            Command::ToggleGrid => {
                self.ui.show_grid = !self.ui.show_grid;
                vec![Action::RenderNeeded]
            }
            Command::Edit(edit) => self.edit_selection(&edit, now),
            Command::ApplySwatch(color) => self.apply_swatch(&color, now),
            Command::AddSwatch(color) => {
                if self.ui.defaults.add_swatch(&color) {
                    vec![Action::DefaultsChanged]
                } else {
                    log::warn!("swatch rejected: {color}");
                    vec![Action::Notify(format!("Not a new color: {color}"))]
                }
            }
            Command::SetColor(color) => {
                self.ui.defaults.set_color(&color);
                vec![Action::DefaultsChanged]
            }
            Command::SetFontFamily(family) => {
                self.ui.defaults.font.family.clone_from(&family);
                self.with_defaults_changed(PropertyEdit::FontFamily(family), now)
            }
            Command::SetFontSize(size) => {
                if size <= 0.0 {
                    return Vec::new();
                }
                self.ui.defaults.font.size = size;
                self.with_defaults_changed(PropertyEdit::FontSize(size), now)
            }
            Command::ToggleBold => {
                let on = !self.ui.defaults.font.bold;
                self.ui.defaults.font.bold = on;
                self.with_defaults_changed(PropertyEdit::Bold(on), now)
            }
            Command::ToggleItalic => {
                let on = !self.ui.defaults.font.italic;
                self.ui.defaults.font.italic = on;
                self.with_defaults_changed(PropertyEdit::Italic(on), now)
            }
            Command::ToggleUnderline => {
                let on = !self.ui.defaults.font.underline;
                self.ui.defaults.font.underline = on;
                self.with_defaults_changed(PropertyEdit::Underline(on), now)
            }
        }
    }

    /// Fire the debounced history record if its quiet period has elapsed.
    pub fn tick(&mut self, now: f64) -> Vec<Action> {
        if !self.history.take_due(now) {
            return Vec::new();
        }
        self.record_snapshot();
        vec![self.history_action()]
    }

    // --- Input events ---

    pub fn on_pointer_down(&mut self, screen_pt: Point, button: Button, modifiers: Modifiers, now: f64) -> Vec<Action> {
        match button {
            Button::Secondary => return Vec::new(),
            Button::Middle => {
                self.input = InputState::Panning { last_screen: screen_pt };
                return Vec::new();
            }
            Button::Primary => {}
        }

        let virtual_pt = self.viewport.screen_to_virtual(screen_pt);
        let hit = self.scene.hit_test(virtual_pt);

        if let Tool::Connect(style) = self.ui.tool {
            return self.pick_endpoint(hit, style, now);
        }

        let Some(id) = hit else {
            let mut actions = Vec::new();
            if !modifiers.shift && !self.ui.selection.is_empty() {
                self.ui.selection = Selection::None;
                actions.push(Action::SelectionChanged(None));
                actions.push(Action::RenderNeeded);
            }
            self.input = InputState::Panning { last_screen: screen_pt };
            return actions;
        };

        let next = if modifiers.shift {
            if self.ui.selection.contains(&id) {
                self.ui.selection.without(&id)
            } else {
                let mut ids = self.ui.selection.ids();
                ids.push(id);
                Selection::sanitize(&self.scene, &ids)
            }
        } else if self.ui.selection.contains(&id) {
            self.ui.selection.clone()
        } else {
            Selection::Single(id)
        };

        let mut actions = Vec::new();
        if next != self.ui.selection {
            self.ui.selection = next;
            actions.push(Action::SelectionChanged(self.properties()));
            actions.push(Action::RenderNeeded);
        }
        if self.ui.selection.contains(&id) {
            self.input = InputState::DraggingSelection { last_virtual: virtual_pt, moved: false };
        }
        actions
    }

    pub fn on_pointer_move(&mut self, screen_pt: Point) -> Vec<Action> {
        match self.input {
            InputState::Panning { last_screen } => {
                self.viewport.pan_by(screen_pt.x - last_screen.x, screen_pt.y - last_screen.y);
                self.input = InputState::Panning { last_screen: screen_pt };
                self.viewport_actions()
            }
            InputState::DraggingSelection { last_virtual, .. } => {
                let virtual_pt = self.viewport.screen_to_virtual(screen_pt);
                let (dx, dy) = (virtual_pt.x - last_virtual.x, virtual_pt.y - last_virtual.y);
                for id in self.ui.selection.ids() {
                    if let Some(element) = self.scene.get_mut(&id) {
                        element.move_by(dx, dy);
                    }
                }
                self.connectors.refresh_all(&mut self.scene);
                self.input = InputState::DraggingSelection { last_virtual: virtual_pt, moved: true };
                vec![Action::RenderNeeded]
            }
            InputState::Idle => {
                if self.ui.pending_source.is_none() {
                    return Vec::new();
                }
                self.ui.connect_preview = Some(self.viewport.screen_to_virtual(screen_pt));
                vec![Action::RenderNeeded]
            }
        }
    }

    pub fn on_pointer_up(&mut self, now: f64) -> Vec<Action> {
        match std::mem::take(&mut self.input) {
            InputState::DraggingSelection { moved: true, .. } => {
                let mut actions = Vec::new();
                self.mark_dirty(now, &mut actions);
                actions.push(Action::SelectionChanged(self.properties()));
                actions
            }
            _ => Vec::new(),
        }
    }

    /// Double-click opens the text editor on text elements.
    pub fn on_double_click(&mut self, screen_pt: Point) -> Vec<Action> {
        let virtual_pt = self.viewport.screen_to_virtual(screen_pt);
        let Some(id) = self.scene.hit_test(virtual_pt) else {
            return Vec::new();
        };
        match self.scene.get(&id).map(|e| &e.kind) {
            Some(ElementKind::Text { text, .. }) => vec![Action::EditTextRequested { id, text: text.clone() }],
            _ => Vec::new(),
        }
    }

    /// Vertical scroll (or any scroll with Ctrl/Cmd) zooms at the pointer;
    /// horizontal trackpad scroll pans.
    pub fn on_wheel(&mut self, screen_pt: Point, delta: WheelDelta, modifiers: Modifiers) -> Vec<Action> {
        if !modifiers.command() && delta.dx.abs() > f64::EPSILON {
            self.viewport.pan_by(-delta.dx, -delta.dy);
            return self.viewport_actions();
        }
        if delta.dy.abs() <= f64::EPSILON {
            return Vec::new();
        }
        let factor = if delta.dy < 0.0 { self.config.zoom_step } else { 1.0 / self.config.zoom_step };
        if self.viewport.zoom_at_point(factor, screen_pt) { self.viewport_actions() } else { Vec::new() }
    }

    pub fn on_key_down(&mut self, key: &Key, modifiers: Modifiers, now: f64) -> Vec<Action> {
        let Some(shortcut) = Shortcut::from_key(key, modifiers) else {
            return Vec::new();
        };
        let command = match shortcut {
            Shortcut::Undo => Command::Undo,
            Shortcut::Redo => Command::Redo,
            Shortcut::Copy => Command::Copy,
            Shortcut::Paste => Command::Paste,
            Shortcut::Duplicate => Command::Duplicate,
            Shortcut::Delete => Command::Delete,
            Shortcut::Save => Command::Save,
            Shortcut::Cancel => Command::Cancel,
        };
        self.execute(command, now)
    }

    /// Menu entries for a right-click at `screen_pt`.
    #[must_use]
    pub fn context_menu(&self, screen_pt: Point) -> ContextMenu {
        let target = self.scene.hit_test(self.viewport.screen_to_virtual(screen_pt));
        let items = if target.is_some() {
            vec![
                MenuItem::new("Bring to Front", Command::BringToFront),
                MenuItem::new("Bring Forward", Command::BringForward),
                MenuItem::new("Send Backward", Command::SendBackward),
                MenuItem::new("Send to Back", Command::SendToBack),
                MenuItem::new("Copy", Command::Copy),
                MenuItem::new("Duplicate", Command::Duplicate),
                MenuItem::new("Connect", Command::StartConnection(ConnectorStyle::Solid)),
                MenuItem::new("Connect with Arrow", Command::StartConnection(ConnectorStyle::Arrow)),
                MenuItem::new("Delete", Command::Delete),
            ]
        } else {
            vec![
                MenuItem { enabled: !self.clipboard.is_empty(), ..MenuItem::new("Paste", Command::Paste) },
                MenuItem::new("Add Text", Command::AddText),
                MenuItem::new("Reset View", Command::ResetView),
            ]
        };
        ContextMenu { target, items }
    }

    // --- Viewport ---

    /// Store the container size. Scale and offset are untouched.
    pub fn resize(&mut self, width: f64, height: f64) -> Vec<Action> {
        self.viewport.set_window_size(width, height);
        self.viewport_actions()
    }

    /// First sizing of the window: store it and center the view on the canvas.
    pub fn open_view(&mut self, width: f64, height: f64) -> Vec<Action> {
        self.viewport.set_window_size(width, height);
        self.viewport.reset_view();
        self.viewport_actions()
    }

    /// Re-center the viewport on the virtual point under a minimap click.
    pub fn minimap_click(&mut self, minimap_pt: Point) -> Vec<Action> {
        let target =
            minimap::to_virtual(&self.viewport, self.config.minimap_width, self.config.minimap_height, minimap_pt);
        self.viewport.center_on(target);
        self.viewport_actions()
    }

    #[must_use]
    pub fn minimap_view(&self) -> MinimapView {
        minimap::project(&self.scene, &self.viewport, self.config.minimap_width, self.config.minimap_height)
    }

    // --- Persistence / export ---

    /// Persist the current board.
    ///
    /// # Errors
    ///
    /// Propagates encode and store failures; in-memory state is unaffected.
    pub fn save(&self, store: &mut dyn KeyValueStore) -> Result<(), StorageError> {
        persistence::save_board(store, &BoardSnapshot::capture(&self.scene, &self.connectors))
    }

    /// Replace the board with a saved one and restart history from it.
    /// Returns `Ok(false)` when nothing was saved.
    ///
    /// # Errors
    ///
    /// Propagates store failures and corrupt stored values; the current board
    /// is kept in that case.
    pub fn load(&mut self, store: &dyn KeyValueStore) -> Result<bool, StorageError> {
        let Some(board) = persistence::load_board(store)? else {
            return Ok(false);
        };
        install_board(&mut self.scene, &mut self.connectors, board);
        self.ui.selection = Selection::None;
        self.ui.pending_source = None;
        self.input = InputState::Idle;
        self.seed_history();
        Ok(true)
    }

    /// Resolve an export request against the current board and selection.
    ///
    /// # Errors
    ///
    /// See [`export::plan`].
    pub fn export_plan(&self, request: &ExportRequest) -> Result<ExportPlan, ExportError> {
        export::plan(request, &self.scene, &self.viewport, &self.ui.selection.ids())
    }

    // --- Queries ---

    /// Properties panel contents for the current selection.
    #[must_use]
    pub fn properties(&self) -> Option<PropertiesView> {
        PropertiesView::build(&self.scene, &self.ui.selection)
    }

    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.ui.selection
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    #[must_use]
    pub fn element(&self, id: &ElementId) -> Option<&Element> {
        self.scene.get(id)
    }

    // --- Internals ---

    /// Center of the visible window in virtual coordinates.
    fn insertion_point(&self) -> Point {
        self.viewport.screen_to_virtual(self.viewport.window_center())
    }

    fn mark_dirty(&mut self, now: f64, actions: &mut Vec<Action>) {
        if self.history.note_mutation(now) {
            actions.push(Action::ScheduleHistory { delay_ms: self.config.history_quiet_ms });
        }
        actions.push(Action::RenderNeeded);
    }

    fn snapshot_text(&self) -> Result<String, SnapshotError> {
        BoardSnapshot::capture(&self.scene, &self.connectors).encode()
    }

    fn seed_history(&mut self) {
        match self.snapshot_text() {
            Ok(snapshot) => self.history.seed(snapshot),
            Err(e) => log::warn!("history: cannot seed snapshot: {e}"),
        }
    }

    fn record_snapshot(&mut self) {
        match self.snapshot_text() {
            Ok(snapshot) => self.history.record(snapshot),
            Err(e) => log::warn!("history: cannot capture snapshot: {e}"),
        }
    }

    fn history_action(&self) -> Action {
        Action::HistoryChanged { can_undo: self.history.can_undo(), can_redo: self.history.can_redo() }
    }

    fn viewport_actions(&self) -> Vec<Action> {
        vec![Action::ViewportChanged { zoom_percent: self.viewport.zoom_percent() }, Action::RenderNeeded]
    }

    fn zoom_centered(&mut self, factor: f64) -> Vec<Action> {
        let anchor = self.viewport.window_center();
        if self.viewport.zoom_at_point(factor, anchor) { self.viewport_actions() } else { Vec::new() }
    }

    /// Add elements on top and select them.
    fn insert(&mut self, elements: Vec<Element>, now: f64) -> Vec<Action> {
        let ids: Vec<ElementId> = elements.into_iter().map(|e| self.scene.add(e)).collect();
        self.ui.selection = Selection::sanitize(&self.scene, &ids);
        let mut actions = Vec::new();
        self.mark_dirty(now, &mut actions);
        actions.push(Action::SelectionChanged(self.properties()));
        actions
    }

    fn add_text(&mut self, now: f64) -> Vec<Action> {
        let defaults = &self.ui.defaults;
        let element = Element::text(consts::DEFAULT_TEXT, defaults.font.clone(), &defaults.color, self.insertion_point());
        let id = element.id;
        let mut actions = self.insert(vec![element], now);
        actions.push(Action::EditTextRequested { id, text: consts::DEFAULT_TEXT.to_owned() });
        actions
    }

    fn set_text(&mut self, id: ElementId, text: String, now: f64) -> Vec<Action> {
        if apply_edit(&mut self.scene, &[id], &PropertyEdit::TextContent(text)) == 0 {
            return Vec::new();
        }
        self.connectors.refresh_all(&mut self.scene);
        let mut actions = Vec::new();
        self.mark_dirty(now, &mut actions);
        actions
    }

    fn select(&mut self, ids: &[ElementId]) -> Vec<Action> {
        let next = Selection::sanitize(&self.scene, ids);
        if next == self.ui.selection {
            return Vec::new();
        }
        self.ui.selection = next;
        vec![Action::SelectionChanged(self.properties()), Action::RenderNeeded]
    }

    fn delete_selection(&mut self, now: f64) -> Vec<Action> {
        let ids = self.ui.selection.ids();
        if ids.is_empty() {
            return Vec::new();
        }
        for id in &ids {
            let dropped = self.connectors.remove_for(&mut self.scene, id);
            if dropped > 0 {
                log::debug!("removed {dropped} connector(s) attached to {id}");
            }
            self.scene.remove(id);
        }
        if self.ui.pending_source.is_some_and(|p| ids.contains(&p)) {
            self.ui.pending_source = None;
            self.ui.connect_preview = None;
        }
        self.ui.selection = Selection::None;
        let mut actions = Vec::new();
        self.mark_dirty(now, &mut actions);
        actions.push(Action::SelectionChanged(None));
        actions
    }

    fn capture_clipboard(&self, ids: &[ElementId]) -> Clipboard {
        let elements = self.scene.iter().filter(|e| ids.contains(&e.id)).cloned().collect();
        let connectors = self
            .connectors
            .records()
            .into_iter()
            .filter(|r| ids.contains(&r.from_id) && ids.contains(&r.to_id))
            .collect();
        Clipboard { elements, connectors }
    }

    /// Insert offset copies of `clip` and re-create its internal connectors
    /// between the copies. Returns the copies as a clipboard so repeated
    /// pastes cascade.
    fn paste_copies(&mut self, clip: &Clipboard, now: f64) -> (Clipboard, Vec<Action>) {
        if clip.is_empty() {
            return (Clipboard::default(), Vec::new());
        }
        let mut mapping: HashMap<ElementId, ElementId> = HashMap::new();
        let mut copies = Vec::with_capacity(clip.elements.len());
        for element in &clip.elements {
            let copy = element.duplicate(self.config.paste_offset);
            mapping.insert(element.id, copy.id);
            copies.push(copy);
        }
        let ids: Vec<ElementId> = copies.iter().map(|e| self.scene.add(e.clone())).collect();

        let mut records = Vec::new();
        for record in &clip.connectors {
            let (Some(&from_id), Some(&to_id)) = (mapping.get(&record.from_id), mapping.get(&record.to_id)) else {
                continue;
            };
            if self.connectors.create(&mut self.scene, from_id, to_id, record.style).is_some() {
                records.push(ConnectorRecord { from_id, to_id, style: record.style });
            }
        }

        self.ui.selection = Selection::sanitize(&self.scene, &ids);
        let mut actions = Vec::new();
        self.mark_dirty(now, &mut actions);
        actions.push(Action::SelectionChanged(self.properties()));
        (Clipboard { elements: copies, connectors: records }, actions)
    }

    fn reorder(&mut self, op: fn(&mut Scene, &ElementId) -> bool, now: f64) -> Vec<Action> {
        let mut changed = false;
        for id in self.ui.selection.ids() {
            changed |= op(&mut self.scene, &id);
        }
        let mut actions = Vec::new();
        if changed {
            self.mark_dirty(now, &mut actions);
        }
        actions
    }

    fn start_connection(&mut self, style: ConnectorStyle) -> Vec<Action> {
        self.ui.tool = Tool::Connect(style);
        self.ui.pending_source = match self.ui.selection {
            Selection::Single(id) => Some(id),
            _ => None,
        };
        self.ui.connect_preview = None;
        self.input = InputState::Idle;
        vec![Action::ConnectionPending { source: self.ui.pending_source }, Action::RenderNeeded]
    }

    fn pick_endpoint(&mut self, hit: Option<ElementId>, style: ConnectorStyle, now: f64) -> Vec<Action> {
        let Some(id) = hit else {
            return Vec::new();
        };
        let Some(source) = self.ui.pending_source else {
            self.ui.pending_source = Some(id);
            self.ui.selection = Selection::Single(id);
            return vec![
                Action::ConnectionPending { source: Some(id) },
                Action::SelectionChanged(self.properties()),
                Action::RenderNeeded,
            ];
        };
        if source == id {
            return Vec::new();
        }

        let mut actions = vec![Action::ConnectionPending { source: None }];
        if self.connectors.create(&mut self.scene, source, id, style).is_some() {
            self.mark_dirty(now, &mut actions);
        } else {
            log::warn!("connector {source} -> {id} rejected");
            actions.push(Action::RenderNeeded);
        }
        self.finish_connection();
        actions
    }

    fn finish_connection(&mut self) {
        self.ui.tool = Tool::Select;
        self.ui.pending_source = None;
        self.ui.connect_preview = None;
    }

    fn cancel(&mut self) -> Vec<Action> {
        if self.ui.tool.is_connect() {
            self.finish_connection();
            return vec![Action::ConnectionPending { source: None }, Action::RenderNeeded];
        }
        if self.ui.selection.is_empty() {
            return Vec::new();
        }
        self.ui.selection = Selection::None;
        vec![Action::SelectionChanged(None), Action::RenderNeeded]
    }

    fn clear(&mut self, now: f64) -> Vec<Action> {
        self.connectors.clear(&mut self.scene);
        self.scene.clear();
        self.ui.selection = Selection::None;
        self.finish_connection();
        self.input = InputState::Idle;
        let mut actions = Vec::new();
        self.mark_dirty(now, &mut actions);
        actions.push(Action::SelectionChanged(None));
        actions
    }

    /// Undo (`forward == false`) or redo one step.
    fn step_history(&mut self, forward: bool, now: f64) -> Vec<Action> {
        if self.history.take_pending() {
            self.record_snapshot();
        }
        let scene = &mut self.scene;
        let connectors = &mut self.connectors;
        let load = |raw: &str| restore_snapshot(scene, connectors, raw);
        let result = if forward { self.history.redo(load) } else { self.history.undo(load) };
        match result {
            Ok(true) => {}
            Ok(false) => return vec![self.history_action()],
            Err(e) => {
                log::warn!("history: snapshot load aborted: {e}");
                return Vec::new();
            }
        }

        self.ui.selection = Selection::sanitize(&self.scene, &self.ui.selection.ids());
        self.finish_connection();
        self.input = InputState::Idle;
        let mut actions = Vec::new();
        self.mark_dirty(now, &mut actions);
        actions.push(self.history_action());
        actions.push(Action::SelectionChanged(self.properties()));
        actions
    }

    fn edit_selection(&mut self, edit: &PropertyEdit, now: f64) -> Vec<Action> {
        let ids = self.ui.selection.ids();
        if apply_edit(&mut self.scene, &ids, edit) == 0 {
            return Vec::new();
        }
        if edit.changes_geometry() {
            self.connectors.refresh_all(&mut self.scene);
        }
        let mut actions = Vec::new();
        self.mark_dirty(now, &mut actions);
        actions.push(Action::SelectionChanged(self.properties()));
        actions
    }

    /// Defaults changed; also apply the edit to any selected text.
    fn with_defaults_changed(&mut self, edit: PropertyEdit, now: f64) -> Vec<Action> {
        let mut actions = self.edit_selection(&edit, now);
        actions.push(Action::DefaultsChanged);
        actions
    }

    fn apply_swatch(&mut self, color: &str, now: f64) -> Vec<Action> {
        let targets: Vec<ElementId> = self
            .ui
            .selection
            .ids()
            .into_iter()
            .filter(|id| self.scene.get(id).is_some_and(|e| !e.is_text()))
            .collect();
        if targets.is_empty() {
            self.ui.defaults.set_color(color);
            return vec![Action::DefaultsChanged];
        }
        let edit = PropertyEdit::Fill(normalize_hex_color(color, &self.ui.defaults.color));
        if apply_edit(&mut self.scene, &targets, &edit) == 0 {
            return Vec::new();
        }
        let mut actions = Vec::new();
        self.mark_dirty(now, &mut actions);
        actions.push(Action::SelectionChanged(self.properties()));
        actions
    }
}

/// Swap in a board, rebuilding connector primitives from its records.
fn install_board(scene: &mut Scene, connectors: &mut ConnectorManager, board: BoardSnapshot) {
    connectors.forget_all();
    *scene = board.scene;
    connectors.restore(scene, &board.connectors);
}

/// Decode before touching anything so a corrupt snapshot leaves the board as is.
fn restore_snapshot(scene: &mut Scene, connectors: &mut ConnectorManager, raw: &str) -> Result<(), SnapshotError> {
    let board = BoardSnapshot::decode(raw)?;
    install_board(scene, connectors, board);
    Ok(())
}

/// The full canvas engine. Wraps `EngineCore` and owns the browser canvas elements.
pub struct Engine {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    minimap: Option<(HtmlCanvasElement, CanvasRenderingContext2d)>,
    dpr: f64,
    pub images: ImageCache,
    pub core: EngineCore,
}

impl Engine {
    /// Create a new engine bound to the given board canvas.
    ///
    /// # Errors
    ///
    /// Fails if the canvas has no 2D context.
    pub fn new(canvas: HtmlCanvasElement, config: BoardConfig) -> Result<Self, JsValue> {
        let ctx = render::context_2d(&canvas)?;
        Ok(Self { canvas, ctx, minimap: None, dpr: 1.0, images: ImageCache::default(), core: EngineCore::new(config) })
    }

    /// Attach the minimap canvas, sized from the configuration.
    ///
    /// # Errors
    ///
    /// Fails if the canvas has no 2D context.
    pub fn attach_minimap(&mut self, canvas: HtmlCanvasElement) -> Result<(), JsValue> {
        let ctx = render::context_2d(&canvas)?;
        render::size_canvas(&canvas, self.core.config.minimap_width, self.core.config.minimap_height, self.dpr);
        self.minimap = Some((canvas, ctx));
        Ok(())
    }

    // --- Viewport ---

    /// Update window dimensions (CSS pixels) and device pixel ratio.
    pub fn set_viewport(&mut self, width_css: f64, height_css: f64, dpr: f64) -> Vec<Action> {
        self.dpr = if dpr > 0.0 { dpr } else { 1.0 };
        render::size_canvas(&self.canvas, width_css, height_css, self.dpr);
        if let Some((canvas, _)) = &self.minimap {
            render::size_canvas(canvas, self.core.config.minimap_width, self.core.config.minimap_height, self.dpr);
        }
        self.core.resize(width_css, height_css)
    }

    /// Size the canvases for the first time and center the view.
    pub fn open_viewport(&mut self, width_css: f64, height_css: f64, dpr: f64) -> Vec<Action> {
        self.set_viewport(width_css, height_css, dpr);
        self.core.open_view(width_css, height_css)
    }

    // --- Delegated input ---

    pub fn execute(&mut self, command: Command, now: f64) -> Vec<Action> {
        self.core.execute(command, now)
    }

    pub fn tick(&mut self, now: f64) -> Vec<Action> {
        self.core.tick(now)
    }

    pub fn on_pointer_down(&mut self, screen_pt: Point, button: Button, modifiers: Modifiers, now: f64) -> Vec<Action> {
        self.core.on_pointer_down(screen_pt, button, modifiers, now)
    }

    pub fn on_pointer_move(&mut self, screen_pt: Point) -> Vec<Action> {
        self.core.on_pointer_move(screen_pt)
    }

    pub fn on_pointer_up(&mut self, now: f64) -> Vec<Action> {
        self.core.on_pointer_up(now)
    }

    pub fn on_double_click(&mut self, screen_pt: Point) -> Vec<Action> {
        self.core.on_double_click(screen_pt)
    }

    pub fn on_wheel(&mut self, screen_pt: Point, delta: WheelDelta, modifiers: Modifiers) -> Vec<Action> {
        self.core.on_wheel(screen_pt, delta, modifiers)
    }

    pub fn on_key_down(&mut self, key: &Key, modifiers: Modifiers, now: f64) -> Vec<Action> {
        self.core.on_key_down(key, modifiers, now)
    }

    // --- Persistence / export ---

    /// Rasterize the requested area on an offscreen canvas and return the
    /// plan together with the encoded data URL.
    ///
    /// # Errors
    ///
    /// Planning errors from [`EngineCore::export_plan`], or
    /// [`ExportError::Encode`] if the browser fails to draw or encode.
    pub fn export(&self, request: &ExportRequest) -> Result<(ExportPlan, String), ExportError> {
        let plan = self.core.export_plan(request)?;
        let data_url = self.rasterize(&plan).map_err(|e| ExportError::Encode(format!("{e:?}")))?;
        log::info!("exported {} ({}x{})", plan.file_name, plan.pixel_width, plan.pixel_height);
        Ok((plan, data_url))
    }

    fn rasterize(&self, plan: &ExportPlan) -> Result<String, JsValue> {
        let document = self.canvas.owner_document().ok_or_else(|| JsValue::from_str("canvas is detached"))?;
        let target: HtmlCanvasElement = document.create_element("canvas")?.dyn_into()?;
        target.set_width(plan.pixel_width);
        target.set_height(plan.pixel_height);
        let ctx = render::context_2d(&target)?;
        render::draw_export(&ctx, &self.core.scene, &self.images, plan)?;
        target.to_data_url_with_type_and_encoder_options(plan.mime, &JsValue::from_f64(plan.quality))
    }

    // --- Render ---

    /// Draw the board and, if attached, the minimap.
    ///
    /// # Errors
    ///
    /// Propagates canvas API failures.
    pub fn render(&self) -> Result<(), JsValue> {
        render::draw(&self.ctx, &self.core, &self.images, self.dpr)?;
        if let Some((_, ctx)) = &self.minimap {
            render::draw_minimap(ctx, &self.core.minimap_view(), self.dpr)?;
        }
        Ok(())
    }
}
