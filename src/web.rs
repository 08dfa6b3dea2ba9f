//! Browser bindings: the `MoodBoard` object the host page drives.
//!
//! The host forwards DOM events and toolbar clicks; this layer converts them
//! to engine calls, carries out the returned [`Action`]s (rendering, the
//! history timer, saving) and reports everything else to a single listener
//! callback as plain JSON-shaped objects.
//!
//! Engine state lives in `Rc<RefCell<State>>` so timer and upload tasks can
//! reach it. The borrow is always released before the listener runs, so the
//! listener may call straight back into `MoodBoard`.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use futures::future::{AbortHandle, Abortable};
use gloo_timers::callback::Timeout;
use js_sys::{Date, Function, Promise};
use serde::Serialize;
use uuid::Uuid;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{File, FileReader, HtmlAnchorElement, HtmlCanvasElement, HtmlImageElement, KeyboardEvent, MouseEvent, WheelEvent};

use crate::config::BoardConfig;
use crate::engine::{Action, Command, Engine, MenuItem};
use crate::export::ExportRequest;
use crate::input::{Button, Key, Modifiers, Shortcut, WheelDelta};
use crate::persistence::{KeyValueStore, StorageError};
use crate::properties::{PropertiesView, PropertyEdit};
use crate::scene::{ElementId, TextStyle};
use crate::theme::{self, Theme};
use crate::upload::{self, UploadError};
use crate::viewport::Point;

/// Install the panic hook and the console logger.
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    if let Err(e) = console_log::init_with_level(log::Level::Info) {
        web_sys::console::warn_1(&JsValue::from_str(&format!("logger already installed: {e}")));
    }
}

// =============================================================
// Storage
// =============================================================

/// `window.localStorage` behind [`KeyValueStore`].
struct LocalStore {
    storage: web_sys::Storage,
}

impl LocalStore {
    fn open() -> Result<Self, StorageError> {
        let window = web_sys::window().ok_or(StorageError::Unavailable)?;
        match window.local_storage() {
            Ok(Some(storage)) => Ok(Self { storage }),
            _ => Err(StorageError::Unavailable),
        }
    }
}

impl KeyValueStore for LocalStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.storage.get_item(key).map_err(|_| StorageError::Unavailable)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage.set_item(key, value).map_err(|_| StorageError::QuotaExceeded { key: key.to_owned() })
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.storage.remove_item(key).map_err(|_| StorageError::Unavailable)
    }
}

// =============================================================
// Host events
// =============================================================

/// Everything the host page hears about, tagged by `type`.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum HostEvent {
    Viewport { zoom_percent: u32 },
    Selection { properties: Option<PropertiesView> },
    History { can_undo: bool, can_redo: bool },
    EditText { id: ElementId, text: String },
    ConnectionPending { source: Option<ElementId> },
    Defaults { color: String, font: TextStyle, swatches: Vec<String> },
    Notify { message: String },
}

#[derive(Serialize)]
struct MenuEntry<'a> {
    label: &'a str,
    enabled: bool,
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    let json = serde_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))?;
    js_sys::JSON::parse(&json)
}

fn emit(listener: &Function, event: &HostEvent) {
    let result = to_js(event).and_then(|value| listener.call1(&JsValue::NULL, &value));
    if let Err(e) = result {
        log::warn!("listener failed for {event:?}: {e:?}");
    }
}

fn alert(message: &str) {
    if let Some(window) = web_sys::window() {
        if let Err(e) = window.alert_with_message(message) {
            log::warn!("alert failed: {e:?}");
        }
    }
}

fn confirm(question: &str) -> bool {
    let Some(window) = web_sys::window() else {
        return false;
    };
    match window.confirm_with_message(question) {
        Ok(answer) => answer,
        Err(e) => {
            log::warn!("confirm failed: {e:?}");
            false
        }
    }
}

/// Message for a save attempt, and whether it must interrupt the user.
fn save_notice(result: &Result<(), StorageError>) -> (String, bool) {
    match result {
        Ok(()) => ("Board saved".to_owned(), false),
        Err(e) => (format!("Could not save the board: {e}"), true),
    }
}

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

// =============================================================
// Shared state
// =============================================================

struct State {
    engine: Engine,
    history_timer: Option<Timeout>,
    uploads: Vec<(u64, AbortHandle)>,
    next_upload: u64,
    /// Items of the last menu handed to the host, chosen by index.
    menu: Vec<MenuItem>,
    listener: Option<Function>,
    theme: Theme,
}

impl State {
    fn save(&self) -> HostEvent {
        let result = LocalStore::open().and_then(|mut store| self.engine.core.save(&mut store));
        match &result {
            Ok(()) => log::info!("board saved ({} elements)", self.engine.core.scene.len()),
            Err(e) => log::warn!("save failed: {e}"),
        }
        let (message, blocking) = save_notice(&result);
        if blocking {
            alert(&message);
        }
        HostEvent::Notify { message }
    }

    fn host_event(&self, action: Action) -> Option<HostEvent> {
        Some(match action {
            Action::ViewportChanged { zoom_percent } => HostEvent::Viewport { zoom_percent },
            Action::SelectionChanged(properties) => HostEvent::Selection { properties },
            Action::HistoryChanged { can_undo, can_redo } => HostEvent::History { can_undo, can_redo },
            Action::EditTextRequested { id, text } => HostEvent::EditText { id, text },
            Action::ConnectionPending { source } => HostEvent::ConnectionPending { source },
            Action::DefaultsChanged => {
                let defaults = &self.engine.core.ui.defaults;
                HostEvent::Defaults {
                    color: defaults.color.clone(),
                    font: defaults.font.clone(),
                    swatches: defaults.swatches.clone(),
                }
            }
            Action::Notify(message) => HostEvent::Notify { message },
            Action::RenderNeeded | Action::ScheduleHistory { .. } | Action::SaveRequested => return None,
        })
    }

    /// Draw a frame, first starting any images the scene references but the
    /// cache has not seen (restored boards, undo of a deleted image).
    fn render(&mut self, shared: &Rc<RefCell<State>>) {
        let engine = &mut self.engine;
        match engine.images.preload(&engine.core.scene) {
            Ok(started) => {
                for image in started {
                    redraw_when_decoded(Rc::downgrade(shared), image);
                }
            }
            Err(e) => log::warn!("image preload failed: {e:?}"),
        }
        if let Err(e) = engine.render() {
            log::warn!("render failed: {e:?}");
        }
    }
}

/// Carry out engine actions, then notify the listener outside the borrow.
fn dispatch(shared: &Rc<RefCell<State>>, actions: Vec<Action>) {
    if actions.is_empty() {
        return;
    }
    let mut events = Vec::new();
    let listener = {
        let mut state = shared.borrow_mut();
        let mut render = false;
        for action in actions {
            match action {
                Action::RenderNeeded => render = true,
                Action::ScheduleHistory { delay_ms } => {
                    // Replacing the timeout drops, and so cancels, the previous one.
                    state.history_timer = Some(history_timer(Rc::downgrade(shared), delay_ms));
                }
                Action::SaveRequested => events.push(state.save()),
                other => events.extend(state.host_event(other)),
            }
        }
        if render {
            state.render(shared);
        }
        state.listener.clone()
    };
    if let Some(listener) = listener {
        for event in &events {
            emit(&listener, event);
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn history_timer(shared: Weak<RefCell<State>>, delay_ms: f64) -> Timeout {
    let millis = if delay_ms.is_finite() { delay_ms.clamp(0.0, f64::from(u32::MAX)).ceil() as u32 } else { 0 };
    Timeout::new(millis, move || {
        if let Some(shared) = shared.upgrade() {
            let actions = {
                let mut state = shared.borrow_mut();
                state.history_timer = None;
                state.engine.tick(Date::now())
            };
            dispatch(&shared, actions);
        }
    })
}

fn redraw_when_decoded(shared: Weak<RefCell<State>>, image: HtmlImageElement) {
    spawn_local(async move {
        if let Err(e) = JsFuture::from(image.decode()).await {
            log::warn!("stored image failed to decode: {e:?}");
            return;
        }
        if let Some(shared) = shared.upgrade() {
            dispatch(&shared, vec![Action::RenderNeeded]);
        }
    });
}

fn apply_theme(theme: Theme) {
    let root = web_sys::window().and_then(|w| w.document()).and_then(|d| d.document_element());
    if let Some(root) = root {
        if let Err(e) = root.set_attribute("data-theme", theme.as_str()) {
            log::warn!("failed to apply theme: {e:?}");
        }
    }
}

/// Dark when the system asks for it and nothing is stored.
fn system_theme() -> Theme {
    let prefers_dark = web_sys::window()
        .and_then(|w| w.match_media("(prefers-color-scheme: dark)").unwrap_or_default())
        .is_some_and(|mq| mq.matches());
    if prefers_dark { Theme::Dark } else { Theme::Light }
}

// =============================================================
// DOM event conversion
// =============================================================

fn mouse_point(event: &MouseEvent) -> Point {
    Point::new(f64::from(event.offset_x()), f64::from(event.offset_y()))
}

fn mouse_modifiers(event: &MouseEvent) -> Modifiers {
    Modifiers { shift: event.shift_key(), ctrl: event.ctrl_key(), alt: event.alt_key(), meta: event.meta_key() }
}

fn key_modifiers(event: &KeyboardEvent) -> Modifiers {
    Modifiers { shift: event.shift_key(), ctrl: event.ctrl_key(), alt: event.alt_key(), meta: event.meta_key() }
}

// =============================================================
// Uploads
// =============================================================

/// Read `file` as a data URL and decode it into an image element.
async fn read_image(file: File) -> Result<(String, HtmlImageElement), UploadError> {
    let read = |e: JsValue| UploadError::Read(format!("{e:?}"));
    let decode = |e: JsValue| UploadError::Decode(format!("{e:?}"));

    let reader = FileReader::new().map_err(read)?;
    let loaded = Promise::new(&mut |resolve, reject| {
        reader.set_onload(Some(&resolve));
        reader.set_onerror(Some(&reject));
    });
    reader.read_as_data_url(&file).map_err(read)?;
    JsFuture::from(loaded).await.map_err(read)?;
    let src = reader.result().map_err(read)?.as_string().ok_or_else(|| UploadError::Read("result is not text".into()))?;

    let image = HtmlImageElement::new().map_err(decode)?;
    image.set_src(&src);
    JsFuture::from(image.decode()).await.map_err(decode)?;
    Ok((src, image))
}

fn finish_upload(shared: &Rc<RefCell<State>>, src: String, image: &HtmlImageElement) {
    let actions = {
        let mut state = shared.borrow_mut();
        state.engine.images.insert(src.clone(), image.clone());
        let command = Command::AddImage {
            src,
            width: f64::from(image.natural_width()),
            height: f64::from(image.natural_height()),
        };
        state.engine.execute(command, Date::now())
    };
    dispatch(shared, actions);
}

// =============================================================
// MoodBoard
// =============================================================

/// The board as seen from JavaScript.
#[wasm_bindgen]
pub struct MoodBoard {
    shared: Rc<RefCell<State>>,
}

#[wasm_bindgen]
impl MoodBoard {
    /// Bind to `canvas`, restore the saved board and theme, and size the view
    /// from the canvas's CSS box. `config` is an optional JSON override.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration or when the canvas has no 2D context.
    #[wasm_bindgen(constructor)]
    pub fn new(canvas: HtmlCanvasElement, config: Option<String>) -> Result<MoodBoard, JsValue> {
        let config = BoardConfig::from_json(config.as_deref().unwrap_or_default()).map_err(js_error)?;
        let width = f64::from(canvas.client_width());
        let height = f64::from(canvas.client_height());
        let dpr = web_sys::window().map_or(1.0, |w| w.device_pixel_ratio());
        let mut engine = Engine::new(canvas, config)?;

        let theme = match LocalStore::open() {
            Ok(store) => {
                match engine.core.load(&store) {
                    Ok(true) => log::info!("restored board ({} elements)", engine.core.scene.len()),
                    Ok(false) => log::debug!("no saved board"),
                    Err(e) => log::warn!("saved board not restored: {e}"),
                }
                theme::load(&store, system_theme())
            }
            Err(e) => {
                log::warn!("{e}; the board will not persist");
                system_theme()
            }
        };
        apply_theme(theme);

        let mut actions = engine.open_viewport(width, height, dpr);
        actions.push(Action::RenderNeeded);
        let shared = Rc::new(RefCell::new(State {
            engine,
            history_timer: None,
            uploads: Vec::new(),
            next_upload: 0,
            menu: Vec::new(),
            listener: None,
            theme,
        }));
        dispatch(&shared, actions);
        Ok(MoodBoard { shared })
    }

    /// # Errors
    ///
    /// Fails when the canvas has no 2D context.
    pub fn attach_minimap(&self, canvas: HtmlCanvasElement) -> Result<(), JsValue> {
        self.shared.borrow_mut().engine.attach_minimap(canvas)?;
        self.run(vec![Action::RenderNeeded]);
        Ok(())
    }

    /// Receive host events. The callback gets one object per event.
    pub fn set_listener(&self, listener: Function) {
        self.shared.borrow_mut().listener = Some(listener);
    }

    pub fn resize(&self, width: f64, height: f64, dpr: f64) {
        let actions = self.shared.borrow_mut().engine.set_viewport(width, height, dpr);
        self.run(actions);
    }

    /// Flip light/dark, persist it, and return the new theme name.
    pub fn toggle_theme(&self) -> String {
        let theme = {
            let mut state = self.shared.borrow_mut();
            state.theme = state.theme.toggled();
            state.theme
        };
        apply_theme(theme);
        if let Err(e) = LocalStore::open().and_then(|mut store| theme::save(&mut store, theme)) {
            log::warn!("theme preference not saved: {e}");
        }
        theme.as_str().to_owned()
    }

    // --- Input ---

    pub fn pointer_down(&self, event: &MouseEvent) {
        let button = Button::from_dom(event.button());
        let actions =
            self.shared.borrow_mut().engine.on_pointer_down(mouse_point(event), button, mouse_modifiers(event), Date::now());
        self.run(actions);
    }

    pub fn pointer_move(&self, event: &MouseEvent) {
        let actions = self.shared.borrow_mut().engine.on_pointer_move(mouse_point(event));
        self.run(actions);
    }

    pub fn pointer_up(&self) {
        let actions = self.shared.borrow_mut().engine.on_pointer_up(Date::now());
        self.run(actions);
    }

    pub fn double_click(&self, event: &MouseEvent) {
        let actions = self.shared.borrow_mut().engine.on_double_click(mouse_point(event));
        self.run(actions);
    }

    pub fn wheel(&self, event: &WheelEvent) {
        event.prevent_default();
        let delta = WheelDelta { dx: event.delta_x(), dy: event.delta_y() };
        let actions = self.shared.borrow_mut().engine.on_wheel(mouse_point(event), delta, mouse_modifiers(event));
        self.run(actions);
    }

    pub fn key_down(&self, event: &KeyboardEvent) {
        let key = Key(event.key());
        let modifiers = key_modifiers(event);
        if Shortcut::from_key(&key, modifiers).is_some_and(Shortcut::prevents_default) {
            event.prevent_default();
        }
        let actions = self.shared.borrow_mut().engine.on_key_down(&key, modifiers, Date::now());
        self.run(actions);
    }

    pub fn minimap_click(&self, event: &MouseEvent) {
        let actions = self.shared.borrow_mut().engine.core.minimap_click(mouse_point(event));
        self.run(actions);
    }

    /// Select whatever is under the pointer and return the menu entries as
    /// `[{label, enabled}]`. Pick one with [`MoodBoard::choose_menu_item`].
    ///
    /// # Errors
    ///
    /// Fails only if the entries cannot be converted to JavaScript values.
    pub fn context_menu(&self, event: &MouseEvent) -> Result<JsValue, JsValue> {
        event.prevent_default();
        let menu = self.shared.borrow().engine.core.context_menu(mouse_point(event));
        if let Some(target) = menu.target {
            let actions = self.shared.borrow_mut().engine.execute(Command::Select(vec![target]), Date::now());
            self.run(actions);
        }
        let entries: Vec<MenuEntry<'_>> =
            menu.items.iter().map(|item| MenuEntry { label: item.label, enabled: item.enabled }).collect();
        let value = to_js(&entries)?;
        self.shared.borrow_mut().menu = menu.items;
        Ok(value)
    }

    pub fn choose_menu_item(&self, index: usize) {
        let item = {
            let mut state = self.shared.borrow_mut();
            let item = state.menu.get(index).cloned();
            state.menu.clear();
            item
        };
        match item {
            Some(item) if item.enabled => self.execute(item.command),
            Some(item) => log::debug!("ignored disabled menu item {}", item.label),
            None => log::warn!("menu item {index} is out of range"),
        }
    }

    // --- Commands ---

    /// Run a toolbar command by name, e.g. `("add-shape", "circle")`.
    ///
    /// # Errors
    ///
    /// Fails for unknown names and bad arguments.
    pub fn command(&self, name: &str, arg: Option<String>) -> Result<(), JsValue> {
        let command = Command::from_name(name, arg.as_deref()).map_err(|e| JsValue::from_str(&e))?;
        self.execute(command);
        Ok(())
    }

    /// Apply a properties panel field to the selection.
    ///
    /// # Errors
    ///
    /// Fails for unknown fields and values of the wrong type.
    pub fn edit_property(&self, field: &str, value: JsValue) -> Result<(), JsValue> {
        let json = String::from(js_sys::JSON::stringify(&value)?);
        let value: serde_json::Value = serde_json::from_str(&json).map_err(js_error)?;
        let edit = PropertyEdit::from_field(field, &value).map_err(|e| JsValue::from_str(&e))?;
        self.execute(Command::Edit(edit));
        Ok(())
    }

    /// Commit the host text editor's content for a text element.
    ///
    /// # Errors
    ///
    /// Fails if `id` is not an element id.
    pub fn set_text(&self, id: &str, text: String) -> Result<(), JsValue> {
        let id = Uuid::parse_str(id).map_err(js_error)?;
        self.execute(Command::SetText { id, text });
        Ok(())
    }

    /// Validate, read and decode an image file, then place it at the view
    /// center. Non-images are refused with a blocking message.
    pub fn upload(&self, file: File) {
        if let Err(e) = upload::check_mime(&file.type_()) {
            log::warn!("rejected upload {}: {e:?}", file.name());
            alert(&e.to_string());
            return;
        }
        let (handle, registration) = AbortHandle::new_pair();
        let id = {
            let mut state = self.shared.borrow_mut();
            let id = state.next_upload;
            state.next_upload += 1;
            state.uploads.push((id, handle));
            id
        };
        let shared = Rc::downgrade(&self.shared);
        spawn_local(async move {
            let outcome = Abortable::new(read_image(file), registration).await;
            let Some(shared) = shared.upgrade() else {
                return;
            };
            shared.borrow_mut().uploads.retain(|(other, _)| *other != id);
            match outcome {
                Ok(Ok((src, image))) => finish_upload(&shared, src, &image),
                Ok(Err(e)) => {
                    log::warn!("upload failed: {e}");
                    alert(&e.to_string());
                }
                Err(_aborted) => log::debug!("upload {id} aborted"),
            }
        });
    }

    // --- Export ---

    /// Rasterize and download `mood-board.<ext>`.
    /// `area` is `canvas`, `selection` or `viewport`.
    ///
    /// # Errors
    ///
    /// Fails for unknown format or area names and when the download link
    /// cannot be created. Empty exports are reported as a notification.
    pub fn export(&self, format: &str, area: &str, multiplier: f64, quality: f64) -> Result<(), JsValue> {
        let request =
            ExportRequest { format: format.parse().map_err(js_error)?, area: area.parse().map_err(js_error)?, multiplier, quality };
        let exported = self.shared.borrow().engine.export(&request);
        let (plan, data_url) = match exported {
            Ok(done) => done,
            Err(e) => {
                log::warn!("export failed: {e}");
                self.run(vec![Action::Notify(format!("Export failed: {e}"))]);
                return Ok(());
            }
        };
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| JsValue::from_str("no document to download into"))?;
        let link: HtmlAnchorElement = document.create_element("a")?.dyn_into()?;
        link.set_href(&data_url);
        link.set_download(&plan.file_name);
        link.click();
        Ok(())
    }

    /// Data URL of the whole board at 1x, for a preview thumbnail.
    ///
    /// # Errors
    ///
    /// Fails when the browser cannot encode the canvas.
    pub fn export_preview(&self) -> Result<String, JsValue> {
        let (_, data_url) = self.shared.borrow().engine.export(&ExportRequest::default()).map_err(js_error)?;
        Ok(data_url)
    }

    // --- Queries ---

    pub fn zoom_percent(&self) -> u32 {
        self.shared.borrow().engine.core.viewport.zoom_percent()
    }

    pub fn can_undo(&self) -> bool {
        self.shared.borrow().engine.core.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.shared.borrow().engine.core.can_redo()
    }

    /// Properties panel contents, or `null` when nothing is selected.
    ///
    /// # Errors
    ///
    /// Fails only if the view cannot be converted to a JavaScript value.
    pub fn properties(&self) -> Result<JsValue, JsValue> {
        let view = self.shared.borrow().engine.core.properties();
        to_js(&view)
    }

    pub fn swatches(&self) -> Vec<String> {
        self.shared.borrow().engine.core.ui.defaults.swatches.clone()
    }
}

impl MoodBoard {
    fn execute(&self, command: Command) {
        if let Some(question) = command.confirmation() {
            if !confirm(question) {
                log::debug!("{command:?} cancelled");
                return;
            }
        }
        let actions = self.shared.borrow_mut().engine.execute(command, Date::now());
        self.run(actions);
    }

    fn run(&self, actions: Vec<Action>) {
        dispatch(&self.shared, actions);
    }
}

impl Drop for MoodBoard {
    fn drop(&mut self) {
        let mut state = self.shared.borrow_mut();
        for (_, handle) in state.uploads.drain(..) {
            handle.abort();
        }
        state.history_timer = None;
    }
}

#[cfg(test)]
#[path = "web_test.rs"]
mod web_test;
