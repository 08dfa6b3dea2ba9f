//! Moodboard: an infinite-canvas board for arranging images, text and shapes.
//!
//! This crate is compiled to WebAssembly and runs in the browser. All editing
//! logic lives in [`engine::EngineCore`], which is plain Rust state and is
//! tested natively. The [`web`] module binds it to the page: DOM events in,
//! canvas frames and host notifications out, with the board and the theme
//! kept in `localStorage`.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Commands, pointer/keyboard handling and the testable [`engine::EngineCore`] |
//! | [`scene`] | Element model, z-ordered scene and hit-testing |
//! | [`viewport`] | Pan/zoom state and screen/virtual conversions |
//! | [`connector`] | Lines and arrowheads that follow the elements they join |
//! | [`history`] | Debounced, bounded undo/redo over board snapshots |
//! | [`properties`] | Selection, properties panel view and edits, drawing defaults |
//! | [`input`] | Tools, modifiers, shortcuts and the gesture state machine |
//! | [`minimap`] | Minimap projection and click-to-center |
//! | [`templates`] | Grid, collage and palette layouts |
//! | [`export`] | Export planning: area, crop, resolution, file name |
//! | [`persistence`] | Key-value store trait and board save/load |
//! | [`theme`] | Light/dark preference |
//! | [`upload`] | Image upload validation |
//! | [`render`] | Canvas 2D drawing for the board, minimap and exports |
//! | [`web`] | `#[wasm_bindgen]` facade for the host page |
//! | [`config`] | Board configuration and validation |
//! | [`color`] | Hex color normalization |
//! | [`consts`] | Shared defaults and limits |

pub mod color;
pub mod config;
pub mod connector;
pub mod consts;
pub mod engine;
pub mod export;
pub mod history;
pub mod input;
pub mod minimap;
pub mod persistence;
pub mod properties;
pub mod render;
pub mod scene;
pub mod templates;
pub mod theme;
pub mod upload;
pub mod viewport;
pub mod web;
