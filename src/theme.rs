//! Light/dark theme preference.
//!
//! Stored as `"light"` or `"dark"` under the theme key and applied by the
//! web layer as a `data-theme` attribute on `<html>`.

#[cfg(test)]
#[path = "theme_test.rs"]
mod theme_test;

use crate::consts::THEME_STORAGE_KEY;
use crate::persistence::{KeyValueStore, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// Unknown values map to `None` so callers can fall back.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }

    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

/// Stored preference, or `fallback` when none is stored or it is unreadable.
#[must_use]
pub fn load(store: &dyn KeyValueStore, fallback: Theme) -> Theme {
    match store.get(THEME_STORAGE_KEY) {
        Ok(Some(raw)) => Theme::parse(&raw).unwrap_or(fallback),
        Ok(None) => fallback,
        Err(e) => {
            log::warn!("theme preference unreadable: {e}");
            fallback
        }
    }
}

/// # Errors
///
/// Propagates store failures.
pub fn save(store: &mut dyn KeyValueStore, theme: Theme) -> Result<(), StorageError> {
    store.set(THEME_STORAGE_KEY, theme.as_str())
}
