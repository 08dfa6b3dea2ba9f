//! Saving and restoring the board through a string key-value store.
//!
//! The scene and the connector records are kept under separate keys so a
//! board saved before connectors existed still loads. In the browser the
//! store is `window.localStorage`; tests use [`MemoryStore`].

#[cfg(test)]
#[path = "persistence_test.rs"]
mod persistence_test;

use std::collections::HashMap;

use crate::connector::ConnectorRecord;
use crate::consts::{CANVAS_STORAGE_KEY, CONNECTORS_STORAGE_KEY};
use crate::history::BoardSnapshot;
use crate::scene::Scene;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("local storage is not available")]
    Unavailable,

    #[error("storage quota exceeded while writing {key}")]
    QuotaExceeded { key: String },

    #[error("failed to encode board for storage: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("stored value under {key} is corrupt: {source}")]
    Corrupt { key: String, source: serde_json::Error },
}

/// Minimal string store, the shape of the Web Storage API.
pub trait KeyValueStore {
    /// # Errors
    ///
    /// Returns [`StorageError::Unavailable`] when the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    ///
    /// Returns [`StorageError::QuotaExceeded`] when the value does not fit.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns [`StorageError::Unavailable`] when the backend cannot be written.
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// In-memory store with an optional byte quota over all values.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_quota(bytes: usize) -> Self {
        Self { entries: HashMap::new(), quota: Some(bytes) }
    }

    fn used_without(&self, key: &str) -> usize {
        self.entries.iter().filter(|(k, _)| k.as_str() != key).map(|(_, v)| v.len()).sum()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(quota) = self.quota {
            if self.used_without(key) + value.len() > quota {
                return Err(StorageError::QuotaExceeded { key: key.to_owned() });
            }
        }
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Write the board under the canvas and connector keys.
///
/// Connectors go first and the scene second, since the scene key is what
/// marks a save as present. If the scene write fails the previous connector
/// value is put back, so storage keeps the last complete save.
///
/// # Errors
///
/// Returns the first encode or store failure. The caller's in-memory board
/// is never touched.
pub fn save_board(store: &mut dyn KeyValueStore, board: &BoardSnapshot) -> Result<(), StorageError> {
    let scene = serde_json::to_string(&board.scene)?;
    let connectors = serde_json::to_string(&board.connectors)?;
    let previous_connectors = store.get(CONNECTORS_STORAGE_KEY)?;
    store.set(CONNECTORS_STORAGE_KEY, &connectors)?;
    if let Err(e) = store.set(CANVAS_STORAGE_KEY, &scene) {
        let restored = match &previous_connectors {
            Some(previous) => store.set(CONNECTORS_STORAGE_KEY, previous),
            None => store.remove(CONNECTORS_STORAGE_KEY),
        };
        if let Err(restore_err) = restored {
            log::warn!("previous connectors not restored after failed save: {restore_err}");
        }
        return Err(e);
    }
    log::info!("board saved ({} elements, {} connectors)", board.scene.len(), board.connectors.len());
    Ok(())
}

/// Read a previously saved board. `Ok(None)` when nothing was saved.
/// A missing connector key yields no connectors.
///
/// # Errors
///
/// Returns [`StorageError::Corrupt`] if either stored value fails to parse.
pub fn load_board(store: &dyn KeyValueStore) -> Result<Option<BoardSnapshot>, StorageError> {
    let Some(raw_scene) = store.get(CANVAS_STORAGE_KEY)? else {
        return Ok(None);
    };
    let scene: Scene = serde_json::from_str(&raw_scene)
        .map_err(|source| StorageError::Corrupt { key: CANVAS_STORAGE_KEY.to_owned(), source })?;
    let connectors: Vec<ConnectorRecord> = match store.get(CONNECTORS_STORAGE_KEY)? {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|source| StorageError::Corrupt { key: CONNECTORS_STORAGE_KEY.to_owned(), source })?,
        None => Vec::new(),
    };
    log::info!("board loaded ({} elements, {} connectors)", scene.len(), connectors.len());
    Ok(Some(BoardSnapshot { scene, connectors }))
}

/// Remove any saved board.
///
/// # Errors
///
/// Propagates store failures.
pub fn clear_board(store: &mut dyn KeyValueStore) -> Result<(), StorageError> {
    store.remove(CANVAS_STORAGE_KEY)?;
    store.remove(CONNECTORS_STORAGE_KEY)
}
