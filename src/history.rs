//! Snapshot-based undo/redo.
//!
//! The board is captured as opaque JSON text. Mutations are debounced: each
//! one pushes the deadline out by the quiet period, and only when the
//! deadline passes is a single snapshot recorded for the whole burst.
//! Time is passed in as milliseconds so the state machine runs the same
//! under a browser timer and under test.
//!
//! Loading a snapshot is itself a scene mutation. A one-shot flag set by
//! undo/redo swallows the notification that the load triggers, so replaying
//! history never records history.

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

use serde::{Deserialize, Serialize};

use crate::connector::{ConnectorManager, ConnectorRecord};
use crate::scene::Scene;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot is not valid board JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Everything needed to rebuild the board, minus connector primitives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub scene: Scene,
    #[serde(default)]
    pub connectors: Vec<ConnectorRecord>,
}

impl BoardSnapshot {
    /// Capture the scene without the lines and arrowheads owned by connectors;
    /// those are rebuilt from the records on restore.
    #[must_use]
    pub fn capture(scene: &Scene, connectors: &ConnectorManager) -> Self {
        let elements = scene.iter().filter(|e| !connectors.is_primitive(&e.id)).cloned().collect();
        Self { scene: Scene::from_elements(elements), connectors: connectors.records() }
    }

    /// # Errors
    ///
    /// Returns [`SnapshotError::Malformed`] if serialization fails.
    pub fn encode(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// # Errors
    ///
    /// Returns [`SnapshotError::Malformed`] for text that is not a snapshot.
    pub fn decode(raw: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Bounded linear history with a cursor.
#[derive(Debug, Clone)]
pub struct History {
    snapshots: Vec<String>,
    cursor: usize,
    cap: usize,
    quiet_ms: f64,
    deadline: Option<f64>,
    ignore_next: bool,
}

impl History {
    #[must_use]
    pub fn new(cap: usize, quiet_ms: f64) -> Self {
        Self { snapshots: Vec::new(), cursor: 0, cap: cap.max(1), quiet_ms, deadline: None, ignore_next: false }
    }

    /// Discard everything and start over from `snapshot` as position 0.
    pub fn seed(&mut self, snapshot: String) {
        self.snapshots.clear();
        self.snapshots.push(snapshot);
        self.cursor = 0;
        self.deadline = None;
        self.ignore_next = false;
    }

    /// Observe a scene mutation at time `now`.
    ///
    /// Returns `true` if a record is now scheduled, `false` if the mutation
    /// was the echo of a snapshot load and was swallowed.
    pub fn note_mutation(&mut self, now: f64) -> bool {
        if self.ignore_next {
            self.ignore_next = false;
            log::debug!("history: ignoring mutation caused by snapshot load");
            return false;
        }
        self.deadline = Some(now + self.quiet_ms);
        true
    }

    /// When the pending record fires, if one is scheduled.
    #[must_use]
    pub fn deadline(&self) -> Option<f64> {
        self.deadline
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Clear and report a pending record whose quiet period has elapsed.
    pub fn take_due(&mut self, now: f64) -> bool {
        match self.deadline {
            Some(at) if at <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Clear and report a pending record regardless of its deadline.
    pub fn take_pending(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Append a snapshot after the cursor, discarding any redo tail and the
    /// oldest entries beyond the cap.
    pub fn record(&mut self, snapshot: String) {
        if !self.snapshots.is_empty() {
            self.snapshots.truncate(self.cursor + 1);
        }
        self.snapshots.push(snapshot);
        if self.snapshots.len() > self.cap {
            let excess = self.snapshots.len() - self.cap;
            self.snapshots = self.snapshots.split_off(excess);
        }
        self.cursor = self.snapshots.len() - 1;
        log::debug!("history: recorded position {} of {}", self.cursor, self.snapshots.len());
    }

    /// Step back one snapshot, handing it to `load`.
    ///
    /// Returns `Ok(false)` at the oldest position. If `load` fails the cursor
    /// does not move.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `load`.
    pub fn undo<E>(&mut self, load: impl FnOnce(&str) -> Result<(), E>) -> Result<bool, E> {
        if !self.can_undo() {
            return Ok(false);
        }
        self.step_to(self.cursor - 1, load)
    }

    /// Step forward one snapshot, handing it to `load`.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `load`.
    pub fn redo<E>(&mut self, load: impl FnOnce(&str) -> Result<(), E>) -> Result<bool, E> {
        if !self.can_redo() {
            return Ok(false);
        }
        self.step_to(self.cursor + 1, load)
    }

    fn step_to<E>(&mut self, target: usize, load: impl FnOnce(&str) -> Result<(), E>) -> Result<bool, E> {
        let Some(snapshot) = self.snapshots.get(target) else {
            return Ok(false);
        };
        load(snapshot)?;
        self.cursor = target;
        self.ignore_next = true;
        log::debug!("history: moved to position {target}");
        Ok(true)
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    #[must_use]
    pub fn snapshots(&self) -> &[String] {
        &self.snapshots
    }
}
