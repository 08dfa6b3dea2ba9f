//! Board configuration: virtual canvas size, zoom limits, history tuning.
//!
//! Every field has a default taken from [`crate::consts`]. The host page may
//! override any subset by passing a JSON object to [`BoardConfig::from_json`];
//! unknown keys are ignored and missing keys keep their defaults.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use serde::{Deserialize, Serialize};

use crate::consts;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The override document is not valid JSON for this shape.
    #[error("config parse failed: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value parsed but is outside its allowed range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub virtual_width: f64,
    pub virtual_height: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    pub zoom_step: f64,
    pub minimap_width: f64,
    pub minimap_height: f64,
    pub history_cap: usize,
    pub history_quiet_ms: f64,
    pub image_max_dimension: f64,
    pub paste_offset: f64,
    pub connector_color: String,
    pub connector_width: f64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            virtual_width: consts::VIRTUAL_WIDTH,
            virtual_height: consts::VIRTUAL_HEIGHT,
            min_scale: consts::MIN_SCALE,
            max_scale: consts::MAX_SCALE,
            zoom_step: consts::ZOOM_STEP,
            minimap_width: consts::MINIMAP_WIDTH,
            minimap_height: consts::MINIMAP_HEIGHT,
            history_cap: consts::HISTORY_CAP,
            history_quiet_ms: consts::HISTORY_QUIET_MS,
            image_max_dimension: consts::IMAGE_MAX_DIMENSION,
            paste_offset: consts::PASTE_OFFSET,
            connector_color: consts::CONNECTOR_COLOR.to_owned(),
            connector_width: consts::CONNECTOR_WIDTH,
        }
    }
}

impl BoardConfig {
    /// Build a validated config from a JSON override document.
    ///
    /// An empty or whitespace-only string yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::Invalid`] when a value fails validation.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check ranges that the rest of the engine relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("virtual_width", self.virtual_width)?;
        require_positive("virtual_height", self.virtual_height)?;
        require_positive("min_scale", self.min_scale)?;
        require_positive("max_scale", self.max_scale)?;
        if self.min_scale > self.max_scale {
            return Err(ConfigError::Invalid {
                field: "min_scale",
                reason: format!("{} exceeds max_scale {}", self.min_scale, self.max_scale),
            });
        }
        if !(self.zoom_step.is_finite() && self.zoom_step > 1.0) {
            return Err(ConfigError::Invalid {
                field: "zoom_step",
                reason: format!("{} must be greater than 1", self.zoom_step),
            });
        }
        require_positive("minimap_width", self.minimap_width)?;
        require_positive("minimap_height", self.minimap_height)?;
        if self.history_cap == 0 {
            return Err(ConfigError::Invalid { field: "history_cap", reason: "must be at least 1".into() });
        }
        if !(self.history_quiet_ms.is_finite() && self.history_quiet_ms >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "history_quiet_ms",
                reason: format!("{} must be zero or more", self.history_quiet_ms),
            });
        }
        require_positive("image_max_dimension", self.image_max_dimension)?;
        require_positive("connector_width", self.connector_width)?;
        Ok(())
    }
}

fn require_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid { field, reason: format!("{value} must be a positive number") })
    }
}
