use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::defaults::DEFAULT_DEBOUNCE_MS;
use crate::error::{TrackerError, TrackerResult};

/// Tunables for [`ConflictTracker`](crate::ConflictTracker).
///
/// Every field is optional so that layers (defaults, a TOML file, editor
/// initialization options) can be merged with later layers winning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TrackerSettings {
    /// Quiet period required after the last request before a scan runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
}

impl TrackerSettings {
    /// Settings with an explicit debounce window.
    pub fn with_debounce_ms(debounce_ms: u64) -> Self {
        Self {
            debounce_ms: Some(debounce_ms),
        }
    }

    /// Parse settings from a TOML document.
    pub fn from_toml_str(contents: &str) -> TrackerResult<Self> {
        toml::from_str::<TrackerSettings>(contents)
            .map_err(|e| TrackerError::config(format!("failed to parse TOML settings: {}", e)))
    }

    /// Parse settings from a JSON value such as editor initialization options.
    ///
    /// `null` is treated as "no settings".
    pub fn from_json(value: Value) -> TrackerResult<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value::<TrackerSettings>(value)
            .map_err(|e| TrackerError::config(format!("failed to parse JSON settings: {}", e)))
    }

    /// Merge `overrides` on top of `self`; values set in `overrides` win.
    pub fn merge(self, overrides: TrackerSettings) -> Self {
        Self {
            debounce_ms: overrides.debounce_ms.or(self.debounce_ms),
        }
    }

    /// The effective debounce window.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS))
    }
}
