//! Configuration
//!
//! Runtime knobs for hydration markers and the scheduler. Every field has a
//! default matching the wire protocol emitted by the server renderer, so a
//! configuration file only needs to name what it overrides.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SprigConfig {
    pub hydration: HydrationConfig,
    pub scheduler: SchedulerConfig,
}

impl SprigConfig {
    /// Parse a configuration from JSON, filling omitted fields with defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let h = &self.hydration;
        let fields = [
            ("hydration.container_marker", &h.container_marker),
            ("hydration.start_marker", &h.start_marker),
            ("hydration.end_marker", &h.end_marker),
            ("hydration.children_marker", &h.children_marker),
            ("hydration.children_end_marker", &h.children_end_marker),
        ];
        for (field, value) in fields {
            if value.is_empty() {
                return Err(ConfigError::Empty { field });
            }
        }
        Ok(())
    }
}

/// Marker names used by the hydration protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HydrationConfig {
    /// Boolean attribute identifying a hydration container element.
    pub container_marker: String,
    /// Comment text opening an island.
    pub start_marker: String,
    /// Comment text closing an island.
    pub end_marker: String,
    /// Comment text opening a forwarded children run (and the client placeholder).
    pub children_marker: String,
    /// Comment text closing a forwarded children run.
    pub children_end_marker: String,
}

impl Default for HydrationConfig {
    fn default() -> Self {
        Self {
            container_marker: "data-hydrate".to_string(),
            start_marker: "start".to_string(),
            end_marker: "end".to_string(),
            children_marker: "children".to_string(),
            children_end_marker: "/children".to_string(),
        }
    }
}

/// Scheduler limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum task/frame turns `run_until_idle` performs before giving up.
    pub max_turns: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_turns: 10_000 }
    }
}
