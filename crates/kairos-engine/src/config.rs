//! Configuration for the evaluation engine

use kairos_domain::CalendarZone;
use serde::{Deserialize, Serialize};

/// Configuration for the [`Engine`](crate::Engine) and [`KeyWorker`](crate::KeyWorker)
///
/// # Examples
///
/// ```
/// use kairos_engine::EngineConfig;
///
/// // Default configuration (parallel, lenient definitions)
/// let config = EngineConfig::default();
/// assert_eq!(config.max_concurrent_keys, 8);
///
/// // One key at a time
/// let config = EngineConfig::sequential();
/// assert_eq!(config.max_concurrent_keys, 1);
///
/// // Any bad definition fails initialization
/// let config = EngineConfig::strict();
/// assert!(config.strict_definitions);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Keys evaluated concurrently by the worker
    /// Default: 8
    pub max_concurrent_keys: usize,

    /// Record the derivation graph for each key
    /// Default: true
    pub record_derivations: bool,

    /// Fail initialization when any definition fails to resolve,
    /// instead of skipping it and its dependents
    /// Default: false
    pub strict_definitions: bool,

    /// Abort a key after this many rule firings
    /// Default: none; evaluation always terminates on its own
    pub max_firings_per_key: Option<usize>,

    /// Calendar the data is expected in; facts in another zone are reported
    /// Default: UTC
    pub calendar_zone: CalendarZone,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_keys: 8,
            record_derivations: true,
            strict_definitions: false,
            max_firings_per_key: None,
            calendar_zone: CalendarZone::Utc,
        }
    }
}

impl EngineConfig {
    /// Sequential preset: one key at a time
    pub fn sequential() -> Self {
        Self {
            max_concurrent_keys: 1,
            ..Self::default()
        }
    }

    /// Strict preset: reject bad definitions and bound firings per key
    pub fn strict() -> Self {
        Self {
            strict_definitions: true,
            max_firings_per_key: Some(100_000),
            ..Self::default()
        }
    }

    /// Use a calendar zone
    pub fn with_calendar_zone(mut self, zone: CalendarZone) -> Self {
        self.calendar_zone = zone;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_keys == 0 {
            return Err("max_concurrent_keys must be greater than 0".to_string());
        }
        if self.max_firings_per_key == Some(0) {
            return Err("max_firings_per_key must be greater than 0 when set".to_string());
        }
        Ok(())
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}
