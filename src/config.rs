//! Panel configuration.
//!
//! Every field has a default so a partial JSON document is enough.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PanelError;
use crate::request::DefeaterOptions;

/// Ordering of the offered Target/R pools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolOrder {
    /// Sorted by variable name.
    #[default]
    Alphabetical,
    /// Declaration order of the loaded model.
    Catalogue,
}

/// Engine dispatch worker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Number of engine workers.
    pub workers: usize,
    /// Maximum queued engine calls.
    pub queue_capacity: usize,
    /// How long a trigger waits for the engine.
    pub timeout_ms: u64,
}

impl DispatcherConfig {
    /// Timeout as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 64,
            timeout_ms: 60_000,
        }
    }
}

/// Top-level panel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Network loaded for `ModelSource::Default`.
    pub default_model: Option<PathBuf>,
    /// Ordering of offered pools.
    pub pool_order: PoolOrder,
    /// Per-session notification buffer.
    pub notification_capacity: usize,
    /// Engine dispatch settings.
    pub dispatcher: DispatcherConfig,
    /// Options attached to every defeater request.
    pub defeaters: DefeaterOptions,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            default_model: None,
            pool_order: PoolOrder::default(),
            notification_capacity: 256,
            dispatcher: DispatcherConfig::default(),
            defeaters: DefeaterOptions::default(),
        }
    }
}

impl PanelConfig {
    /// Parses a JSON configuration document.
    ///
    /// # Errors
    /// `PanelError::Config` if the document is not valid.
    pub fn from_json(s: &str) -> Result<Self, PanelError> {
        let cfg: Self = serde_json::from_str(s).map_err(|e| PanelError::config(format!("parse config: {e}")))?;
        if cfg.notification_capacity == 0 {
            return Err(PanelError::config("notification_capacity must be at least 1"));
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let cfg = PanelConfig::from_json(r#"{"pool_order": "catalogue"}"#).unwrap();
        assert_eq!(cfg.pool_order, PoolOrder::Catalogue);
        assert_eq!(cfg.notification_capacity, 256);
        assert_eq!(cfg.dispatcher, DispatcherConfig::default());
        assert!(cfg.defeaters.max_depth.is_none());
        assert!(cfg.defeaters.evaluate_singletons);
    }

    #[test]
    fn nested_sections_parse() {
        let cfg = PanelConfig::from_json(
            r#"{
                "default_model": "/srv/networks/network_5.bif",
                "dispatcher": {"workers": 4, "timeout_ms": 500},
                "defeaters": {"max_depth": 2, "evaluate_singletons": false}
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.default_model, Some(PathBuf::from("/srv/networks/network_5.bif")));
        assert_eq!(cfg.dispatcher.workers, 4);
        assert_eq!(cfg.dispatcher.queue_capacity, 64);
        assert_eq!(cfg.dispatcher.timeout(), Duration::from_millis(500));
        assert_eq!(cfg.defeaters.max_depth, Some(2));
    }

    #[test]
    fn invalid_json_is_config_error() {
        let err = PanelConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, PanelError::Config { .. }));

        let err = PanelConfig::from_json(r#"{"notification_capacity": 0}"#).unwrap_err();
        assert!(matches!(err, PanelError::Config { .. }));
    }
}
