//! Coordinator configuration

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Worker script to register
    #[serde(rename = "script-url", default = "default_script_url")]
    pub script_url: String,

    /// Keep listening for update-found after the first newly found instance
    #[serde(rename = "rearm-on-update", default = "default_rearm_on_update")]
    pub rearm_on_update: bool,

    /// Event bus buffer size
    #[serde(rename = "event-capacity", default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_script_url() -> String {
    debug!("default_script_url: called");
    "sw.js".to_string()
}

fn default_rearm_on_update() -> bool {
    debug!("default_rearm_on_update: called");
    true
}

fn default_event_capacity() -> usize {
    debug!("default_event_capacity: called");
    crate::events::DEFAULT_CHANNEL_CAPACITY
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        debug!("CoordinatorConfig::default: called");
        Self {
            script_url: default_script_url(),
            rearm_on_update: default_rearm_on_update(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl CoordinatorConfig {
    /// Config for a specific script with all other fields defaulted
    pub fn for_script(script_url: impl Into<String>) -> Self {
        Self {
            script_url: script_url.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.script_url, "sw.js");
        assert!(config.rearm_on_update);
        assert_eq!(config.event_capacity, 256);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: CoordinatorConfig = serde_yaml::from_str("rearm-on-update: false\n").unwrap();
        assert_eq!(config.script_url, "sw.js");
        assert!(!config.rearm_on_update);
    }

    #[test]
    fn test_for_script() {
        let config = CoordinatorConfig::for_script("/app/sw.js");
        assert_eq!(config.script_url, "/app/sw.js");
        assert!(config.rearm_on_update);
    }
}
