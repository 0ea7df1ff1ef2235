//! Event types for update coordination activity
//!
//! These events are the observable trace of one coordinator run:
//! - Registration (unsupported, registered, failed, fresh install)
//! - Instance watching (started, state observed, abandoned, bypassed)
//! - Hand-off (control message sent or failed, page reloaded or reload suppressed)

use serde::{Deserialize, Serialize};

use crate::domain::{Discovery, WorkerState};

/// Everything the coordinator reports while it works
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CoordinatorEvent {
    // === Registration ===
    /// The host has no registration capability; nothing was attempted
    Unsupported { script_url: String },
    /// Registration completed
    Registered { script_url: String, has_controller: bool },
    /// Registration was rejected by the host
    RegistrationFailed { script_url: String, message: String },
    /// No prior controller: this is a first install, nothing to coordinate
    FreshInstall { script_url: String },

    // === Watching ===
    /// Started watching a new instance
    WatchStarted {
        script_url: String,
        discovery: Discovery,
        state: WorkerState,
    },
    /// A watched instance reported a state
    StateObserved {
        script_url: String,
        discovery: Discovery,
        state: WorkerState,
    },
    /// A watched instance went redundant before reaching `installed`
    WatchAbandoned { script_url: String, discovery: Discovery },
    /// A watched instance was already past `installed`; no message needed
    WatchBypassed {
        script_url: String,
        discovery: Discovery,
        state: WorkerState,
    },

    // === Hand-off ===
    /// The take-over message was delivered
    ControlMessageSent { script_url: String, discovery: Discovery },
    /// The take-over message could not be delivered
    ControlMessageFailed {
        script_url: String,
        discovery: Discovery,
        message: String,
    },
    /// Control moved to the new instance and the page was reloaded
    Reloaded { script_url: String },
    /// Controller changed again after this session already reloaded
    ReloadSuppressed { script_url: String },
}

impl CoordinatorEvent {
    /// Variant name, for logging and display
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Unsupported { .. } => "Unsupported",
            Self::Registered { .. } => "Registered",
            Self::RegistrationFailed { .. } => "RegistrationFailed",
            Self::FreshInstall { .. } => "FreshInstall",
            Self::WatchStarted { .. } => "WatchStarted",
            Self::StateObserved { .. } => "StateObserved",
            Self::WatchAbandoned { .. } => "WatchAbandoned",
            Self::WatchBypassed { .. } => "WatchBypassed",
            Self::ControlMessageSent { .. } => "ControlMessageSent",
            Self::ControlMessageFailed { .. } => "ControlMessageFailed",
            Self::Reloaded { .. } => "Reloaded",
            Self::ReloadSuppressed { .. } => "ReloadSuppressed",
        }
    }

    /// Script the event belongs to
    pub fn script_url(&self) -> &str {
        match self {
            Self::Unsupported { script_url }
            | Self::Registered { script_url, .. }
            | Self::RegistrationFailed { script_url, .. }
            | Self::FreshInstall { script_url }
            | Self::WatchStarted { script_url, .. }
            | Self::StateObserved { script_url, .. }
            | Self::WatchAbandoned { script_url, .. }
            | Self::WatchBypassed { script_url, .. }
            | Self::ControlMessageSent { script_url, .. }
            | Self::ControlMessageFailed { script_url, .. }
            | Self::Reloaded { script_url }
            | Self::ReloadSuppressed { script_url } => script_url,
        }
    }

    /// One-line human readable summary
    pub fn summary(&self) -> String {
        match self {
            Self::Unsupported { .. } => "registration capability unavailable".to_string(),
            Self::Registered { has_controller, .. } => {
                format!("registered (controller present: {})", has_controller)
            }
            Self::RegistrationFailed { message, .. } => format!("registration failed: {}", message),
            Self::FreshInstall { .. } => "fresh install, no update to coordinate".to_string(),
            Self::WatchStarted { discovery, state, .. } => {
                format!("watching {} instance (state: {})", discovery, state)
            }
            Self::StateObserved { discovery, state, .. } => format!("{} instance is {}", discovery, state),
            Self::WatchAbandoned { discovery, .. } => {
                format!("{} instance went redundant before installing", discovery)
            }
            Self::WatchBypassed { discovery, state, .. } => {
                format!("{} instance already {}, nothing to send", discovery, state)
            }
            Self::ControlMessageSent { discovery, .. } => format!("take-over sent to {} instance", discovery),
            Self::ControlMessageFailed { discovery, message, .. } => {
                format!("take-over to {} instance failed: {}", discovery, message)
            }
            Self::Reloaded { .. } => "controller changed, page reloaded".to_string(),
            Self::ReloadSuppressed { .. } => "controller changed, page already reloaded".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_with_type_tag() {
        let event = CoordinatorEvent::ControlMessageSent {
            script_url: "sw.js".to_string(),
            discovery: Discovery::UpdateFound,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ControlMessageSent");
        assert_eq!(json["discovery"], "update_found");
        assert_eq!(json["script_url"], "sw.js");
    }

    #[test]
    fn test_accessors() {
        let event = CoordinatorEvent::Registered {
            script_url: "/sw.js".to_string(),
            has_controller: true,
        };
        assert_eq!(event.event_type(), "Registered");
        assert_eq!(event.script_url(), "/sw.js");
        assert!(event.summary().contains("true"));
    }
}
