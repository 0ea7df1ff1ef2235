//! Worker lifecycle state and discovery slot types

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Lifecycle state of one worker instance, as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Install step running
    Installing,
    /// Finished preparing, not yet controlling anything
    Installed,
    /// Taking over from the previous instance
    Activating,
    /// Controlling the page
    #[serde(alias = "activated")]
    Active,
    /// Replaced or failed to install
    Redundant,
}

impl WorkerState {
    /// All states in lifecycle order
    pub const ALL: [WorkerState; 5] = [
        WorkerState::Installing,
        WorkerState::Installed,
        WorkerState::Activating,
        WorkerState::Active,
        WorkerState::Redundant,
    ];

    /// True once the instance can no longer change state
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Redundant)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Installing => write!(f, "installing"),
            Self::Installed => write!(f, "installed"),
            Self::Activating => write!(f, "activating"),
            Self::Active => write!(f, "active"),
            Self::Redundant => write!(f, "redundant"),
        }
    }
}

impl std::str::FromStr for WorkerState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "WorkerState::from_str: called");
        match s.to_lowercase().as_str() {
            "installing" => Ok(Self::Installing),
            "installed" => Ok(Self::Installed),
            "activating" => Ok(Self::Activating),
            "active" | "activated" => Ok(Self::Active),
            "redundant" => Ok(Self::Redundant),
            _ => {
                debug!(%s, "WorkerState::from_str: unknown state");
                Err(format!(
                    "Unknown worker state: {}. Use: installing, installed, activating, active, or redundant",
                    s
                ))
            }
        }
    }
}

/// Where the coordinator found the instance it is watching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discovery {
    /// Already in the registration's waiting slot
    Waiting,
    /// Already in the registration's installing slot
    Installing,
    /// Appeared in the installing slot after an update-found notification
    UpdateFound,
}

impl std::fmt::Display for Discovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Installing => write!(f, "installing"),
            Self::UpdateFound => write!(f, "update-found"),
        }
    }
}
