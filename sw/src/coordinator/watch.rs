//! Per-instance watch state machine
//!
//! ```text
//!  Unwatched ──begin──► Watching ──installed──────────► Notified
//!                          │
//!                          ├──redundant──────────► Abandoned
//!                          │
//!                          └──activating/active──► Bypassed
//! ```
//!
//! `Watching → Notified` is the only transition that produces a
//! [`WatchAction::SendControl`], and it can fire once. Anything observed after
//! a terminal phase is absorbed.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::WorkerState;

/// Phase of one watched instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchPhase {
    #[default]
    Unwatched,
    Watching,
    /// Control message has been sent
    Notified,
    /// Instance went redundant before it was seen installed
    Abandoned,
    /// Instance was already past `installed` when seen
    Bypassed,
}

impl WatchPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WatchPhase::Notified | WatchPhase::Abandoned | WatchPhase::Bypassed)
    }
}

/// What the watcher should do after observing a state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchAction {
    /// First observation of `installed`: send the control message now
    SendControl,
    /// Keep listening
    Wait,
    /// Stop listening, nothing to send
    Abandon,
    /// Instance moved on without needing the message; stop listening
    Release,
    /// Notification after the watch already finished
    Duplicate,
    /// Observation before `begin`
    Inactive,
}

/// Guarded one-shot state machine for a single instance
#[derive(Debug, Default)]
pub struct InstanceWatch {
    phase: WatchPhase,
}

impl InstanceWatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> WatchPhase {
        self.phase
    }

    /// Move `Unwatched → Watching`; false if already started
    pub fn begin(&mut self) -> bool {
        debug!(phase = ?self.phase, "InstanceWatch::begin: called");
        if self.phase == WatchPhase::Unwatched {
            self.phase = WatchPhase::Watching;
            true
        } else {
            false
        }
    }

    /// Feed one observed state
    pub fn observe(&mut self, state: WorkerState) -> WatchAction {
        debug!(phase = ?self.phase, %state, "InstanceWatch::observe: called");
        match (self.phase, state) {
            (WatchPhase::Unwatched, _) => WatchAction::Inactive,
            (phase, _) if phase.is_terminal() => WatchAction::Duplicate,
            (_, WorkerState::Installing) => WatchAction::Wait,
            (_, WorkerState::Installed) => {
                self.phase = WatchPhase::Notified;
                WatchAction::SendControl
            }
            (_, state) if state.is_terminal() => {
                self.phase = WatchPhase::Abandoned;
                WatchAction::Abandon
            }
            (_, _) => {
                self.phase = WatchPhase::Bypassed;
                WatchAction::Release
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_state() -> impl Strategy<Value = WorkerState> {
        prop::sample::select(WorkerState::ALL.to_vec())
    }

    #[test]
    fn test_begin_is_one_shot() {
        let mut watch = InstanceWatch::new();
        assert_eq!(watch.phase(), WatchPhase::Unwatched);
        assert!(watch.begin());
        assert!(!watch.begin());
        assert_eq!(watch.phase(), WatchPhase::Watching);
    }

    #[test]
    fn test_observe_before_begin_is_inactive() {
        let mut watch = InstanceWatch::new();
        assert_eq!(watch.observe(WorkerState::Installed), WatchAction::Inactive);
        assert_eq!(watch.phase(), WatchPhase::Unwatched);
    }

    #[test]
    fn test_installing_then_installed_sends_once() {
        let mut watch = InstanceWatch::new();
        watch.begin();

        assert_eq!(watch.observe(WorkerState::Installing), WatchAction::Wait);
        assert_eq!(watch.observe(WorkerState::Installed), WatchAction::SendControl);
        assert_eq!(watch.observe(WorkerState::Installed), WatchAction::Duplicate);
        assert_eq!(watch.observe(WorkerState::Activating), WatchAction::Duplicate);
        assert_eq!(watch.phase(), WatchPhase::Notified);
        assert!(watch.phase().is_terminal());
    }

    #[test]
    fn test_redundant_before_installed_abandons() {
        let mut watch = InstanceWatch::new();
        watch.begin();

        assert_eq!(watch.observe(WorkerState::Installing), WatchAction::Wait);
        assert_eq!(watch.observe(WorkerState::Redundant), WatchAction::Abandon);
        assert_eq!(watch.observe(WorkerState::Installed), WatchAction::Duplicate);
        assert_eq!(watch.phase(), WatchPhase::Abandoned);
    }

    #[test]
    fn test_already_past_installed_releases_without_sending() {
        let mut watch = InstanceWatch::new();
        watch.begin();

        assert_eq!(watch.observe(WorkerState::Activating), WatchAction::Release);
        assert_eq!(watch.observe(WorkerState::Installed), WatchAction::Duplicate);
        assert_eq!(watch.phase(), WatchPhase::Bypassed);
        assert!(watch.phase().is_terminal());

        let mut watch = InstanceWatch::new();
        watch.begin();
        assert_eq!(watch.observe(WorkerState::Active), WatchAction::Release);
    }

    proptest! {
        #[test]
        fn prop_control_sent_at_most_once(states in prop::collection::vec(any_state(), 0..40)) {
            let mut watch = InstanceWatch::new();
            watch.begin();

            let actions: Vec<_> = states.iter().map(|s| watch.observe(*s)).collect();
            let sends = actions.iter().filter(|a| **a == WatchAction::SendControl).count();

            // Any state other than installing ends the watch
            let first_installed = states.iter().position(|s| *s == WorkerState::Installed);
            let first_other = states
                .iter()
                .position(|s| !matches!(s, WorkerState::Installing | WorkerState::Installed));
            let expected = match (first_installed, first_other) {
                (Some(i), Some(o)) => usize::from(i < o),
                (Some(_), None) => 1,
                (None, _) => 0,
            };
            prop_assert_eq!(sends, expected);

            if let Some(i) = first_installed {
                if sends == 1 {
                    prop_assert_eq!(actions[i], WatchAction::SendControl);
                }
            }
        }
    }
}
