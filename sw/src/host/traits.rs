//! Capabilities the hosting environment provides to the coordinator
//!
//! Every notification is a `tokio::sync::broadcast` stream. Slot and controller
//! notifications are `()` and the listener re-reads the current value after
//! each one. State changes carry the state entered, so a transient state is
//! never folded into a later read. The host may deliver redundant
//! notifications.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::HostError;
use crate::domain::{ControlMessage, WorkerState};

/// One version of the background worker
///
/// Instances are created and destroyed by the host. The coordinator only
/// reads their state and posts to them.
#[async_trait]
pub trait WorkerInstance: Send + Sync {
    /// Current lifecycle state
    fn state(&self) -> WorkerState;

    /// Current state plus a stream of every later state change
    ///
    /// The snapshot and the subscription are taken together: no transition
    /// falls between them. Each notification carries the state entered.
    fn state_changes(&self) -> (WorkerState, broadcast::Receiver<WorkerState>);

    /// Deliver a message to the worker
    async fn post_message(&self, message: &ControlMessage) -> Result<(), HostError>;
}

/// Result of registering a worker script
///
/// The three slots are views supplied by the host; at most one instance
/// occupies each.
pub trait Registration: Send + Sync {
    fn installing(&self) -> Option<Arc<dyn WorkerInstance>>;

    fn waiting(&self) -> Option<Arc<dyn WorkerInstance>>;

    fn active(&self) -> Option<Arc<dyn WorkerInstance>>;

    /// Subscribe to update-found notifications (a new instance entered `installing`)
    fn update_found(&self) -> broadcast::Receiver<()>;
}

/// The page's worker registration capability and controller link
#[async_trait]
pub trait WorkerContainer: Send + Sync {
    /// Register (or re-register) the worker script at `script_url`
    async fn register(&self, script_url: &str) -> Result<Arc<dyn Registration>, HostError>;

    /// Whether an instance currently controls the page
    fn has_controller(&self) -> bool;

    /// Subscribe to controller-change notifications
    fn controller_changes(&self) -> broadcast::Receiver<()>;
}

/// The page hosting the coordinator
pub trait Page: Send + Sync {
    /// The registration capability, or `None` when the host has none
    fn worker_container(&self) -> Option<Arc<dyn WorkerContainer>>;

    /// Force a full page reload
    fn reload(&self);
}
