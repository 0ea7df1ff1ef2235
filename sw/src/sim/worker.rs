//! Simulated worker instance

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast, watch};
use tracing::debug;

use super::NOTIFICATION_CAPACITY;
use crate::domain::{ControlMessage, WorkerState};
use crate::host::{HostError, WorkerInstance};

/// In-memory worker whose lifecycle is driven by the caller
pub struct SimWorker {
    state: watch::Sender<WorkerState>,
    changes: broadcast::Sender<WorkerState>,
    messages: Mutex<Vec<ControlMessage>>,
    fail_messages: AtomicBool,
}

impl SimWorker {
    pub fn new(state: WorkerState) -> Arc<Self> {
        debug!(%state, "SimWorker::new: called");
        let (state, _) = watch::channel(state);
        let (changes, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Arc::new(Self {
            state,
            changes,
            messages: Mutex::new(Vec::new()),
            fail_messages: AtomicBool::new(false),
        })
    }

    /// Set the state and fire a state-change notification carrying it
    ///
    /// Fires even when the state is unchanged, the way a host may deliver
    /// redundant notifications. The notification is sent under the state
    /// lock so `state_changes` never splits a transition from its event.
    pub fn transition(&self, state: WorkerState) {
        self.state.send_modify(|current| {
            debug!(previous = %current, %state, "SimWorker::transition: called");
            *current = state;
            let _ = self.changes.send(state);
        });
    }

    /// Make `post_message` fail from now on
    pub fn fail_messages(&self, fail: bool) {
        self.fail_messages.store(fail, Ordering::SeqCst);
    }

    /// Every message delivered so far
    pub async fn messages(&self) -> Vec<ControlMessage> {
        self.messages.lock().await.clone()
    }
}

#[async_trait]
impl WorkerInstance for SimWorker {
    fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    fn state_changes(&self) -> (WorkerState, broadcast::Receiver<WorkerState>) {
        let current = self.state.borrow();
        (*current, self.changes.subscribe())
    }

    async fn post_message(&self, message: &ControlMessage) -> Result<(), HostError> {
        debug!(?message, "SimWorker::post_message: called");
        if self.fail_messages.load(Ordering::SeqCst) {
            return Err(HostError::Messaging("worker is not accepting messages".to_string()));
        }
        self.messages.lock().await.push(*message);
        Ok(())
    }
}
