//! Simulated registration capability and controller link

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast, watch};
use tracing::debug;

use super::NOTIFICATION_CAPACITY;
use super::registration::SimRegistration;
use super::worker::SimWorker;
use crate::domain::WorkerState;
use crate::host::{HostError, Registration, WorkerContainer};

/// In-memory worker container
///
/// Registration always resolves to the same [`SimRegistration`], unless the
/// container was built to fail.
pub struct SimContainer {
    registration: Arc<SimRegistration>,
    controller: watch::Sender<Option<Arc<SimWorker>>>,
    controller_change: broadcast::Sender<()>,
    failure: Option<HostError>,
    registered: Mutex<Vec<String>>,
}

impl SimContainer {
    fn build(controller: Option<Arc<SimWorker>>, failure: Option<HostError>) -> Arc<Self> {
        let registration = SimRegistration::new();
        if let Some(worker) = &controller {
            registration.set_active(Some(worker));
        }
        let (controller_change, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Arc::new(Self {
            registration,
            controller: watch::channel(controller).0,
            controller_change,
            failure,
            registered: Mutex::new(Vec::new()),
        })
    }

    /// Nothing controls the page yet (first visit)
    pub fn new() -> Arc<Self> {
        debug!("SimContainer::new: called");
        Self::build(None, None)
    }

    /// An active worker already controls the page
    pub fn with_controller() -> Arc<Self> {
        debug!("SimContainer::with_controller: called");
        Self::build(Some(SimWorker::new(WorkerState::Active)), None)
    }

    /// Registration rejects with `error`; an active controller is present
    pub fn failing(error: HostError) -> Arc<Self> {
        debug!(%error, "SimContainer::failing: called");
        Self::build(Some(SimWorker::new(WorkerState::Active)), Some(error))
    }

    pub fn registration(&self) -> Arc<SimRegistration> {
        self.registration.clone()
    }

    pub fn controller(&self) -> Option<Arc<SimWorker>> {
        self.controller.borrow().clone()
    }

    /// Hand control to `worker` the way a host does after skip-waiting
    ///
    /// activating → controller set → controller-change fired → active
    pub fn claim(&self, worker: &Arc<SimWorker>) {
        debug!("SimContainer::claim: called");
        worker.transition(WorkerState::Activating);
        if let Some(previous) = self.controller.send_replace(Some(worker.clone())) {
            if !Arc::ptr_eq(&previous, worker) {
                previous.transition(WorkerState::Redundant);
            }
        }
        self.registration.activate(worker);
        self.fire_controller_change();
        worker.transition(WorkerState::Active);
    }

    pub fn fire_controller_change(&self) {
        let _ = self.controller_change.send(());
    }

    /// Script URLs passed to `register`, in call order
    pub async fn registered_urls(&self) -> Vec<String> {
        self.registered.lock().await.clone()
    }
}

#[async_trait]
impl WorkerContainer for SimContainer {
    async fn register(&self, script_url: &str) -> Result<Arc<dyn Registration>, HostError> {
        debug!(%script_url, "SimContainer::register: called");
        tokio::task::yield_now().await;
        self.registered.lock().await.push(script_url.to_string());

        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(self.registration.clone()),
        }
    }

    fn has_controller(&self) -> bool {
        self.controller.borrow().is_some()
    }

    fn controller_changes(&self) -> broadcast::Receiver<()> {
        self.controller_change.subscribe()
    }
}
