//! Simulated registration slots

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::debug;

use super::NOTIFICATION_CAPACITY;
use super::worker::SimWorker;
use crate::domain::WorkerState;
use crate::host::{Registration, WorkerInstance};

type Slot = watch::Sender<Option<Arc<SimWorker>>>;

fn empty_slot() -> Slot {
    watch::channel(None).0
}

fn read_slot(slot: &Slot) -> Option<Arc<dyn WorkerInstance>> {
    slot.borrow().clone().map(|worker| worker as Arc<dyn WorkerInstance>)
}

fn holds(slot: &Slot, worker: &Arc<SimWorker>) -> bool {
    slot.borrow().as_ref().is_some_and(|current| Arc::ptr_eq(current, worker))
}

/// In-memory registration with caller-controlled slots
pub struct SimRegistration {
    installing: Slot,
    waiting: Slot,
    active: Slot,
    update_found: broadcast::Sender<()>,
}

impl SimRegistration {
    pub fn new() -> Arc<Self> {
        debug!("SimRegistration::new: called");
        let (update_found, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Arc::new(Self {
            installing: empty_slot(),
            waiting: empty_slot(),
            active: empty_slot(),
            update_found,
        })
    }

    pub fn set_installing(&self, worker: Option<&Arc<SimWorker>>) {
        self.installing.send_replace(worker.cloned());
    }

    pub fn set_waiting(&self, worker: Option<&Arc<SimWorker>>) {
        self.waiting.send_replace(worker.cloned());
    }

    pub fn set_active(&self, worker: Option<&Arc<SimWorker>>) {
        self.active.send_replace(worker.cloned());
    }

    /// Put `worker` in the installing slot and fire update-found
    pub fn announce_update(&self, worker: &Arc<SimWorker>) {
        debug!("SimRegistration::announce_update: called");
        self.set_installing(Some(worker));
        self.fire_update_found();
    }

    /// Move `worker` from installing to waiting and mark it installed
    pub fn finish_install(&self, worker: &Arc<SimWorker>) {
        debug!("SimRegistration::finish_install: called");
        if holds(&self.installing, worker) {
            self.set_installing(None);
        }
        self.set_waiting(Some(worker));
        worker.transition(WorkerState::Installed);
    }

    /// Make `worker` the active instance, clearing it from the other slots
    pub(crate) fn activate(&self, worker: &Arc<SimWorker>) {
        debug!("SimRegistration::activate: called");
        if holds(&self.waiting, worker) {
            self.set_waiting(None);
        }
        if holds(&self.installing, worker) {
            self.set_installing(None);
        }
        self.set_active(Some(worker));
    }

    pub fn fire_update_found(&self) {
        let _ = self.update_found.send(());
    }
}

impl Registration for SimRegistration {
    fn installing(&self) -> Option<Arc<dyn WorkerInstance>> {
        read_slot(&self.installing)
    }

    fn waiting(&self) -> Option<Arc<dyn WorkerInstance>> {
        read_slot(&self.waiting)
    }

    fn active(&self) -> Option<Arc<dyn WorkerInstance>> {
        read_slot(&self.active)
    }

    fn update_found(&self) -> broadcast::Receiver<()> {
        self.update_found.subscribe()
    }
}
