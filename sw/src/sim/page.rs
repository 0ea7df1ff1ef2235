//! Simulated page

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, info};

use super::container::SimContainer;
use crate::host::{Page, WorkerContainer};

/// Page that counts reloads instead of performing them
pub struct SimPage {
    container: Option<Arc<SimContainer>>,
    reloads: AtomicUsize,
}

impl SimPage {
    pub fn new(container: Arc<SimContainer>) -> Arc<Self> {
        Arc::new(Self {
            container: Some(container),
            reloads: AtomicUsize::new(0),
        })
    }

    /// A host without worker registration
    pub fn unsupported() -> Arc<Self> {
        debug!("SimPage::unsupported: called");
        Arc::new(Self {
            container: None,
            reloads: AtomicUsize::new(0),
        })
    }

    pub fn container(&self) -> Option<Arc<SimContainer>> {
        self.container.clone()
    }

    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

impl Page for SimPage {
    fn worker_container(&self) -> Option<Arc<dyn WorkerContainer>> {
        self.container
            .clone()
            .map(|container| container as Arc<dyn WorkerContainer>)
    }

    fn reload(&self) {
        let count = self.reloads.fetch_add(1, Ordering::SeqCst) + 1;
        info!(count, "SimPage::reload: page reloaded");
    }
}
