//! In-memory host environment
//!
//! Implements every [`crate::host`] trait so the coordinator can run without a
//! real worker runtime. The caller drives the lifecycle: announce an update,
//! move the instance through its states, hand control over.
//!
//! ```rust,ignore
//! let container = SimContainer::with_controller();
//! let page = SimPage::new(container.clone());
//! let worker = SimWorker::new(WorkerState::Installing);
//! container.registration().announce_update(&worker);
//! worker.transition(WorkerState::Installed);
//! container.claim(&worker);
//! ```

mod container;
mod page;
mod registration;
mod worker;

pub use container::SimContainer;
pub use page::SimPage;
pub use registration::SimRegistration;
pub use worker::SimWorker;

/// Buffer for simulated host notifications
pub const NOTIFICATION_CAPACITY: usize = 16;
