//! Update coordinator
//!
//! Registers the worker script, finds a newer instance, waits for it to reach
//! `installed`, posts the take-over message and reloads the page once control
//! has moved.
//!
//! ```text
//! register ─► controller? ─no─► FreshInstall
//!                 │yes
//!                 ▼
//!   waiting? ─► installing? ─► update-found ─► watch(installing)
//!       │            │                              │
//!       └────────────┴──────► watch(instance) ◄─────┘
//!                                  │ installed
//!                                  ▼
//!                       post {updateServiceWorker: true}
//!                                  │
//!                     controllerchange ─► reload (once)
//! ```

mod config;
mod core;
mod session;
mod watch;

pub use config::CoordinatorConfig;
pub use self::core::UpdateCoordinator;
pub use session::{Coordination, UpdateSession};
pub use watch::{InstanceWatch, WatchAction, WatchPhase};
