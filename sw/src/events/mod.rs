//! Event bus for coordinator observability
//!
//! Every step the coordinator takes emits a [`CoordinatorEvent`]. Consumers
//! (the `swu` trace printer, tests) subscribe to the bus.
//!
//! ```text
//!   register_and_watch ──► EventEmitter ──► EventBus (broadcast)
//!   instance watchers  ──►                     │
//!   reload listener    ──►                     ├──► CLI trace
//!                                              └──► tests
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use swupdate::events::EventBus;
//!
//! let bus = EventBus::with_default_capacity();
//! let mut rx = bus.subscribe();
//! bus.emitter_for("sw.js").fresh_install();
//! let event = rx.recv().await?;
//! ```

mod bus;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventEmitter, create_event_bus};
pub use types::CoordinatorEvent;
