//! swupdate - background worker update coordinator
//!
//! A page runs alongside a background worker that can be updated. When a new
//! version of the worker appears, the page has to tell it to take over and
//! then reload once control has moved. This crate is that coordinator.
//!
//! # Core Concepts
//!
//! - **Updates only**: with no controller at registration time nothing is sent
//!   and nothing reloads
//! - **One message per instance**: a guarded state machine absorbs duplicate
//!   lifecycle notifications
//! - **One reload per session**: the reload follows the controller-change
//!   notification, never precedes it
//! - **Best effort**: an unsupported host or failed registration leaves the
//!   page working
//!
//! # Modules
//!
//! - [`coordinator`] - `UpdateCoordinator`, the watch state machine, sessions
//! - [`host`] - traits for the worker runtime, registration and page
//! - [`sim`] - in-memory host used by tests and the `swu` CLI
//! - [`events`] - event bus for coordinator activity
//! - [`scenario`] - scripted coordinator runs
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod events;
pub mod host;
pub mod scenario;
pub mod sim;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::{
    Coordination, CoordinatorConfig, InstanceWatch, UpdateCoordinator, UpdateSession, WatchAction, WatchPhase,
};
pub use domain::{ControlMessage, Discovery, WorkerState};
pub use error::CoordinatorError;
pub use events::{CoordinatorEvent, EventBus, EventEmitter, create_event_bus};
pub use host::{HostError, Page, Registration, WorkerContainer, WorkerInstance};
pub use scenario::{Scenario, ScenarioReport};
pub use sim::{SimContainer, SimPage, SimRegistration, SimWorker};
