//! Host environment seams
//!
//! The worker runtime, the registration slots and the page controller link are
//! external collaborators. The coordinator talks to them only through these
//! traits; [`crate::sim`] provides an in-memory implementation.

mod error;
mod traits;

pub use error::HostError;
pub use traits::{Page, Registration, WorkerContainer, WorkerInstance};
