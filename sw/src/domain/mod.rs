//! Domain types shared by the coordinator, the host traits and the simulator

mod message;
mod state;

pub use message::ControlMessage;
pub use state::{Discovery, WorkerState};
