//! Host error types

use thiserror::Error;

/// Errors reported by the hosting environment
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("Worker registration is not supported")]
    NotSupported,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Message delivery failed: {0}")]
    Messaging(String),
}
