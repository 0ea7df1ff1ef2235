//! Coordinator error types

use thiserror::Error;

use crate::host::HostError;

/// Errors the update coordinator can run into
///
/// None of these escape `register_and_watch`: they are logged, published on
/// the event bus, and folded into the returned [`crate::Coordination`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    #[error("Worker registration capability unavailable")]
    CapabilityUnavailable,

    #[error("Failed to register worker script {script_url}: {source}")]
    RegistrationFailed {
        script_url: String,
        #[source]
        source: HostError,
    },

    #[error("Failed to post control message: {source}")]
    PostMessage {
        #[source]
        source: HostError,
    },

    #[error("Notification stream closed: {0}")]
    NotificationClosed(&'static str),
}

impl CoordinatorError {
    /// Unsupported hosts are an expected outcome, not a fault
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            CoordinatorError::CapabilityUnavailable
                | CoordinatorError::RegistrationFailed {
                    source: HostError::NotSupported,
                    ..
                }
        )
    }
}
