//! Outcome of `register_and_watch` and the live session it may start

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::CoordinatorError;

/// What `register_and_watch` ended up doing
#[derive(Debug)]
pub enum Coordination {
    /// Host has no registration capability; nothing was attempted
    Unsupported,
    /// Registered, but nothing controlled the page: first install
    FreshInstall,
    /// Registration failed; coordination is off for this session
    Failed(CoordinatorError),
    /// An update is being coordinated
    Watching(UpdateSession),
}

impl Coordination {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unsupported => "unsupported",
            Self::FreshInstall => "fresh-install",
            Self::Failed(_) => "failed",
            Self::Watching(_) => "watching",
        }
    }

    pub fn is_watching(&self) -> bool {
        matches!(self, Self::Watching(_))
    }

    /// Take the session out, if one was started
    pub fn into_session(self) -> Option<UpdateSession> {
        match self {
            Self::Watching(session) => Some(session),
            _ => None,
        }
    }
}

/// One-shot latch shared by the reload listener and the session
#[derive(Debug, Clone, Default)]
pub(crate) struct ReloadLatch(Arc<AtomicBool>);

impl ReloadLatch {
    /// True exactly once, for the first caller
    pub(crate) fn trip(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn is_tripped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Live update coordination for one page session
///
/// Owns the background tasks: the controller-change listener, instance
/// watchers and the update-found listener. Dropping the session leaves them
/// running until the page goes away; `close` tears them down explicitly.
#[derive(Debug)]
pub struct UpdateSession {
    reload_task: JoinHandle<()>,
    tasks: Vec<JoinHandle<()>>,
    latch: ReloadLatch,
}

impl UpdateSession {
    pub(crate) fn new(reload_task: JoinHandle<()>, tasks: Vec<JoinHandle<()>>, latch: ReloadLatch) -> Self {
        debug!(task_count = tasks.len(), "UpdateSession::new: called");
        Self {
            reload_task,
            tasks,
            latch,
        }
    }

    /// Whether this session has reloaded the page
    pub fn reloaded(&self) -> bool {
        self.latch.is_tripped()
    }

    /// Number of background tasks besides the reload listener
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Wait until the controller-change listener finishes, then tear down the rest
    ///
    /// Returns whether the page was reloaded.
    pub async fn settled(mut self) -> bool {
        debug!("UpdateSession::settled: called");
        if let Err(e) = (&mut self.reload_task).await {
            debug!(error = %e, "UpdateSession::settled: reload listener did not complete");
        }
        let reloaded = self.reloaded();
        self.close();
        reloaded
    }

    /// Like `settled`, but gives up after `limit`
    ///
    /// Returns `None` and closes the session when no controller change arrives
    /// in time.
    pub async fn settled_within(mut self, limit: Duration) -> Option<bool> {
        debug!(?limit, "UpdateSession::settled_within: called");
        match tokio::time::timeout(limit, &mut self.reload_task).await {
            Ok(joined) => {
                if let Err(e) = joined {
                    debug!(error = %e, "UpdateSession::settled_within: reload listener did not complete");
                }
                let reloaded = self.reloaded();
                self.close();
                Some(reloaded)
            }
            Err(_) => {
                debug!("UpdateSession::settled_within: timed out");
                self.close();
                None
            }
        }
    }

    /// Abort every background task
    pub fn close(self) {
        debug!("UpdateSession::close: called");
        self.reload_task.abort();
        for task in self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latch_trips_once() {
        let latch = ReloadLatch::default();
        let shared = latch.clone();

        assert!(!latch.is_tripped());
        assert!(latch.trip());
        assert!(!shared.trip());
        assert!(shared.is_tripped());
    }

    #[test]
    fn test_coordination_labels() {
        assert_eq!(Coordination::Unsupported.label(), "unsupported");
        assert_eq!(Coordination::FreshInstall.label(), "fresh-install");
        assert!(!Coordination::FreshInstall.is_watching());
        assert!(
            Coordination::Failed(CoordinatorError::CapabilityUnavailable)
                .into_session()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_settled_aborts_remaining_tasks() {
        let latch = ReloadLatch::default();
        let reload_latch = latch.clone();
        let reload_task = tokio::spawn(async move {
            reload_latch.trip();
        });
        let pending = tokio::spawn(std::future::pending::<()>());

        let session = UpdateSession::new(reload_task, vec![pending], latch);
        assert_eq!(session.task_count(), 1);
        assert!(session.settled().await);
    }

    #[tokio::test]
    async fn test_close_without_reload() {
        let latch = ReloadLatch::default();
        let reload_task = tokio::spawn(std::future::pending::<()>());
        let session = UpdateSession::new(reload_task, Vec::new(), latch.clone());

        assert!(!session.reloaded());
        session.close();
        assert!(!latch.is_tripped());
    }

    #[tokio::test]
    async fn test_settled_within_times_out() {
        let latch = ReloadLatch::default();
        let reload_task = tokio::spawn(std::future::pending::<()>());
        let session = UpdateSession::new(reload_task, Vec::new(), latch);

        assert_eq!(session.settled_within(Duration::from_millis(20)).await, None);
    }
}
