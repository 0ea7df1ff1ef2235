//! Update coordinator task flow

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::config::CoordinatorConfig;
use super::session::{Coordination, ReloadLatch, UpdateSession};
use super::watch::{InstanceWatch, WatchAction, WatchPhase};
use crate::domain::{ControlMessage, Discovery};
use crate::error::CoordinatorError;
use crate::events::{CoordinatorEvent, EventBus, EventEmitter};
use crate::host::{Page, Registration, WorkerInstance};

/// Registers the worker script and hands control to newer versions
///
/// The flow has two suspension points: registration completing, and a watched
/// instance reaching `installed`. Everything else is bookkeeping.
pub struct UpdateCoordinator {
    config: CoordinatorConfig,
    page: Arc<dyn Page>,
    bus: Arc<EventBus>,
}

impl UpdateCoordinator {
    /// Create a coordinator with its own event bus
    pub fn new(page: Arc<dyn Page>, config: CoordinatorConfig) -> Self {
        let bus = Arc::new(EventBus::new(config.event_capacity));
        Self::with_event_bus(page, config, bus)
    }

    /// Create a coordinator that publishes on an existing bus
    pub fn with_event_bus(page: Arc<dyn Page>, config: CoordinatorConfig, bus: Arc<EventBus>) -> Self {
        debug!(script_url = %config.script_url, rearm = config.rearm_on_update, "UpdateCoordinator::new: called");
        Self { config, page, bus }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    /// Subscribe to coordinator events
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.bus.subscribe()
    }

    /// Register the configured script
    pub async fn start(&self) -> Coordination {
        let script_url = self.config.script_url.clone();
        self.register_and_watch(&script_url).await
    }

    /// Register `script_url` and, when this is an update, coordinate the hand-off
    ///
    /// Never fails: an unsupported host or a rejected registration is reported
    /// through the returned [`Coordination`] and the event bus.
    pub async fn register_and_watch(&self, script_url: &str) -> Coordination {
        debug!(%script_url, "UpdateCoordinator::register_and_watch: called");
        let emitter = self.bus.emitter_for(script_url);

        let Some(container) = self.page.worker_container() else {
            let err = CoordinatorError::CapabilityUnavailable;
            debug!(error = %err, %script_url, "register_and_watch: skipping registration");
            emitter.unsupported();
            return Coordination::Unsupported;
        };

        // Subscribed ahead of registration so a fast hand-off is not missed
        let controller_changes = container.controller_changes();

        let registration = match container.register(script_url).await {
            Ok(registration) => registration,
            Err(source) => {
                let err = CoordinatorError::RegistrationFailed {
                    script_url: script_url.to_string(),
                    source,
                };
                if err.is_expected() {
                    info!(error = %err, "Worker registration not supported here, update coordination disabled");
                } else {
                    warn!(error = %err, "Worker registration failed, update coordination disabled");
                }
                emitter.registration_failed(&err.to_string());
                return Coordination::Failed(err);
            }
        };

        let has_controller = container.has_controller();
        info!(%script_url, has_controller, "Worker registered");
        emitter.registered(has_controller);

        if !has_controller {
            debug!("register_and_watch: no controller, first install");
            emitter.fresh_install();
            return Coordination::FreshInstall;
        }

        let latch = ReloadLatch::default();
        let reload_task = tokio::spawn(listen_for_controller_change(
            controller_changes,
            self.page.clone(),
            latch.clone(),
            emitter.clone(),
        ));

        let update_found = registration.update_found();
        let found = registration
            .waiting()
            .map(|instance| (Discovery::Waiting, instance))
            .or_else(|| registration.installing().map(|instance| (Discovery::Installing, instance)));

        let mut tasks = Vec::new();
        let mut last_watched = None;
        let listen_for_updates = match found {
            Some((discovery, instance)) => {
                debug!(%discovery, "register_and_watch: watching pre-populated slot");
                last_watched = Some(instance.clone());
                let watcher_emitter = emitter.clone();
                tasks.push(tokio::spawn(async move {
                    watch_instance(instance, discovery, watcher_emitter).await;
                }));
                self.config.rearm_on_update
            }
            None => {
                debug!("register_and_watch: slots empty, waiting for update-found");
                true
            }
        };

        if listen_for_updates {
            tasks.push(tokio::spawn(listen_for_new_instances(
                registration,
                update_found,
                self.config.rearm_on_update,
                last_watched,
                emitter,
            )));
        }

        Coordination::Watching(UpdateSession::new(reload_task, tasks, latch))
    }
}

/// Watch one instance until its watch reaches a terminal phase
async fn watch_instance(instance: Arc<dyn WorkerInstance>, discovery: Discovery, emitter: EventEmitter) -> WatchPhase {
    let mut watch = InstanceWatch::new();
    watch.begin();

    let (mut state, mut changes) = instance.state_changes();
    debug!(%discovery, %state, "watch_instance: started");
    emitter.watch_started(discovery, state);

    loop {
        match watch.observe(state) {
            WatchAction::SendControl => {
                send_control(instance.as_ref(), discovery, &emitter).await;
                break;
            }
            WatchAction::Abandon => {
                info!(%discovery, "Watched worker went redundant before installing");
                emitter.watch_abandoned(discovery);
                break;
            }
            WatchAction::Release => {
                info!(%discovery, %state, "Watched worker already past installed, nothing to send");
                emitter.watch_bypassed(discovery, state);
                break;
            }
            WatchAction::Wait => {}
            WatchAction::Duplicate | WatchAction::Inactive => break,
        }

        state = match changes.recv().await {
            Ok(next) => next,
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "watch_instance: lagged, re-reading state");
                instance.state()
            }
            Err(RecvError::Closed) => {
                let err = CoordinatorError::NotificationClosed("statechange");
                debug!(error = %err, %discovery, "watch_instance: stopping");
                break;
            }
        };
        emitter.state_observed(discovery, state);
    }

    debug!(phase = ?watch.phase(), "watch_instance: finished");
    watch.phase()
}

async fn send_control(instance: &dyn WorkerInstance, discovery: Discovery, emitter: &EventEmitter) {
    debug!(%discovery, "send_control: called");
    match instance.post_message(&ControlMessage::take_over()).await {
        Ok(()) => {
            info!(%discovery, "Sent take-over message to installed worker");
            emitter.control_message_sent(discovery);
        }
        Err(source) => {
            let err = CoordinatorError::PostMessage { source };
            warn!(error = %err, %discovery, "Take-over message not delivered");
            emitter.control_message_failed(discovery, &err.to_string());
        }
    }
}

/// Watch the installing slot each time the registration reports an update
async fn listen_for_new_instances(
    registration: Arc<dyn Registration>,
    mut update_found: broadcast::Receiver<()>,
    rearm: bool,
    mut last_watched: Option<Arc<dyn WorkerInstance>>,
    emitter: EventEmitter,
) {
    debug!(rearm, "listen_for_new_instances: called");
    let mut watchers = JoinSet::new();

    loop {
        tokio::select! {
            notified = update_found.recv() => {
                match notified {
                    Ok(()) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "listen_for_new_instances: lagged, checking installing slot");
                    }
                    Err(RecvError::Closed) => {
                        let err = CoordinatorError::NotificationClosed("updatefound");
                        debug!(error = %err, "listen_for_new_instances: stopping");
                        break;
                    }
                }

                let Some(instance) = registration.installing() else {
                    debug!("listen_for_new_instances: update found but installing slot is empty");
                    continue;
                };
                if last_watched.as_ref().is_some_and(|prev| Arc::ptr_eq(prev, &instance)) {
                    debug!("listen_for_new_instances: instance already watched");
                    continue;
                }

                info!("Update found, watching new worker");
                last_watched = Some(instance.clone());
                watchers.spawn(watch_instance(instance, Discovery::UpdateFound, emitter.clone()));

                if !rearm {
                    debug!("listen_for_new_instances: one-shot listener done");
                    break;
                }
            }
            Some(joined) = watchers.join_next() => {
                match joined {
                    Ok(phase) => debug!(?phase, "listen_for_new_instances: watcher finished"),
                    Err(e) => debug!(error = %e, "listen_for_new_instances: watcher did not complete"),
                }
            }
        }
    }

    while let Some(joined) = watchers.join_next().await {
        if let Ok(phase) = joined {
            debug!(?phase, "listen_for_new_instances: watcher finished");
        }
    }
}

/// Reload the page once, after control has moved to the new instance
async fn listen_for_controller_change(
    mut changes: broadcast::Receiver<()>,
    page: Arc<dyn Page>,
    latch: ReloadLatch,
    emitter: EventEmitter,
) {
    debug!("listen_for_controller_change: called");
    match changes.recv().await {
        Ok(()) | Err(RecvError::Lagged(_)) => {
            if latch.trip() {
                info!("Controller changed, reloading page");
                page.reload();
                emitter.reloaded();
            } else {
                debug!("listen_for_controller_change: page already reloaded");
                emitter.reload_suppressed();
            }
        }
        Err(RecvError::Closed) => {
            let err = CoordinatorError::NotificationClosed("controllerchange");
            debug!(error = %err, "listen_for_controller_change: stopping");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WorkerState;
    use crate::host::WorkerContainer;
    use crate::host::HostError;
    use crate::sim::{SimContainer, SimPage, SimWorker};
    use proptest::prelude::*;
    use std::time::Duration;

    const QUIET: Duration = Duration::from_millis(50);

    /// Monotonic lifecycles: each stage repeated 0..=3 times, cut short, then maybe redundant
    fn lifecycle() -> impl Strategy<Value = Vec<WorkerState>> {
        (prop::collection::vec(0usize..=3, 4), 0usize..=4, 0usize..=2).prop_map(|(repeats, cut, redundant)| {
            let stages = [
                WorkerState::Installing,
                WorkerState::Installed,
                WorkerState::Activating,
                WorkerState::Active,
            ];
            let mut states = Vec::new();
            for (stage, times) in stages.iter().zip(&repeats).take(cut) {
                states.extend(std::iter::repeat_n(*stage, *times));
            }
            states.extend(std::iter::repeat_n(WorkerState::Redundant, redundant));
            states
        })
    }

    /// Drive `watch_instance` with every transition fired before it runs again
    async fn run_watcher(states: &[WorkerState]) -> (usize, bool) {
        let worker = SimWorker::new(WorkerState::Installing);
        let bus = EventBus::new(64);
        let task = tokio::spawn(watch_instance(
            worker.clone(),
            Discovery::UpdateFound,
            bus.emitter_for("sw.js"),
        ));
        tokio::task::yield_now().await;

        for state in states {
            worker.transition(*state);
        }
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }

        let finished = task.is_finished();
        task.abort();
        (worker.messages().await.len(), finished)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_watcher_sends_once_for_any_lifecycle(states in lifecycle()) {
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let (messages, finished) = runtime.block_on(run_watcher(&states));

            let saw_installed = states.contains(&WorkerState::Installed);
            let moved_on = states.iter().any(|s| *s != WorkerState::Installing);
            prop_assert_eq!(messages, usize::from(saw_installed));
            prop_assert_eq!(finished, moved_on);
        }
    }

    #[tokio::test]
    async fn test_watch_instance_sees_installed_between_back_to_back_transitions() {
        let worker = SimWorker::new(WorkerState::Installing);
        let bus = EventBus::new(64);
        let task = tokio::spawn(watch_instance(
            worker.clone(),
            Discovery::UpdateFound,
            bus.emitter_for("sw.js"),
        ));
        tokio::task::yield_now().await;

        worker.transition(WorkerState::Installed);
        worker.transition(WorkerState::Activating);

        let phase = tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
        assert_eq!(phase, WatchPhase::Notified);
        assert_eq!(worker.messages().await, vec![ControlMessage::take_over()]);
    }

    #[tokio::test]
    async fn test_watch_instance_releases_instance_already_active() {
        let worker = SimWorker::new(WorkerState::Active);
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let phase = tokio::time::timeout(
            Duration::from_secs(1),
            watch_instance(worker.clone(), Discovery::Waiting, bus.emitter_for("sw.js")),
        )
        .await
        .unwrap();

        assert_eq!(phase, WatchPhase::Bypassed);
        assert!(worker.messages().await.is_empty());
        assert_eq!(rx.recv().await.unwrap().event_type(), "WatchStarted");
        assert_eq!(rx.recv().await.unwrap().event_type(), "WatchBypassed");
    }

    #[tokio::test]
    async fn test_unsupported_registration_is_an_expected_failure() {
        let container = SimContainer::failing(HostError::NotSupported);
        let coordinator = UpdateCoordinator::new(SimPage::new(container), CoordinatorConfig::default());

        match coordinator.register_and_watch("sw.js").await {
            Coordination::Failed(err) => {
                assert!(err.is_expected());
                assert!(matches!(
                    err,
                    CoordinatorError::RegistrationFailed {
                        source: HostError::NotSupported,
                        ..
                    }
                ));
            }
            other => panic!("Expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_watch_instance_already_installed_sends_without_listening() {
        let worker = SimWorker::new(WorkerState::Installed);
        let bus = EventBus::new(16);

        let phase = watch_instance(worker.clone(), Discovery::Waiting, bus.emitter_for("sw.js")).await;

        assert_eq!(phase, WatchPhase::Notified);
        assert_eq!(worker.messages().await, vec![ControlMessage::take_over()]);
    }

    #[tokio::test]
    async fn test_watch_instance_absorbs_duplicate_installed() {
        let worker = SimWorker::new(WorkerState::Installing);
        let bus = EventBus::new(64);
        let task = tokio::spawn(watch_instance(
            worker.clone(),
            Discovery::UpdateFound,
            bus.emitter_for("sw.js"),
        ));
        tokio::task::yield_now().await;

        worker.transition(WorkerState::Installed);
        worker.transition(WorkerState::Installed);
        worker.transition(WorkerState::Installed);

        assert_eq!(task.await.unwrap(), WatchPhase::Notified);
        assert_eq!(worker.messages().await.len(), 1);
    }

    #[tokio::test]
    async fn test_watch_instance_post_failure_is_reported() {
        let worker = SimWorker::new(WorkerState::Installed);
        worker.fail_messages(true);
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let phase = watch_instance(worker.clone(), Discovery::Waiting, bus.emitter_for("sw.js")).await;

        assert_eq!(phase, WatchPhase::Notified);
        assert_eq!(rx.recv().await.unwrap().event_type(), "WatchStarted");
        assert_eq!(rx.recv().await.unwrap().event_type(), "ControlMessageFailed");
    }

    #[tokio::test]
    async fn test_controller_change_listener_reloads_once() {
        let container = SimContainer::with_controller();
        let page = SimPage::new(container.clone());
        let latch = ReloadLatch::default();
        let bus = EventBus::new(16);

        let first = tokio::spawn(listen_for_controller_change(
            container.controller_changes(),
            page.clone(),
            latch.clone(),
            bus.emitter_for("sw.js"),
        ));
        let second = tokio::spawn(listen_for_controller_change(
            container.controller_changes(),
            page.clone(),
            latch.clone(),
            bus.emitter_for("sw.js"),
        ));
        tokio::task::yield_now().await;

        container.fire_controller_change();
        first.await.unwrap();
        second.await.unwrap();

        assert_eq!(page.reload_count(), 1);
        assert!(latch.is_tripped());
    }

    #[tokio::test]
    async fn test_controller_change_after_reload_is_suppressed() {
        let container = SimContainer::with_controller();
        let page = SimPage::new(container.clone());
        let latch = ReloadLatch::default();
        latch.trip();
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let listener = tokio::spawn(listen_for_controller_change(
            container.controller_changes(),
            page.clone(),
            latch,
            bus.emitter_for("sw.js"),
        ));
        tokio::task::yield_now().await;

        container.fire_controller_change();
        listener.await.unwrap();

        assert_eq!(page.reload_count(), 0);
        assert_eq!(rx.recv().await.unwrap().event_type(), "ReloadSuppressed");
    }

    #[tokio::test]
    async fn test_watch_instance_recovers_from_lagged_notifications() {
        let worker = SimWorker::new(WorkerState::Installing);
        let bus = EventBus::new(256);
        let task = tokio::spawn(watch_instance(
            worker.clone(),
            Discovery::UpdateFound,
            bus.emitter_for("sw.js"),
        ));
        tokio::task::yield_now().await;

        // Overflow the notification buffer before the watcher runs again
        for _ in 0..(crate::sim::NOTIFICATION_CAPACITY * 3) {
            worker.transition(WorkerState::Installing);
        }
        worker.transition(WorkerState::Installed);

        let phase = tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
        assert_eq!(phase, WatchPhase::Notified);
        assert_eq!(worker.messages().await.len(), 1);
    }

    #[tokio::test]
    async fn test_one_shot_listener_ignores_second_update() {
        let container = SimContainer::with_controller();
        let registration = container.registration();
        let bus = EventBus::new(64);

        let listener = tokio::spawn(listen_for_new_instances(
            registration.clone(),
            registration.update_found(),
            false,
            None,
            bus.emitter_for("sw.js"),
        ));
        tokio::task::yield_now().await;

        let first = SimWorker::new(WorkerState::Installing);
        registration.announce_update(&first);
        tokio::time::sleep(QUIET).await;
        let second = SimWorker::new(WorkerState::Installing);
        registration.announce_update(&second);

        first.transition(WorkerState::Installed);
        second.transition(WorkerState::Installed);
        tokio::time::timeout(Duration::from_secs(1), listener).await.unwrap().unwrap();

        assert_eq!(first.messages().await.len(), 1);
        tokio::time::sleep(QUIET).await;
        assert!(second.messages().await.is_empty());
    }
}
