//! Scripted runs of the coordinator against the simulated host
//!
//! Each scenario builds a [`SimPage`], runs `register_and_watch`, drives the
//! worker lifecycle the way a host would, and plays the worker's side of the
//! hand-off: the first instance to receive the take-over message claims the
//! page.

use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::coordinator::{Coordination, CoordinatorConfig, UpdateCoordinator};
use crate::domain::WorkerState;
use crate::events::CoordinatorEvent;
use crate::host::HostError;
use crate::sim::{SimContainer, SimPage, SimRegistration, SimWorker};

/// Pause between scripted host steps
const STEP: Duration = Duration::from_millis(10);

/// How long to wait for a message or reload that may never come
const SETTLE: Duration = Duration::from_millis(250);

/// Named host behaviours the coordinator can be run against
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// Host offers no worker registration
    Unsupported,
    /// Registration is rejected
    RegistrationFailure,
    /// First install, no prior controller
    FreshInstall,
    /// Update discovered via update-found, installing → installed
    UpdateFound,
    /// New instance already waiting at registration time
    Waiting,
    /// New instance already installing at registration time
    Installing,
    /// Host repeats every state-change notification
    DuplicateNotifications,
    /// New instance fails to install and goes redundant
    RedundantInstall,
    /// A second update arrives before the first hand-off completes
    SecondUpdate,
}

impl Scenario {
    pub const ALL: [Scenario; 9] = [
        Scenario::Unsupported,
        Scenario::RegistrationFailure,
        Scenario::FreshInstall,
        Scenario::UpdateFound,
        Scenario::Waiting,
        Scenario::Installing,
        Scenario::DuplicateNotifications,
        Scenario::RedundantInstall,
        Scenario::SecondUpdate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Unsupported => "unsupported",
            Self::RegistrationFailure => "registration-failure",
            Self::FreshInstall => "fresh-install",
            Self::UpdateFound => "update-found",
            Self::Waiting => "waiting",
            Self::Installing => "installing",
            Self::DuplicateNotifications => "duplicate-notifications",
            Self::RedundantInstall => "redundant-install",
            Self::SecondUpdate => "second-update",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Unsupported => "host offers no worker registration; nothing is attempted",
            Self::RegistrationFailure => "registration rejects; coordination is disabled",
            Self::FreshInstall => "no prior controller; no message, no reload",
            Self::UpdateFound => "update found later; message once installed, then reload",
            Self::Waiting => "new instance already waiting; message sent immediately",
            Self::Installing => "new instance already installing; message once installed",
            Self::DuplicateNotifications => "host repeats notifications; still one message",
            Self::RedundantInstall => "new instance goes redundant; no message, no reload",
            Self::SecondUpdate => "two updates in one session; one reload",
        }
    }

    /// Run the scenario to completion
    pub async fn run(self, config: &CoordinatorConfig) -> ScenarioReport {
        debug!(scenario = self.name(), "Scenario::run: called");
        let container = match self {
            Self::Unsupported => None,
            Self::RegistrationFailure => Some(SimContainer::failing(HostError::Network(
                "worker script fetch returned 404".to_string(),
            ))),
            Self::FreshInstall => Some(SimContainer::new()),
            _ => Some(SimContainer::with_controller()),
        };
        let page = match &container {
            Some(container) => SimPage::new(container.clone()),
            None => SimPage::unsupported(),
        };

        let coordinator = UpdateCoordinator::new(page.clone(), config.clone());
        let mut events = coordinator.subscribe();

        let mut workers: Vec<Arc<SimWorker>> = Vec::new();
        if let Some(container) = &container {
            let registration = container.registration();
            match self {
                Self::Waiting => {
                    let worker = SimWorker::new(WorkerState::Installed);
                    registration.set_waiting(Some(&worker));
                    workers.push(worker);
                }
                Self::Installing => {
                    let worker = SimWorker::new(WorkerState::Installing);
                    registration.set_installing(Some(&worker));
                    workers.push(worker);
                }
                _ => {}
            }
        }

        let coordination = coordinator.start().await;
        let outcome = coordination.label().to_string();
        info!(scenario = self.name(), %outcome, "Scenario registered");

        if let Some(container) = &container {
            self.drive(&container.registration(), &mut workers).await;
            hand_off(container, &workers).await;
        }

        let reloaded = match coordination {
            Coordination::Watching(session) => session.settled_within(SETTLE).await.unwrap_or_else(|| {
                debug!("Scenario::run: no controller change, session closed");
                false
            }),
            _ => false,
        };

        let mut messages_sent = 0;
        for worker in &workers {
            messages_sent += worker.messages().await.len();
        }

        ScenarioReport {
            scenario: self,
            outcome,
            messages_sent,
            reloads: page.reload_count(),
            reloaded,
            events: drain(&mut events),
        }
    }

    /// Script the host side of the lifecycle
    async fn drive(&self, registration: &SimRegistration, workers: &mut Vec<Arc<SimWorker>>) {
        match self {
            Self::Unsupported | Self::RegistrationFailure | Self::Waiting => {}
            Self::FreshInstall => {
                let worker = announce(registration, workers).await;
                registration.finish_install(&worker);
                step().await;
                worker.transition(WorkerState::Activating);
                registration.activate(&worker);
                worker.transition(WorkerState::Active);
            }
            Self::UpdateFound => {
                let worker = announce(registration, workers).await;
                registration.finish_install(&worker);
            }
            Self::Installing => {
                if let Some(worker) = workers.first() {
                    step().await;
                    registration.finish_install(worker);
                }
            }
            Self::DuplicateNotifications => {
                let worker = announce(registration, workers).await;
                worker.transition(WorkerState::Installing);
                worker.transition(WorkerState::Installing);
                registration.finish_install(&worker);
                worker.transition(WorkerState::Installed);
                worker.transition(WorkerState::Installed);
            }
            Self::RedundantInstall => {
                let worker = announce(registration, workers).await;
                worker.transition(WorkerState::Redundant);
            }
            Self::SecondUpdate => {
                let first = announce(registration, workers).await;
                registration.finish_install(&first);
                step().await;
                let second = announce(registration, workers).await;
                registration.finish_install(&second);
            }
        }
        step().await;
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What happened during a scenario run
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub outcome: String,
    pub messages_sent: usize,
    pub reloads: usize,
    pub reloaded: bool,
    pub events: Vec<CoordinatorEvent>,
}

async fn step() {
    tokio::time::sleep(STEP).await;
}

async fn announce(registration: &SimRegistration, workers: &mut Vec<Arc<SimWorker>>) -> Arc<SimWorker> {
    let worker = SimWorker::new(WorkerState::Installing);
    registration.announce_update(&worker);
    workers.push(worker.clone());
    step().await;
    worker
}

/// Play the worker side: the first instance told to take over claims the page
async fn hand_off(container: &SimContainer, workers: &[Arc<SimWorker>]) {
    for worker in workers {
        if worker.messages().await.is_empty() {
            continue;
        }
        debug!("hand_off: worker received take-over, claiming page");
        container.claim(worker);
        return;
    }
    debug!("hand_off: no worker was told to take over");
}

fn drain(events: &mut broadcast::Receiver<CoordinatorEvent>) -> Vec<CoordinatorEvent> {
    let mut drained = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => drained.push(event),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                debug!(skipped, "drain: event buffer overflowed");
            }
            Err(_) => break,
        }
    }
    drained
}
