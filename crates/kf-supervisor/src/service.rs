//! Supervisor service
//!
//! [`ForwardService`] runs a [`Supervisor`] and its [`Reconciler`] inside a
//! single task. Process events, timer expiries and user requests are all
//! consumed by the same `select!` loop, which makes that task the only
//! writer of the record map. Callers talk to it through a cloneable
//! [`ServiceHandle`].

use kf_core::error::ConfigError;
use kf_core::{compute_key, Profile};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::process::EventReceiver;
use crate::reconcile::{Reconciler, RefreshReport};
use crate::record::ForwardStatus;
use crate::supervisor::Supervisor;

/// Capacity of the request channel
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Errors returned to service callers
#[derive(Error, Debug)]
pub enum ServiceError {
    /// No profile in the current list matches the target
    #[error("no forward matches '{0}'")]
    UnknownTarget(String),

    /// The profile source could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The service task has stopped
    #[error("forward service is not running")]
    Closed,
}

/// Single-forward user operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Start,
    Stop,
    Restart,
    Toggle,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Restart => "restart",
            Action::Toggle => "toggle",
        };
        write!(f, "{}", s)
    }
}

/// Presentation row for one profile in the current list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardView {
    pub key: String,
    pub label: String,
    pub resource: String,
    pub namespace: String,
    pub context: String,
    pub ports: String,
    pub local_address: String,
    pub auto_start: bool,
    pub auto_reconnect: bool,
    pub status: ForwardStatus,
    pub desired: bool,
    pub retry_count: u32,
    pub pid: Option<u32>,
    /// Human-readable description of the last exit
    pub last_exit: Option<String>,
    /// When the last exit happened, Unix milliseconds
    pub last_exit_at: Option<u64>,
    /// Delay of the pending reconnect, if any
    pub restart_in_ms: Option<u64>,
}

impl ForwardView {
    fn build(supervisor: &Supervisor, profile: &Profile) -> Self {
        let record = supervisor.record(profile);
        // The record holds the newest definition when one exists.
        let profile = record.map(|r| r.profile()).unwrap_or(profile);

        Self {
            key: compute_key(profile).to_string(),
            label: profile.label(),
            resource: profile.resource.clone(),
            namespace: profile.namespace.clone(),
            context: profile.context.clone(),
            ports: profile.port_pair(),
            local_address: profile.local_address.clone(),
            auto_start: profile.auto_start,
            auto_reconnect: profile.auto_reconnect,
            status: record.map(|r| r.status()).unwrap_or(ForwardStatus::Stopped),
            desired: record.map(|r| r.is_desired()).unwrap_or(false),
            retry_count: record.map(|r| r.retry_count()).unwrap_or(0),
            pid: record.and_then(|r| r.pid()),
            last_exit: record.and_then(|r| r.last_exit()).map(|e| e.describe()),
            last_exit_at: record.and_then(|r| r.last_exit()).map(|e| e.timestamp),
            restart_in_ms: record
                .and_then(|r| r.pending_restart())
                .map(|d| d.as_millis() as u64),
        }
    }
}

enum Request {
    Refresh {
        reply: oneshot::Sender<Result<RefreshReport, ConfigError>>,
    },
    Apply {
        action: Action,
        target: String,
        reply: oneshot::Sender<Result<(), ServiceError>>,
    },
    StartAll {
        reply: oneshot::Sender<()>,
    },
    StopAll {
        reply: oneshot::Sender<()>,
    },
    Views {
        reply: oneshot::Sender<Vec<ForwardView>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Task that owns the supervisor and the reconciler
pub struct ForwardService {
    supervisor: Supervisor,
    events: EventReceiver,
    reconciler: Reconciler,
    requests: mpsc::Receiver<Request>,
    shutdown: CancellationToken,
}

impl ForwardService {
    /// Spawn the service loop
    ///
    /// The loop ends when `shutdown` is cancelled, when
    /// [`ServiceHandle::shutdown`] is called or when every handle has been
    /// dropped. In all cases every forward is stopped before the task
    /// finishes.
    pub fn spawn(
        supervisor: Supervisor,
        events: EventReceiver,
        reconciler: Reconciler,
        shutdown: CancellationToken,
    ) -> (ServiceHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
        let handle = ServiceHandle {
            requests: tx,
            changes: supervisor.subscribe(),
        };

        let service = Self {
            supervisor,
            events,
            reconciler,
            requests: rx,
            shutdown,
        };
        let task = tokio::spawn(service.run());

        (handle, task)
    }

    async fn run(mut self) {
        tracing::debug!("Forward service started ({})", self.reconciler.describe());

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Forward service shutting down");
                    break;
                }
                Some(event) = self.events.recv() => {
                    self.supervisor.handle_event(event);
                }
                request = self.requests.recv() => {
                    let Some(request) = request else {
                        tracing::debug!("All service handles dropped");
                        break;
                    };
                    if !self.handle_request(request) {
                        break;
                    }
                }
            }
        }

        self.supervisor.shutdown();
        tracing::debug!("Forward service stopped");
    }

    /// Apply one request; returns `false` when the loop should end
    fn handle_request(&mut self, request: Request) -> bool {
        match request {
            Request::Refresh { reply } => {
                let result = self.reconciler.refresh(&mut self.supervisor);
                let _ = reply.send(result);
            }
            Request::Apply {
                action,
                target,
                reply,
            } => {
                let _ = reply.send(self.apply(action, &target));
            }
            Request::StartAll { reply } => {
                for profile in self.reconciler.profiles() {
                    self.supervisor.start(profile);
                }
                let _ = reply.send(());
            }
            Request::StopAll { reply } => {
                for profile in self.reconciler.profiles() {
                    self.supervisor.stop(profile);
                }
                let _ = reply.send(());
            }
            Request::Views { reply } => {
                let _ = reply.send(self.views());
            }
            Request::Shutdown { reply } => {
                self.supervisor.shutdown();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn apply(&mut self, action: Action, target: &str) -> Result<(), ServiceError> {
        let profile = self
            .reconciler
            .find(target)
            .cloned()
            .ok_or_else(|| ServiceError::UnknownTarget(target.to_string()))?;

        tracing::debug!("{} {}", action, profile.label());
        match action {
            Action::Start => self.supervisor.start(&profile),
            Action::Stop => self.supervisor.stop(&profile),
            Action::Restart => self.supervisor.restart(&profile),
            Action::Toggle => self.supervisor.toggle(&profile),
        }
        Ok(())
    }

    fn views(&self) -> Vec<ForwardView> {
        let mut seen = std::collections::HashSet::new();
        self.reconciler
            .profiles()
            .iter()
            .filter(|p| seen.insert(compute_key(p)))
            .map(|p| ForwardView::build(&self.supervisor, p))
            .collect()
    }
}

/// Cloneable handle to a running [`ForwardService`]
#[derive(Clone)]
pub struct ServiceHandle {
    requests: mpsc::Sender<Request>,
    changes: watch::Receiver<u64>,
}

impl ServiceHandle {
    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Request,
    ) -> Result<T, ServiceError> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(build(tx))
            .await
            .map_err(|_| ServiceError::Closed)?;
        rx.await.map_err(|_| ServiceError::Closed)
    }

    /// Reload profiles and reconcile
    pub async fn refresh(&self) -> Result<RefreshReport, ServiceError> {
        Ok(self.call(|reply| Request::Refresh { reply }).await??)
    }

    /// Apply `action` to the forward matching `target` (key, name or resource)
    pub async fn apply(&self, action: Action, target: &str) -> Result<(), ServiceError> {
        let target = target.to_string();
        self.call(|reply| Request::Apply {
            action,
            target,
            reply,
        })
        .await?
    }

    /// Start one forward
    pub async fn start(&self, target: &str) -> Result<(), ServiceError> {
        self.apply(Action::Start, target).await
    }

    /// Stop one forward
    pub async fn stop(&self, target: &str) -> Result<(), ServiceError> {
        self.apply(Action::Stop, target).await
    }

    /// Restart one forward
    pub async fn restart(&self, target: &str) -> Result<(), ServiceError> {
        self.apply(Action::Restart, target).await
    }

    /// Toggle one forward
    pub async fn toggle(&self, target: &str) -> Result<(), ServiceError> {
        self.apply(Action::Toggle, target).await
    }

    /// Start every forward in the current list
    pub async fn start_all(&self) -> Result<(), ServiceError> {
        self.call(|reply| Request::StartAll { reply }).await
    }

    /// Stop every forward in the current list
    pub async fn stop_all(&self) -> Result<(), ServiceError> {
        self.call(|reply| Request::StopAll { reply }).await
    }

    /// Presentation rows for the current list, in source order
    pub async fn views(&self) -> Result<Vec<ForwardView>, ServiceError> {
        self.call(|reply| Request::Views { reply }).await
    }

    /// Stop every forward and end the service loop
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        self.call(|reply| Request::Shutdown { reply }).await
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.clone()
    }
}
