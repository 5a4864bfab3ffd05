//! Process supervisor
//!
//! The [`Supervisor`] owns every [`ForwardRecord`] and is the only code that
//! touches their process handles and restart timers. It is a plain
//! single-threaded state machine: public operations mutate records
//! synchronously, and everything asynchronous (spawn acknowledgment, output,
//! exit, timer expiry) comes back as a [`SupervisorEvent`] that the owner
//! feeds to [`Supervisor::handle_event`]. Running the supervisor inside one
//! task (see [`crate::service`]) therefore serialises all mutations without
//! any locking.
//!
//! # State machine
//!
//! ```text
//!            start                 spawn ack
//! stopped ----------> starting -------------> running
//!    ^                 |   ^                     |
//!    |  exit, not      |   | timer fires         | exit, desired and
//!    |  reconnecting   v   |                     | auto-reconnect
//!    +-------------- (exit) +---- restarting <---+
//!
//! any state --spawn failure--> error   (manual start/restart to recover)
//! any state --stop-----------> stopped
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use kf_core::config::Settings;
use kf_core::{compute_key, ForwardKey, LogSink, Profile};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::backoff::ExponentialBackoff;
use crate::notify::ChangeNotifier;
use crate::process::{
    EventReceiver, EventSender, LaunchSpec, OutputStream, ProcessEvent, ProcessEvents, ProcessId,
    ProcessLauncher, SupervisorEvent,
};
use crate::record::{
    ForwardRecord, ForwardStatus, LastExit, PendingRestart, RunningProcess, TimerId,
};

/// Static options for a supervisor
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// Program that creates forwards
    pub program: String,
    /// Reconnect delays
    pub backoff: ExponentialBackoff,
}

impl SupervisorOptions {
    /// Derive options from settings
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            program: settings.kubectl_path.clone(),
            backoff: ExponentialBackoff::from_config(&settings.backoff),
        }
    }
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            program: "kubectl".to_string(),
            backoff: ExponentialBackoff::default(),
        }
    }
}

/// Owner of all forward records
pub struct Supervisor {
    pub(crate) records: HashMap<ForwardKey, ForwardRecord>,
    launcher: Arc<dyn ProcessLauncher>,
    log: Arc<dyn LogSink>,
    notifier: ChangeNotifier,
    options: SupervisorOptions,
    events: EventSender,
    next_process: u64,
    next_timer: u64,
}

impl Supervisor {
    /// Create a supervisor and the receiver its events arrive on
    ///
    /// The receiver must be drained into [`Supervisor::handle_event`] on the
    /// same task that calls the other methods.
    pub fn new(
        options: SupervisorOptions,
        launcher: Arc<dyn ProcessLauncher>,
        log: Arc<dyn LogSink>,
    ) -> (Self, EventReceiver) {
        let (events, rx) = mpsc::unbounded_channel();
        let supervisor = Self {
            records: HashMap::new(),
            launcher,
            log,
            notifier: ChangeNotifier::new(),
            options,
            events,
            next_process: 0,
            next_timer: 0,
        };
        (supervisor, rx)
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.notifier.subscribe()
    }

    /// Start (or keep running) the forward described by `profile`
    ///
    /// Invalid profiles are reported and ignored. Starting a forward that
    /// already has a live process only refreshes its profile.
    pub fn start(&mut self, profile: &Profile) {
        let profile = profile.normalized();
        if let Err(e) = profile.validate() {
            tracing::warn!("Not starting invalid profile {}: {}", profile.label(), e);
            self.log
                .append_line(&format!("Invalid profile {}: {}", profile.label(), e));
            return;
        }

        let key = compute_key(&profile);
        let record = self
            .records
            .entry(key.clone())
            .or_insert_with(|| ForwardRecord::new(key.clone(), profile.clone()));
        record.profile = profile;
        record.desired = true;

        if record.process.is_some() {
            tracing::debug!("Forward {} already has a process, ignoring start", key);
            return;
        }

        record.pending_restart = None;
        record.status = ForwardStatus::Starting;
        self.notifier.notify();

        let spec = LaunchSpec::for_profile(&self.options.program, &record.profile);
        let label = record.profile.label();
        tracing::info!("Starting forward {}", label);
        self.log
            .append_line(&format!("Starting {}: {}", label, spec.command_line()));

        self.next_process += 1;
        let process = ProcessId(self.next_process);
        let events = ProcessEvents::new(key, process, self.events.clone());

        match self.launcher.launch(&spec, events) {
            Ok(handle) => {
                record.process = Some(RunningProcess {
                    id: process,
                    handle,
                });
            }
            Err(e) => {
                tracing::error!("Failed to start forward {}: {}", label, e);
                self.log
                    .append_line(&format!("Failed to start {}: {}", label, e));
                record.process = None;
                record.status = ForwardStatus::Error;
                record.last_exit = Some(LastExit::failed(e.to_string()));
                self.notifier.notify();
            }
        }
    }

    /// Stop the forward described by `profile`; no-op if it was never seen
    pub fn stop(&mut self, profile: &Profile) {
        let key = key_for(profile);
        self.stop_key(&key, Some("user"));
    }

    /// Stop then start; briefly `stopped` in between
    pub fn restart(&mut self, profile: &Profile) {
        self.stop(profile);
        self.start(profile);
    }

    /// Stop an active forward, start an inactive one
    pub fn toggle(&mut self, profile: &Profile) {
        if self.status(profile).is_active() {
            self.stop(profile);
        } else {
            self.start(profile);
        }
    }

    /// Stop every forward that is desired or still holds a process
    pub fn shutdown(&mut self) {
        let keys: Vec<ForwardKey> = self
            .records
            .values()
            .filter(|r| r.desired || r.process.is_some())
            .map(|r| r.key.clone())
            .collect();

        for key in keys {
            self.stop_key(&key, Some("shutdown"));
        }
    }

    /// Status of the forward, `stopped` when it has no record
    pub fn status(&self, profile: &Profile) -> ForwardStatus {
        self.record(profile)
            .map(ForwardRecord::status)
            .unwrap_or(ForwardStatus::Stopped)
    }

    /// Record for the forward, if one exists
    pub fn record(&self, profile: &Profile) -> Option<&ForwardRecord> {
        self.records.get(&key_for(profile))
    }

    /// Record by key, if one exists
    pub fn record_by_key(&self, key: &ForwardKey) -> Option<&ForwardRecord> {
        self.records.get(key)
    }

    /// All records, in no particular order
    pub fn records(&self) -> impl Iterator<Item = &ForwardRecord> {
        self.records.values()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Apply one asynchronous event
    pub fn handle_event(&mut self, event: SupervisorEvent) {
        match event {
            SupervisorEvent::Process {
                key,
                process,
                event,
            } => match event {
                ProcessEvent::Spawned { pid } => self.on_spawned(&key, process, pid),
                ProcessEvent::Output { stream, line } => self.on_output(&key, stream, &line),
                ProcessEvent::Exited { code, signal } => {
                    self.on_exited(&key, process, code, signal)
                }
                ProcessEvent::Failed { message } => self.on_failed(&key, process, &message),
            },
            SupervisorEvent::RestartDue { key, timer } => self.on_restart_due(&key, timer),
        }
    }

    /// Internal stop routine shared by user stops, reconciliation and shutdown
    pub(crate) fn stop_key(&mut self, key: &ForwardKey, reason: Option<&str>) {
        let Some(record) = self.records.get_mut(key) else {
            return;
        };

        record.desired = false;
        record.pending_restart = None;

        let label = record.profile.label();
        if let Some(mut running) = record.process.take() {
            if let Err(e) = running.handle.terminate() {
                tracing::warn!("Failed to terminate forward {}: {}", label, e);
                self.log
                    .append_line(&format!("Failed to stop {}: {}", label, e));
            }
        }

        record.status = ForwardStatus::Stopped;
        if let Some(reason) = reason {
            tracing::info!("Stopped forward {} ({})", label, reason);
            self.log
                .append_line(&format!("Stopped {} ({})", label, reason));
        }
        self.notifier.notify();
    }

    pub(crate) fn notify(&self) {
        self.notifier.notify();
    }

    fn on_spawned(&mut self, key: &ForwardKey, process: ProcessId, pid: Option<u32>) {
        let Some(record) = tracked(&mut self.records, key, process) else {
            return;
        };

        record.status = ForwardStatus::Running;
        record.retry_count = 0;
        tracing::info!("Forward {} running (pid {:?})", record.profile.label(), pid);
        self.notifier.notify();
    }

    fn on_output(&self, key: &ForwardKey, stream: OutputStream, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let label = self
            .records
            .get(key)
            .map(|r| r.profile.label())
            .unwrap_or_else(|| key.to_string());
        tracing::trace!(?stream, "[{}] {}", label, line);
        self.log.append_line(&format!("[{}] {}", label, line));
    }

    fn on_exited(
        &mut self,
        key: &ForwardKey,
        process: ProcessId,
        code: Option<i32>,
        signal: Option<i32>,
    ) {
        let Some(record) = tracked(&mut self.records, key, process) else {
            return;
        };

        record.process = None;
        let exit = LastExit::exited(code, signal);
        let label = record.profile.label();
        let reconnect = record.desired && record.profile.auto_reconnect;
        self.log
            .append_line(&format!("{} exited ({})", label, exit.describe()));
        record.last_exit = Some(exit);

        if reconnect {
            record.status = ForwardStatus::Restarting;
            self.notifier.notify();
            self.schedule_reconnect(key);
        } else {
            record.status = ForwardStatus::Stopped;
            tracing::info!("Forward {} exited", label);
            self.notifier.notify();
        }
    }

    fn on_failed(&mut self, key: &ForwardKey, process: ProcessId, message: &str) {
        let Some(record) = tracked(&mut self.records, key, process) else {
            return;
        };

        record.process = None;
        record.status = ForwardStatus::Error;
        record.last_exit = Some(LastExit::failed(message));
        let label = record.profile.label();
        tracing::error!("Forward {} failed: {}", label, message);
        self.log
            .append_line(&format!("Failed to start {}: {}", label, message));
        self.notifier.notify();
    }

    /// Arm the reconnect timer for `key` according to its retry count
    fn schedule_reconnect(&mut self, key: &ForwardKey) {
        let Some(record) = self.records.get_mut(key) else {
            return;
        };

        record.retry_count += 1;
        let attempt = record.retry_count;
        let delay = self.options.backoff.delay_for(attempt);
        let label = record.profile.label();

        tracing::info!("Reconnecting {} in {:?} (attempt {})", label, delay, attempt);
        self.log.append_line(&format!(
            "Reconnecting {} in {}ms (attempt {})",
            label,
            delay.as_millis(),
            attempt
        ));

        self.next_timer += 1;
        let timer = TimerId(self.next_timer);
        let cancel = CancellationToken::new();

        let token = cancel.clone();
        let tx = self.events.clone();
        let due_key = key.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(SupervisorEvent::RestartDue { key: due_key, timer });
                }
            }
        });

        record.pending_restart = Some(PendingRestart::new(timer, delay, cancel));
    }

    fn on_restart_due(&mut self, key: &ForwardKey, timer: TimerId) {
        let Some(record) = self.records.get_mut(key) else {
            return;
        };
        if record.pending_restart.as_ref().map(|t| t.id) != Some(timer) {
            tracing::trace!("Ignoring stale restart timer for {}", key);
            return;
        }

        record.pending_restart = None;
        if !record.desired {
            return;
        }

        let profile = record.profile.clone();
        self.start(&profile);
    }
}

/// Key of the forward `profile` describes once normalized
fn key_for(profile: &Profile) -> ForwardKey {
    compute_key(&profile.normalized())
}

/// Record whose current process is `process`
fn tracked<'a>(
    records: &'a mut HashMap<ForwardKey, ForwardRecord>,
    key: &ForwardKey,
    process: ProcessId,
) -> Option<&'a mut ForwardRecord> {
    match records.get_mut(key) {
        Some(record) if record.process.as_ref().map(|p| p.id) == Some(process) => Some(record),
        _ => {
            tracing::trace!("Ignoring event from untracked process {} of {}", process, key);
            None
        }
    }
}
