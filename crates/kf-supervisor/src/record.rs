//! Per-forward runtime state

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use kf_core::time::current_time_millis;
use kf_core::{ForwardKey, Profile};
use tokio_util::sync::CancellationToken;

use crate::process::{ChildHandle, ProcessId};

/// Lifecycle state of a forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForwardStatus {
    /// Not running and not scheduled to run
    Stopped,
    /// Process launched, waiting for spawn acknowledgment
    Starting,
    /// Process is up
    Running,
    /// Process exited; a reconnect is scheduled
    Restarting,
    /// Process could not be created; waits for a manual start
    Error,
}

impl ForwardStatus {
    /// Whether the forward is up or on its way up (toggle stops these)
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ForwardStatus::Starting | ForwardStatus::Running | ForwardStatus::Restarting
        )
    }
}

impl fmt::Display for ForwardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForwardStatus::Stopped => write!(f, "stopped"),
            ForwardStatus::Starting => write!(f, "starting"),
            ForwardStatus::Running => write!(f, "running"),
            ForwardStatus::Restarting => write!(f, "restarting"),
            ForwardStatus::Error => write!(f, "error"),
        }
    }
}

/// How the most recent process of a forward ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastExit {
    /// Exit code, if the process exited normally
    pub code: Option<i32>,
    /// Terminating signal, if any
    pub signal: Option<i32>,
    /// Spawn-level error message
    pub error: Option<String>,
    /// Unix timestamp in milliseconds
    pub timestamp: u64,
}

impl LastExit {
    /// Snapshot for a process that exited
    pub fn exited(code: Option<i32>, signal: Option<i32>) -> Self {
        Self {
            code,
            signal,
            error: None,
            timestamp: current_time_millis(),
        }
    }

    /// Snapshot for a process that could not be spawned
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            code: None,
            signal: None,
            error: Some(message.into()),
            timestamp: current_time_millis(),
        }
    }

    /// Short human-readable description (`code 1`, `signal 15`, the error)
    pub fn describe(&self) -> String {
        if let Some(error) = &self.error {
            return error.clone();
        }
        match (self.code, self.signal) {
            (Some(code), _) => format!("code {}", code),
            (None, Some(signal)) => format!("signal {}", signal),
            (None, None) => "unknown status".to_string(),
        }
    }
}

/// Identifier of one armed restart timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

/// A live child process owned by a record
pub(crate) struct RunningProcess {
    pub(crate) id: ProcessId,
    pub(crate) handle: Box<dyn ChildHandle>,
}

/// An armed one-shot restart timer; dropping it cancels the timer
pub(crate) struct PendingRestart {
    pub(crate) id: TimerId,
    pub(crate) delay: Duration,
    cancel: CancellationToken,
}

impl PendingRestart {
    pub(crate) fn new(id: TimerId, delay: Duration, cancel: CancellationToken) -> Self {
        Self { id, delay, cancel }
    }
}

impl Drop for PendingRestart {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Mutable runtime state for one identity key
///
/// Only the supervisor mutates records; everyone else gets `&ForwardRecord`
/// or a [`RecordSnapshot`].
pub struct ForwardRecord {
    pub(crate) key: ForwardKey,
    pub(crate) profile: Profile,
    pub(crate) process: Option<RunningProcess>,
    pub(crate) desired: bool,
    pub(crate) status: ForwardStatus,
    pub(crate) retry_count: u32,
    pub(crate) pending_restart: Option<PendingRestart>,
    pub(crate) last_exit: Option<LastExit>,
}

impl ForwardRecord {
    pub(crate) fn new(key: ForwardKey, profile: Profile) -> Self {
        Self {
            key,
            profile,
            process: None,
            desired: false,
            status: ForwardStatus::Stopped,
            retry_count: 0,
            pending_restart: None,
            last_exit: None,
        }
    }

    /// Identity key
    pub fn key(&self) -> &ForwardKey {
        &self.key
    }

    /// Latest known profile for this key
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Whether the forward should be running
    pub fn is_desired(&self) -> bool {
        self.desired
    }

    /// Current status
    pub fn status(&self) -> ForwardStatus {
        self.status
    }

    /// Reconnect attempts since the last successful spawn
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// How the most recent process ended
    pub fn last_exit(&self) -> Option<&LastExit> {
        self.last_exit.as_ref()
    }

    /// Whether a child process is currently tracked
    pub fn has_process(&self) -> bool {
        self.process.is_some()
    }

    /// OS process id of the tracked child, if known
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(|p| p.handle.pid())
    }

    /// Delay of the armed restart timer, if one is pending
    pub fn pending_restart(&self) -> Option<Duration> {
        self.pending_restart.as_ref().map(|t| t.delay)
    }

    /// Owned copy of the observable state
    pub fn snapshot(&self) -> RecordSnapshot {
        RecordSnapshot {
            key: self.key.clone(),
            profile: self.profile.clone(),
            desired: self.desired,
            status: self.status,
            retry_count: self.retry_count,
            last_exit: self.last_exit.clone(),
            pid: self.pid(),
            restart_delay_ms: self.pending_restart().map(|d| d.as_millis() as u64),
        }
    }
}

impl fmt::Debug for ForwardRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForwardRecord")
            .field("key", &self.key)
            .field("desired", &self.desired)
            .field("status", &self.status)
            .field("retry_count", &self.retry_count)
            .field("has_process", &self.process.is_some())
            .field("pending_restart", &self.pending_restart())
            .field("last_exit", &self.last_exit)
            .finish()
    }
}

/// Owned, serializable view of a [`ForwardRecord`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    pub key: ForwardKey,
    pub profile: Profile,
    pub desired: bool,
    pub status: ForwardStatus,
    pub retry_count: u32,
    pub last_exit: Option<LastExit>,
    pub pid: Option<u32>,
    pub restart_delay_ms: Option<u64>,
}
