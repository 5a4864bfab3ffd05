//! Child-process boundary
//!
//! The supervisor never touches OS processes directly. It hands a
//! [`LaunchSpec`] to a [`ProcessLauncher`], keeps the returned
//! [`ChildHandle`] for termination, and learns about the child's life
//! through [`ProcessEvent`]s that the launcher posts on the supervisor's
//! event channel. Every launch gets a fresh [`ProcessId`] so that events from
//! a process the supervisor has already let go of can be recognised and
//! dropped.

mod command;
mod launcher;

pub use command::{forward_args, LaunchSpec};
pub use launcher::KubectlLauncher;

use std::fmt;

use kf_core::error::SpawnError;
use kf_core::ForwardKey;
use tokio::sync::mpsc;

use crate::record::TimerId;

/// Identifier of one launched process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(pub u64);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which output stream a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Something that happened to a launched process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// The process is up
    Spawned { pid: Option<u32> },
    /// One line of output
    Output { stream: OutputStream, line: String },
    /// The process terminated
    Exited {
        code: Option<i32>,
        signal: Option<i32>,
    },
    /// The process could not be created or observed
    Failed { message: String },
}

/// Message delivered to the supervisor's event loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// Lifecycle event of a launched process
    Process {
        key: ForwardKey,
        process: ProcessId,
        event: ProcessEvent,
    },
    /// A restart timer fired
    RestartDue { key: ForwardKey, timer: TimerId },
}

/// Sending half of the supervisor event channel
pub type EventSender = mpsc::UnboundedSender<SupervisorEvent>;

/// Receiving half of the supervisor event channel
pub type EventReceiver = mpsc::UnboundedReceiver<SupervisorEvent>;

/// Reports lifecycle events for one launched process
///
/// Sends are best-effort: once the supervisor is gone, events are dropped.
#[derive(Debug, Clone)]
pub struct ProcessEvents {
    key: ForwardKey,
    process: ProcessId,
    tx: EventSender,
}

impl ProcessEvents {
    /// Create an emitter for `process` of forward `key`
    pub fn new(key: ForwardKey, process: ProcessId, tx: EventSender) -> Self {
        Self { key, process, tx }
    }

    /// Forward key the process belongs to
    pub fn key(&self) -> &ForwardKey {
        &self.key
    }

    /// Process identifier
    pub fn process(&self) -> ProcessId {
        self.process
    }

    /// Report a successful spawn
    pub fn spawned(&self, pid: Option<u32>) {
        self.send(ProcessEvent::Spawned { pid });
    }

    /// Report one line of output
    pub fn output(&self, stream: OutputStream, line: impl Into<String>) {
        self.send(ProcessEvent::Output {
            stream,
            line: line.into(),
        });
    }

    /// Report process termination
    pub fn exited(&self, code: Option<i32>, signal: Option<i32>) {
        self.send(ProcessEvent::Exited { code, signal });
    }

    /// Report a spawn-level failure
    pub fn failed(&self, message: impl Into<String>) {
        self.send(ProcessEvent::Failed {
            message: message.into(),
        });
    }

    fn send(&self, event: ProcessEvent) {
        let event = SupervisorEvent::Process {
            key: self.key.clone(),
            process: self.process,
            event,
        };
        if self.tx.send(event).is_err() {
            tracing::trace!("Supervisor gone, dropping event for {}", self.key);
        }
    }
}

/// Handle to a launched child, used only for termination
pub trait ChildHandle: Send {
    /// OS process id, if known
    fn pid(&self) -> Option<u32>;

    /// Ask the process to terminate without waiting for it
    fn terminate(&mut self) -> Result<(), SpawnError>;
}

/// Creates forwarding processes
pub trait ProcessLauncher: Send + Sync {
    /// Start `spec`, reporting its lifecycle through `events`
    ///
    /// An `Err` means nothing was started and no events will follow.
    fn launch(
        &self,
        spec: &LaunchSpec,
        events: ProcessEvents,
    ) -> Result<Box<dyn ChildHandle>, SpawnError>;
}
