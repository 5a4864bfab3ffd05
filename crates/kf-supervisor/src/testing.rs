//! Test doubles for the process boundary
//!
//! [`FakeLauncher`] records every launch instead of creating a process and
//! hands back the [`ProcessEvents`] emitter, so a test can play the part of
//! the child: acknowledge the spawn, print output, exit or fail.

use std::sync::{Arc, Mutex, MutexGuard};

use kf_core::error::SpawnError;

use crate::process::{ChildHandle, LaunchSpec, ProcessEvents, ProcessLauncher};

#[derive(Default)]
struct FakeState {
    launches: Vec<(LaunchSpec, ProcessEvents)>,
    fail_next: Option<String>,
    fail_terminate: bool,
    terminated: usize,
}

/// Launcher that records launches and lets the caller drive process events
#[derive(Clone, Default)]
pub struct FakeLauncher {
    state: Arc<Mutex<FakeState>>,
}

impl FakeLauncher {
    /// Create a launcher with no recorded launches
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the next launch fail synchronously with `message`
    pub fn fail_next(&self, message: impl Into<String>) {
        self.state().fail_next = Some(message.into());
    }

    /// Make every later termination request fail
    pub fn fail_terminate(&self) {
        self.state().fail_terminate = true;
    }

    /// Number of successful launches
    pub fn launch_count(&self) -> usize {
        self.state().launches.len()
    }

    /// Number of termination requests
    pub fn terminate_count(&self) -> usize {
        self.state().terminated
    }

    /// Specs of all successful launches, oldest first
    pub fn specs(&self) -> Vec<LaunchSpec> {
        self.state().launches.iter().map(|(s, _)| s.clone()).collect()
    }

    /// Event emitter of launch `index` (0-based)
    pub fn events(&self, index: usize) -> Option<ProcessEvents> {
        self.state().launches.get(index).map(|(_, e)| e.clone())
    }

    /// Event emitter of the most recent launch
    ///
    /// # Panics
    /// Panics if nothing was launched yet.
    pub fn last(&self) -> ProcessEvents {
        self.state()
            .launches
            .last()
            .map(|(_, e)| e.clone())
            .expect("no process has been launched")
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(
        &self,
        spec: &LaunchSpec,
        events: ProcessEvents,
    ) -> Result<Box<dyn ChildHandle>, SpawnError> {
        let mut state = self.state();
        if let Some(message) = state.fail_next.take() {
            return Err(SpawnError::Launch {
                program: spec.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, message),
            });
        }

        state.launches.push((spec.clone(), events));
        Ok(Box::new(FakeChild {
            pid: 1000 + state.launches.len() as u32,
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeChild {
    pid: u32,
    state: Arc<Mutex<FakeState>>,
}

impl ChildHandle for FakeChild {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn terminate(&mut self) -> Result<(), SpawnError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.terminated += 1;
        if state.fail_terminate {
            return Err(SpawnError::Terminate {
                pid: self.pid,
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            });
        }
        Ok(())
    }
}
