//! Launcher backed by `tokio::process`

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use kf_core::error::SpawnError;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{ChildHandle, LaunchSpec, OutputStream, ProcessEvents, ProcessLauncher};

/// How long a terminated child may take to exit before it is killed
#[cfg(unix)]
const TERMINATE_GRACE: Duration = Duration::from_secs(5);
#[cfg(not(unix))]
const TERMINATE_GRACE: Duration = Duration::ZERO;

/// How long to wait for output readers after the child has exited
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Launches forwarding processes as OS children
#[derive(Debug, Default, Clone, Copy)]
pub struct KubectlLauncher;

impl KubectlLauncher {
    /// Create a launcher
    pub fn new() -> Self {
        Self
    }
}

impl ProcessLauncher for KubectlLauncher {
    fn launch(
        &self,
        spec: &LaunchSpec,
        events: ProcessEvents,
    ) -> Result<Box<dyn ChildHandle>, SpawnError> {
        if spec.program.is_empty() {
            return Err(SpawnError::EmptyCommand);
        }

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| SpawnError::Launch {
            program: spec.program.clone(),
            source: e,
        })?;

        let pid = child.id();
        tracing::debug!("Spawned {} for {} with PID {:?}", spec.program, events.key(), pid);
        events.spawned(pid);

        let stdout_task = spawn_output_reader(child.stdout.take(), OutputStream::Stdout, events.clone());
        let stderr_task = spawn_output_reader(child.stderr.take(), OutputStream::Stderr, events.clone());

        let shutdown = CancellationToken::new();
        tokio::spawn(monitor_child(
            child,
            shutdown.clone(),
            events,
            [stdout_task, stderr_task],
        ));

        Ok(Box::new(LaunchedChild { pid, shutdown }))
    }
}

/// Handle returned by [`KubectlLauncher`]
struct LaunchedChild {
    pid: Option<u32>,
    shutdown: CancellationToken,
}

impl ChildHandle for LaunchedChild {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn terminate(&mut self) -> Result<(), SpawnError> {
        // The monitor owns the child and does the signalling.
        self.shutdown.cancel();
        Ok(())
    }
}

/// Ask a child that has not been reaped yet to exit
///
/// `child.id()` is `None` once the child has been waited on, so a PID is
/// only signalled while it still belongs to the child.
#[cfg(unix)]
fn request_exit(child: &Child) -> Result<(), SpawnError> {
    match child.id() {
        Some(pid) => send_sigterm(pid),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn request_exit(_child: &Child) -> Result<(), SpawnError> {
    Ok(())
}

#[cfg(unix)]
fn send_sigterm(pid: u32) -> Result<(), SpawnError> {
    // SAFETY: kill(2) has no memory-safety preconditions.
    let result = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if result == 0 {
        Ok(())
    } else {
        Err(SpawnError::Terminate {
            pid,
            source: std::io::Error::last_os_error(),
        })
    }
}

/// Read `stream` line by line and report each line
fn spawn_output_reader(
    stream: Option<impl AsyncRead + Unpin + Send + 'static>,
    kind: OutputStream,
    events: ProcessEvents,
) -> Option<JoinHandle<()>> {
    let stream = stream?;
    Some(tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            events.output(kind, line);
        }
    }))
}

/// Wait for the child to exit (or be told to stop), then report the exit
///
/// Output readers are drained first so every line reaches the supervisor
/// before the exit event.
async fn monitor_child(
    mut child: Child,
    shutdown: CancellationToken,
    events: ProcessEvents,
    readers: [Option<JoinHandle<()>>; 2],
) {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = shutdown.cancelled() => {
            if let Err(e) = request_exit(&child) {
                tracing::warn!("Failed to terminate process for {}: {}", events.key(), e);
            }
            match tokio::time::timeout(TERMINATE_GRACE, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    tracing::debug!("Process for {} ignored termination, killing", events.key());
                    if let Err(e) = child.start_kill() {
                        tracing::warn!("Failed to kill process for {}: {}", events.key(), e);
                    }
                    child.wait().await
                }
            }
        }
    };

    for reader in readers.into_iter().flatten() {
        let _ = tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, reader).await;
    }

    match status {
        Ok(status) => {
            let (code, signal) = exit_parts(status);
            events.exited(code, signal);
        }
        Err(e) => events.failed(format!("Failed to wait for process: {}", e)),
    }
}

#[cfg(unix)]
fn exit_parts(status: ExitStatus) -> (Option<i32>, Option<i32>) {
    use std::os::unix::process::ExitStatusExt;
    (status.code(), status.signal())
}

#[cfg(not(unix))]
fn exit_parts(status: ExitStatus) -> (Option<i32>, Option<i32>) {
    (status.code(), None)
}
