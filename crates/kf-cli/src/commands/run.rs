//! Run command implementation
//!
//! Supervises forwards in the foreground until Ctrl+C, SIGTERM or `quit`.

use std::collections::HashMap;
use std::io::BufRead;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::console::{self, ConsoleCommand};
use crate::output::{format_views, print_error, print_info, print_success, print_warning, status_cell};
use kf_core::config::{FileProfileSource, Settings};
use kf_core::error::ConfigError;
use kf_core::log_sink::{FileLogSink, TeeLogSink, TracingLogSink};
use kf_core::LogSink;
use kf_supervisor::{
    ForwardService, ForwardStatus, ForwardView, KubectlLauncher, Reconciler, ServiceError,
    ServiceHandle, Supervisor, SupervisorOptions,
};

/// Options for [`run_command`]
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Read console commands from stdin
    pub console: bool,
}

/// Run the supervisor in the foreground
pub async fn run_command(settings: Settings, options: RunOptions) -> Result<()> {
    let log = build_log_sink(&settings)?;
    let (supervisor, events) = Supervisor::new(
        SupervisorOptions::from_settings(&settings),
        Arc::new(KubectlLauncher::new()),
        log,
    );
    let reconciler = Reconciler::new(Box::new(FileProfileSource::new(&settings.profiles_path)));

    let shutdown = CancellationToken::new();
    let (handle, task) = ForwardService::spawn(supervisor, events, reconciler, shutdown.clone());

    spawn_status_printer(handle.clone());

    print_info(&format!("Using profiles from {:?}", settings.profiles_path));
    reload(&handle).await;
    print_views(&handle, false).await;

    spawn_shutdown_on_signal(shutdown.clone());
    spawn_reload_on_hangup(handle.clone(), shutdown.clone());

    if options.console {
        print_info("Type 'help' for commands");
        spawn_console(handle, shutdown);
    }

    task.await.context("Forward service task failed")?;
    print_success("All forwards stopped");
    Ok(())
}

fn build_log_sink(settings: &Settings) -> Result<Arc<dyn LogSink>> {
    let mut sinks: Vec<Box<dyn LogSink>> = vec![Box::new(TracingLogSink)];

    if let Some(path) = &settings.log_file {
        let file = FileLogSink::open(path)
            .with_context(|| format!("Failed to open log file: {:?}", path))?;
        print_info(&format!("Writing forward log to {:?}", file.path()));
        sinks.push(Box::new(file));
    }

    Ok(Arc::new(TeeLogSink::new(sinks)))
}

async fn reload(handle: &ServiceHandle) {
    match handle.refresh().await {
        Ok(report) => {
            if report.skipped > 0 {
                print_warning(&format!("Skipped {} invalid profile(s)", report.skipped));
            }
            print_success(&format!("Loaded {} forward(s)", report.active));
        }
        Err(ServiceError::Config(ConfigError::NotFound(path))) => {
            print_error(&format!("Profiles file not found: {:?}", path));
            print_info("Run 'k-forward config init' to create one, then 'reload'");
        }
        Err(e) => print_error(&format!("Failed to load profiles: {}", e)),
    }
}

async fn print_views(handle: &ServiceHandle, detailed: bool) {
    match handle.views().await {
        Ok(views) => println!("{}", format_views(&views, detailed)),
        Err(e) => print_error(&e.to_string()),
    }
}

/// Print one line per status transition
fn spawn_status_printer(handle: ServiceHandle) {
    let mut changes = handle.subscribe();
    tokio::spawn(async move {
        let mut last: HashMap<String, ForwardStatus> = HashMap::new();

        while changes.changed().await.is_ok() {
            let Ok(views) = handle.views().await else {
                break;
            };

            for view in &views {
                let previous = last
                    .insert(view.key.clone(), view.status)
                    .unwrap_or(ForwardStatus::Stopped);
                if previous != view.status {
                    print_transition(view);
                }
            }
            last.retain(|key, _| views.iter().any(|v| &v.key == key));
        }
    });
}

fn print_transition(view: &ForwardView) {
    let exit = view
        .last_exit
        .as_deref()
        .map(|e| format!(" ({})", e))
        .unwrap_or_default();

    match view.status {
        ForwardStatus::Running => {
            print_success(&format!("{} forwarding {}", view.label, view.ports))
        }
        ForwardStatus::Starting => print_info(&format!("{} starting", view.label)),
        ForwardStatus::Restarting => {
            print_warning(&format!("{} {}{}", view.label, status_cell(view), exit))
        }
        ForwardStatus::Error => print_error(&format!("{} failed{}", view.label, exit)),
        ForwardStatus::Stopped => print_info(&format!("{} stopped{}", view.label, exit)),
    }
}

fn spawn_shutdown_on_signal(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, stopping forwards...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, stopping forwards...");
            }
            _ = shutdown.cancelled() => return,
        }

        shutdown.cancel();
    });
}

#[cfg(unix)]
fn spawn_reload_on_hangup(handle: ServiceHandle, shutdown: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!("Failed to install SIGHUP handler: {}", e);
                return;
            }
        };

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = hangup.recv() => {
                    if received.is_none() {
                        break;
                    }
                    tracing::info!("Received SIGHUP, reloading profiles");
                    reload(&handle).await;
                }
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_on_hangup(_handle: ServiceHandle, _shutdown: CancellationToken) {}

fn spawn_console(handle: ServiceHandle, shutdown: CancellationToken) {
    let (tx, mut rx) = mpsc::channel::<String>(16);

    // Plain thread: a pending stdin read cannot be cancelled and must not
    // block runtime shutdown.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    tokio::spawn(async move {
        loop {
            let line = tokio::select! {
                _ = shutdown.cancelled() => break,
                line = rx.recv() => line,
            };
            let Some(line) = line else {
                tracing::debug!("Console input closed");
                break;
            };

            match console::parse(&line) {
                Ok(None) => {}
                Ok(Some(ConsoleCommand::Quit)) => {
                    shutdown.cancel();
                    break;
                }
                Ok(Some(command)) => execute(&handle, command).await,
                Err(e) => print_error(&e.to_string()),
            }
        }
    });
}

async fn execute(handle: &ServiceHandle, command: ConsoleCommand) {
    let result = match command {
        ConsoleCommand::Apply { action, target } => handle.apply(action, &target).await,
        ConsoleCommand::StartAll => handle.start_all().await,
        ConsoleCommand::StopAll => handle.stop_all().await,
        ConsoleCommand::Reload => {
            reload(handle).await;
            Ok(())
        }
        ConsoleCommand::Status => {
            print_views(handle, true).await;
            Ok(())
        }
        ConsoleCommand::Help => {
            println!("{}", console::HELP);
            Ok(())
        }
        ConsoleCommand::Quit => Ok(()),
    };

    if let Err(e) = result {
        print_error(&e.to_string());
    }
}
