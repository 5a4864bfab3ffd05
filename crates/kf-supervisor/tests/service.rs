//! Forward service tests
//!
//! Exercises the service actor end to end with a profiles file on disk and
//! a fake launcher.

use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use kf_core::config::FileProfileSource;
use kf_core::log_sink::MemoryLogSink;
use kf_supervisor::testing::FakeLauncher;
use kf_supervisor::{
    ForwardService, ForwardStatus, Reconciler, RefreshReport, ServiceError, ServiceHandle,
    Supervisor, SupervisorOptions,
};

const PROFILES: &str = r#"
[[forwards]]
name = "api"
resource = "svc/api"
localPort = 8080
remotePort = 80

[[forwards]]
resource = "svc/db"
namespace = "data"
localPort = 5432
remotePort = 5432
autoStart = true

[[forwards]]
name = "no-ports"
resource = "svc/web"
"#;

struct Fixture {
    handle: ServiceHandle,
    task: JoinHandle<()>,
    launcher: FakeLauncher,
    log: Arc<MemoryLogSink>,
    shutdown: CancellationToken,
    _dir: tempfile::TempDir,
}

fn write_profiles(path: &Path, content: &str) {
    std::fs::write(path, content).expect("failed to write profiles");
}

fn spawn_service(profiles: &str) -> (Fixture, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forwards.toml");
    write_profiles(&path, profiles);

    let launcher = FakeLauncher::new();
    let log = Arc::new(MemoryLogSink::new());
    let (supervisor, events) = Supervisor::new(
        SupervisorOptions::default(),
        Arc::new(launcher.clone()),
        log.clone(),
    );
    let reconciler = Reconciler::new(Box::new(FileProfileSource::new(&path)));
    let shutdown = CancellationToken::new();
    let (handle, task) = ForwardService::spawn(supervisor, events, reconciler, shutdown.clone());

    let fixture = Fixture {
        handle,
        task,
        launcher,
        log,
        shutdown,
        _dir: dir,
    };
    (fixture, path)
}

#[tokio::test]
async fn test_refresh_reports_and_auto_starts() {
    let (f, _path) = spawn_service(PROFILES);

    let report = f.handle.refresh().await.unwrap();
    assert_eq!(report, RefreshReport { active: 2, skipped: 1 });
    assert_eq!(f.launcher.launch_count(), 1);

    let views = f.handle.views().await.unwrap();
    let labels: Vec<&str> = views.iter().map(|v| v.label.as_str()).collect();
    assert_eq!(labels, vec!["api", "svc/db 5432:5432"]);
    assert_eq!(views[0].status, ForwardStatus::Stopped);
    assert_eq!(views[1].status, ForwardStatus::Starting);
    assert_eq!(views[1].key, "res:svc/db|ns:data|5432:5432");
}

#[tokio::test]
async fn test_start_and_spawn_ack_reach_views() {
    let (f, _path) = spawn_service(PROFILES);
    f.handle.refresh().await.unwrap();
    let mut changes = f.handle.subscribe();

    f.handle.start("api").await.unwrap();
    changes.borrow_and_update();

    f.launcher.last().spawned(Some(321));
    changes.changed().await.unwrap();

    let views = f.handle.views().await.unwrap();
    assert_eq!(views[0].status, ForwardStatus::Running);
    assert_eq!(views[0].pid, Some(1002));
    assert!(f.log.contains("Starting api"));
}

#[tokio::test]
async fn test_unknown_target() {
    let (f, _path) = spawn_service(PROFILES);
    f.handle.refresh().await.unwrap();

    let err = f.handle.stop("nope").await.unwrap_err();
    assert!(matches!(err, ServiceError::UnknownTarget(ref t) if t == "nope"));
}

#[tokio::test]
async fn test_toggle_and_restart_by_resource() {
    let (f, _path) = spawn_service(PROFILES);
    f.handle.refresh().await.unwrap();

    f.handle.toggle("svc/db").await.unwrap();
    assert_eq!(f.handle.views().await.unwrap()[1].status, ForwardStatus::Stopped);

    f.handle.restart("svc/db").await.unwrap();
    assert_eq!(f.handle.views().await.unwrap()[1].status, ForwardStatus::Starting);
    assert_eq!(f.launcher.launch_count(), 2);
}

#[tokio::test]
async fn test_start_all_and_stop_all() {
    let (f, _path) = spawn_service(PROFILES);
    f.handle.refresh().await.unwrap();

    f.handle.start_all().await.unwrap();
    assert_eq!(f.launcher.launch_count(), 2);
    assert!(f
        .handle
        .views()
        .await
        .unwrap()
        .iter()
        .all(|v| v.status == ForwardStatus::Starting && v.desired));

    f.handle.stop_all().await.unwrap();
    assert_eq!(f.launcher.terminate_count(), 2);
    assert!(f
        .handle
        .views()
        .await
        .unwrap()
        .iter()
        .all(|v| v.status == ForwardStatus::Stopped && !v.desired));
}

#[tokio::test]
async fn test_failed_refresh_keeps_forwards() {
    let (f, path) = spawn_service(PROFILES);
    f.handle.refresh().await.unwrap();

    write_profiles(&path, "forwards = 3");
    let err = f.handle.refresh().await.unwrap_err();
    assert!(matches!(err, ServiceError::Config(_)));

    let views = f.handle.views().await.unwrap();
    assert_eq!(views.len(), 2);
    assert_eq!(views[1].status, ForwardStatus::Starting);
}

#[tokio::test]
async fn test_refresh_removes_dropped_profiles() {
    let (f, path) = spawn_service(PROFILES);
    f.handle.refresh().await.unwrap();

    write_profiles(
        &path,
        "[[forwards]]\nname = \"api\"\nresource = \"svc/api\"\nlocalPort = 8080\nremotePort = 80\n",
    );
    let report = f.handle.refresh().await.unwrap();

    assert_eq!(report, RefreshReport { active: 1, skipped: 0 });
    assert_eq!(f.launcher.terminate_count(), 1);
    assert!(f.log.contains("(profile removed)"));
    assert_eq!(f.handle.views().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_shutdown_request_stops_everything() {
    let (f, _path) = spawn_service(PROFILES);
    f.handle.refresh().await.unwrap();
    f.handle.start("api").await.unwrap();

    f.handle.shutdown().await.unwrap();
    f.task.await.unwrap();

    assert_eq!(f.launcher.terminate_count(), 2);
    assert!(matches!(f.handle.views().await, Err(ServiceError::Closed)));
}

#[tokio::test]
async fn test_cancellation_stops_everything() {
    let (f, _path) = spawn_service(PROFILES);
    f.handle.refresh().await.unwrap();

    f.shutdown.cancel();
    f.task.await.unwrap();

    assert_eq!(f.launcher.terminate_count(), 1);
    assert!(f.log.contains("(shutdown)"));
}
