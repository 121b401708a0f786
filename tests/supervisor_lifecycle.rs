// tests/supervisor_lifecycle.rs

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;

use devpipe::config::model::ServerConfig;
use devpipe::env::Environment;
use devpipe::supervisor::{Supervisor, SupervisorState};
use devpipe_test_utils::fakes::{FakeLauncher, RecordingBroadcaster, RecordingLogSink};
use devpipe_test_utils::{eventually, init_tracing};

struct Rig {
    supervisor: Supervisor,
    launcher: FakeLauncher,
    broadcaster: Arc<RecordingBroadcaster>,
    sink: Arc<RecordingLogSink>,
}

fn server() -> ServerConfig {
    ServerConfig {
        cmd: "./OBIJudge".to_string(),
        args: vec!["run".to_string()],
        dev_flag: Some("-testing".to_string()),
        reload_path: "/".to_string(),
    }
}

fn rig(env: Environment, launcher: FakeLauncher) -> Rig {
    let broadcaster = RecordingBroadcaster::new();
    let sink = RecordingLogSink::new();
    let supervisor = Supervisor::new(
        server(),
        env,
        "/srv/obijudge",
        Arc::new(launcher.clone()),
        broadcaster.clone(),
        sink.clone(),
    );
    Rig {
        supervisor,
        launcher,
        broadcaster,
        sink,
    }
}

#[tokio::test]
async fn dev_flag_follows_environment() {
    init_tracing();

    let mut dev = rig(Environment::Development, FakeLauncher::new());
    dev.supervisor.spawn().unwrap();
    assert_eq!(
        dev.launcher.launches(),
        vec![(
            "./OBIJudge".to_string(),
            vec!["run".to_string(), "-testing".to_string()]
        )]
    );

    assert_eq!(dev.launcher.launch_dirs(), vec![PathBuf::from("/srv/obijudge")]);

    let mut prod = rig(Environment::Production, FakeLauncher::new());
    prod.supervisor.spawn().unwrap();
    assert_eq!(prod.launcher.launches()[0].1, vec!["run".to_string()]);
}

#[tokio::test]
async fn respawn_terminates_the_previous_process_first() {
    init_tracing();

    let mut r = rig(Environment::Development, FakeLauncher::new());
    r.supervisor.spawn().unwrap();
    assert!(r.launcher.terminated().is_empty());
    assert_eq!(r.supervisor.state(), SupervisorState::Starting);

    r.supervisor.spawn().unwrap();
    assert_eq!(r.launcher.terminated(), vec![1]);
    assert_eq!(r.launcher.launches().len(), 2);

    r.supervisor.kill();
    assert_eq!(r.launcher.terminated(), vec![1, 2]);
    assert_eq!(r.supervisor.state(), SupervisorState::Stopped);
}

#[tokio::test]
async fn first_stdout_output_reloads_exactly_once() {
    init_tracing();

    let mut r = rig(Environment::Development, FakeLauncher::new());
    r.supervisor.spawn().unwrap();
    let mut io = r.launcher.take_io(0).unwrap();

    io.stdout.write_all(b"listening on :8080\n").await.unwrap();
    io.stdout.write_all(b"GET / 200\n\nGET /a").await.unwrap();
    io.stdout.write_all(b".css 200\r\n").await.unwrap();

    let sink = Arc::clone(&r.sink);
    eventually("three log lines", move || sink.lines().len() == 3).await;
    assert_eq!(
        r.sink.lines(),
        vec!["listening on :8080", "GET / 200", "GET /a.css 200"]
    );
    assert_eq!(r.broadcaster.paths(), vec!["/".to_string()]);
    assert_eq!(r.supervisor.state(), SupervisorState::Running);

    // A second spawn gets its own single reload.
    r.supervisor.spawn().unwrap();
    let mut io2 = r.launcher.take_io(1).unwrap();
    io2.stdout.write_all(b"listening again\n").await.unwrap();

    let broadcaster = Arc::clone(&r.broadcaster);
    eventually("second reload", move || broadcaster.count() == 2).await;

    // Late output of the terminated first process triggers nothing.
    io.stdout.write_all(b"late line\n").await.unwrap();
    let sink = Arc::clone(&r.sink);
    eventually("late line logged", move || sink.lines().len() == 5).await;
    assert_eq!(r.broadcaster.count(), 2);
}

#[tokio::test]
async fn stderr_is_relayed_raw() {
    init_tracing();

    let mut r = rig(Environment::Development, FakeLauncher::new());
    r.supervisor.spawn().unwrap();
    let mut io = r.launcher.take_io(0).unwrap();

    io.stderr.write_all(b"panic: partial").await.unwrap();
    io.stderr.write_all(b" line\n\n").await.unwrap();

    let expected = b"panic: partial line\n\n".to_vec();
    let sink = Arc::clone(&r.sink);
    let want = expected.len();
    eventually("stderr relayed", move || sink.stderr().len() == want).await;
    assert_eq!(r.sink.stderr(), expected);
    assert!(r.sink.lines().is_empty());
    assert_eq!(r.broadcaster.count(), 0);
    assert_eq!(r.supervisor.state(), SupervisorState::Starting);
}

#[tokio::test]
async fn exit_is_not_followed_by_a_restart() {
    init_tracing();

    let mut r = rig(Environment::Development, FakeLauncher::new());
    r.supervisor.spawn().unwrap();
    let mut io = r.launcher.take_io(0).unwrap();
    io.stdout.write_all(b"ready\n").await.unwrap();
    let sink = Arc::clone(&r.sink);
    eventually("first line", move || sink.lines().len() == 1).await;
    assert_eq!(r.supervisor.state(), SupervisorState::Running);

    drop(io);
    eventually("stopped after exit", || r.supervisor.state() == SupervisorState::Stopped).await;

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(r.launcher.launches().len(), 1);
    assert!(r.launcher.terminated().is_empty());
}

#[tokio::test]
async fn missing_executable_surfaces_not_found() {
    init_tracing();

    let mut r = rig(Environment::Development, FakeLauncher::missing());
    let err = r.supervisor.spawn().unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::NotFound);
    assert_eq!(r.supervisor.state(), SupervisorState::Stopped);
    assert_eq!(r.supervisor.program(), "./OBIJudge");
}
