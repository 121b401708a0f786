// tests/watch_dispatch.rs

use std::time::Duration;

use tokio::sync::mpsc;

use devpipe::engine::{RuntimeEvent, TriggerReason};
use devpipe::watch::{spawn_watcher, WatchDispatcher};
use devpipe_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};
use devpipe_test_utils::{init_tracing, with_timeout};

fn dispatcher() -> WatchDispatcher {
    let cfg = ConfigFileBuilder::new()
        .with_server("./OBIJudge", &["run"], Some("-testing"))
        .with_task("static:build", TaskConfigBuilder::new().cmd("true").build())
        .with_task("spawn", TaskConfigBuilder::new().spawn().build())
        .with_watch(
            &["static/src/*", "templates/src/*", "package.json", "yarn.lock"],
            &["static:build"],
        )
        .with_watch(&["static/dist/*", "templates/dist/*", "OBIJudge"], &["spawn"])
        .with_watch(&["does/not/exist/**"], &["static:build"])
        .build();
    WatchDispatcher::from_config(&cfg).unwrap()
}

#[test]
fn source_changes_rebuild_and_output_changes_respawn() {
    let d = dispatcher();
    assert_eq!(d.rules().len(), 3);
    assert_eq!(d.tasks_for(["static/src/obijudge.js"]), vec!["static:build"]);
    assert_eq!(d.tasks_for(["yarn.lock"]), vec!["static:build"]);
    assert_eq!(d.tasks_for(["static/dist/obijudge.css"]), vec!["spawn"]);
    assert_eq!(d.tasks_for(["OBIJudge"]), vec!["spawn"]);
}

#[test]
fn rule_matching_nothing_is_inert() {
    let d = dispatcher();
    assert!(d.tasks_for(["README.md", "src/main.go"]).is_empty());
    assert!(d.tasks_for(std::iter::empty()).is_empty());
}

#[tokio::test]
async fn debounced_batch_becomes_one_run_request() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("static/src")).unwrap();
    std::fs::write(dir.path().join("README.md"), "readme").unwrap();

    let (tx, mut rx) = mpsc::channel::<RuntimeEvent>(16);
    let _handle = spawn_watcher(dir.path(), dispatcher(), Duration::from_millis(100), tx).unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    std::fs::write(dir.path().join("README.md"), "ignored").unwrap();
    std::fs::write(dir.path().join("static/src/a.css"), "a {}").unwrap();
    std::fs::write(dir.path().join("static/src/b.css"), "b {}").unwrap();

    let event = with_timeout(rx.recv()).await.unwrap();
    match event {
        RuntimeEvent::RunRequested { tasks, reason } => {
            assert_eq!(tasks, vec!["static:build".to_string()]);
            assert_eq!(reason, TriggerReason::FileWatch);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}
