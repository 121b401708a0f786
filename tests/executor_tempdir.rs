// tests/executor_tempdir.rs

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;

use devpipe::config::ConfigFile;
use devpipe::dag::{RunSummary, Scheduler, TaskRegistry};
use devpipe::engine::{
    CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions, TriggerReason,
    TriggerWhileRunningBehaviour,
};
use devpipe::env::Environment;
use devpipe::exec::{ExecutorContext, RealExecutorBackend};
use devpipe::fs::RealFileSystem;
use devpipe::pipeline::WriteCache;
use devpipe_test_utils::builders::{concat_stage, ConfigFileBuilder, TaskConfigBuilder};
use devpipe_test_utils::fakes::{RecordingBroadcaster, RecordingNotifier};
use devpipe_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

struct Harness {
    broadcaster: Arc<RecordingBroadcaster>,
    notifier: Arc<RecordingNotifier>,
}

async fn run_once(root: &Path, cfg: &ConfigFile, tasks: &[&str]) -> Result<(Vec<RunSummary>, Harness), Box<dyn Error>> {
    let broadcaster = RecordingBroadcaster::new();
    let notifier = RecordingNotifier::new();

    let ctx = ExecutorContext {
        root: root.to_path_buf(),
        env: Environment::Development,
        fs: Arc::new(RealFileSystem),
        notifier: notifier.clone(),
        broadcaster: broadcaster.clone(),
        cache: Arc::new(WriteCache::new()),
    };

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(32);
    let executor = RealExecutorBackend::new(ctx, None, rt_tx.clone());
    rt_tx
        .send(RuntimeEvent::RunRequested {
            tasks: tasks.iter().map(|s| s.to_string()).collect(),
            reason: TriggerReason::Manual,
        })
        .await?;

    let core = CoreRuntime::new(
        Scheduler::new(TaskRegistry::from_config(cfg)?),
        TriggerWhileRunningBehaviour::Queue,
        1,
        RuntimeOptions {
            exit_when_idle: true,
        },
    );
    let summaries = with_timeout(Runtime::new(core, rt_rx, executor).run()).await?;
    Ok((
        summaries,
        Harness {
            broadcaster,
            notifier,
        },
    ))
}

fn asset_config() -> ConfigFile {
    ConfigFileBuilder::new()
        .with_task("static:clean", TaskConfigBuilder::new().clean("static/dist").build())
        .with_task(
            "static:css",
            TaskConfigBuilder::new()
                .after("static:clean")
                .pipeline(
                    &["static/src/*.css", "static/src/missing.css"],
                    "static/dist",
                    vec![concat_stage("obijudge.css")],
                )
                .reload()
                .build(),
        )
        .with_task(
            "static:build",
            TaskConfigBuilder::new().after("static:css").cmd("echo built > built.txt").build(),
        )
        .build()
}

#[tokio::test]
async fn clean_then_pipeline_then_command() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let root = dir.path();
    std::fs::create_dir_all(root.join("static/src"))?;
    std::fs::create_dir_all(root.join("static/dist"))?;
    std::fs::write(root.join("static/dist/stale.css"), "old")?;
    std::fs::write(root.join("static/src/a.css"), "a {}")?;
    std::fs::write(root.join("static/src/b.css"), "b {}")?;

    let (summaries, h) = run_once(root, &asset_config(), &["static:build"]).await?;

    assert_eq!(summaries.len(), 1);
    let summary = &summaries[0];
    assert!(summary.is_success(), "{summary:?}");
    // The missing literal source is a per-file error, not a failure.
    assert_eq!(summary.with_errors, vec![("static:css".to_string(), 1)]);

    assert!(!root.join("static/dist/stale.css").exists());
    assert_eq!(
        std::fs::read_to_string(root.join("static/dist/obijudge.css"))?,
        "a {}\nb {}"
    );
    assert!(root.join("built.txt").exists());

    assert_eq!(h.broadcaster.paths(), vec!["/static/dist/obijudge.css".to_string()]);
    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "Error (src)");
    Ok(())
}

#[tokio::test]
async fn failing_command_skips_dependents() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let cfg = ConfigFileBuilder::new()
        .with_task("fonts", TaskConfigBuilder::new().cmd("exit 3").build())
        .with_task(
            "static:build",
            TaskConfigBuilder::new().after("fonts").cmd("touch never.txt").build(),
        )
        .build();

    let (summaries, h) = run_once(dir.path(), &cfg, &["static:build"]).await?;

    let summary = &summaries[0];
    assert_eq!(summary.failed, vec!["fonts".to_string()]);
    assert_eq!(summary.skipped, vec!["static:build".to_string()]);
    assert!(!dir.path().join("never.txt").exists());
    assert_eq!(h.broadcaster.count(), 0);
    Ok(())
}

#[tokio::test]
async fn spawn_without_server_fails_the_task() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let cfg = ConfigFileBuilder::new()
        .with_server("./OBIJudge", &["run"], None)
        .with_task("spawn", TaskConfigBuilder::new().spawn().build())
        .build();

    let (summaries, _h) = run_once(dir.path(), &cfg, &["spawn"]).await?;
    assert_eq!(summaries[0].failed, vec!["spawn".to_string()]);
    Ok(())
}
