// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod env;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod notifier;
pub mod pipeline;
pub mod reload;
pub mod supervisor;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dag::{RunSummary, Scheduler, TaskRegistry};
use crate::engine::{CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions, TriggerReason};
use crate::env::Environment;
use crate::errors::{DevpipeError, Result};
use crate::exec::{ExecutorContext, RealExecutorBackend};
use crate::fs::RealFileSystem;
use crate::notifier::{CommandNotifier, LogNotifier, Notifier};
use crate::pipeline::WriteCache;
use crate::reload::{DisabledBroadcaster, LiveReloadServer, ReloadBroadcaster};
use crate::supervisor::{CommandLauncher, ConsoleLogSink, Supervisor};
use crate::watch::WatchDispatcher;

/// High-level entry point used by `main.rs`.
///
/// Wires config, task registry, scheduler, executor, supervisor, reload
/// server, watcher and Ctrl-C handling together. With `--once` the requested
/// group runs a single time and any failed or skipped task is an error.
pub async fn run(args: CliArgs) -> Result<()> {
    // `.env` may set DEVPIPE_ENV, so it must be loaded before resolving.
    if let Ok(path) = dotenvy::dotenv() {
        debug!(path = ?path, "loaded .env");
    }

    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let registry = TaskRegistry::from_config(&cfg)?;
    let env = Environment::resolve();

    if args.list {
        print_task_list(&registry);
        return Ok(());
    }
    if args.dry_run {
        print_dry_run(&cfg, &registry, env);
        return Ok(());
    }

    let requested = requested_tasks(&args, &cfg, &registry)?;
    let root = config_root_dir(&config_path);
    info!(env = %env, root = ?root, tasks = ?requested, "devpipe starting");

    let notifier: Arc<dyn Notifier> = match &cfg.notify().cmd {
        Some(cmd) => Arc::new(CommandNotifier::new(cmd.clone())),
        None => Arc::new(LogNotifier),
    };
    let broadcaster = reload_broadcaster(&cfg, args.once).await?;

    let supervisor = cfg.server().map(|server| {
        Supervisor::new(
            server.clone(),
            env,
            root.clone(),
            Arc::new(CommandLauncher),
            Arc::clone(&broadcaster),
            Arc::new(ConsoleLogSink),
        )
    });

    let ctx = ExecutorContext {
        root: root.clone(),
        env,
        fs: Arc::new(RealFileSystem),
        notifier,
        broadcaster,
        cache: Arc::new(WriteCache::new()),
    };

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let executor = RealExecutorBackend::new(ctx, supervisor, rt_tx.clone());

    let _watcher_handle = if args.once {
        None
    } else {
        let dispatcher = WatchDispatcher::from_config(&cfg)?;
        if dispatcher.is_empty() {
            info!("no watch rules configured");
        }
        Some(crate::watch::spawn_watcher(
            root,
            dispatcher,
            Duration::from_millis(cfg.settings().debounce_ms),
            rt_tx.clone(),
        )?)
    };

    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received; shutting down");
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    rt_tx
        .send(RuntimeEvent::RunRequested {
            tasks: requested,
            reason: TriggerReason::Manual,
        })
        .await
        .map_err(|_| anyhow!("runtime channel closed before start"))?;

    let options = RuntimeOptions {
        exit_when_idle: args.once,
    };
    let settings = cfg.settings();
    let core = CoreRuntime::new(
        Scheduler::new(registry),
        settings.triggered_while_running_behaviour,
        settings.queue_length,
        options,
    );

    let summaries = Runtime::new(core, rt_rx, executor).run().await?;

    if args.once {
        check_once_result(&summaries)?;
    }
    Ok(())
}

/// Tasks named on the command line, or `[config].default_tasks`.
fn requested_tasks(args: &CliArgs, cfg: &ConfigFile, registry: &TaskRegistry) -> Result<Vec<String>> {
    let tasks = if args.tasks.is_empty() {
        cfg.settings().default_tasks.clone()
    } else {
        args.tasks.clone()
    };

    if tasks.is_empty() {
        return Err(DevpipeError::ConfigError(
            "no tasks given and [config].default_tasks is empty".to_string(),
        ));
    }
    if let Some(unknown) = tasks.iter().find(|t| !registry.contains(t)) {
        return Err(DevpipeError::TaskNotFound(unknown.clone()));
    }
    Ok(tasks)
}

async fn reload_broadcaster(cfg: &ConfigFile, once: bool) -> Result<Arc<dyn ReloadBroadcaster>> {
    let lr = cfg.livereload();
    if !lr.enabled || once {
        return Ok(Arc::new(DisabledBroadcaster));
    }

    let addr = tokio::net::lookup_host((lr.host.as_str(), lr.port))
        .await
        .with_context(|| format!("resolving livereload host '{}'", lr.host))?
        .next()
        .ok_or_else(|| anyhow!("livereload host '{}' resolved to no address", lr.host))?;

    Ok(Arc::new(LiveReloadServer::bind(addr).await?))
}

/// Fail if any run of a `--once` invocation did not fully succeed.
fn check_once_result(summaries: &[RunSummary]) -> Result<()> {
    let mut failed = Vec::new();
    let mut skipped = Vec::new();
    for s in summaries.iter().filter(|s| !s.is_success()) {
        failed.extend(s.failed.iter().cloned());
        skipped.extend(s.skipped.iter().cloned());
    }
    if failed.is_empty() && skipped.is_empty() {
        return Ok(());
    }
    Err(DevpipeError::RunFailed { failed, skipped })
}

/// Directory that relative paths in the config resolve against: the config
/// file's parent, or the working directory for a bare file name.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn print_task_list(registry: &TaskRegistry) {
    for name in registry.tasks() {
        let deps = registry.dependencies_of(name);
        if deps.is_empty() {
            println!("{name}");
        } else {
            println!("{name} <- {}", deps.join(", "));
        }
    }
}

fn print_dry_run(cfg: &ConfigFile, registry: &TaskRegistry, env: Environment) {
    let settings = cfg.settings();
    println!("devpipe dry-run");
    println!("  environment = {env}");
    println!(
        "  config.triggered_while_running_behaviour = {:?}",
        settings.triggered_while_running_behaviour
    );
    println!("  config.queue_length = {}", settings.queue_length);
    println!("  config.debounce_ms = {}", settings.debounce_ms);
    println!("  config.default_tasks = {:?}", settings.default_tasks);
    if let Some(server) = cfg.server() {
        println!("  server = {} {}", server.cmd, server.args_for(env).join(" "));
    }
    println!();

    println!("tasks ({}):", registry.len());
    for name in registry.tasks() {
        println!("  - {name}");
        let deps = registry.dependencies_of(name);
        if !deps.is_empty() {
            println!("      after: {deps:?}");
        }
        if let Some(action) = registry.action_of(name) {
            println!("      action: {}", action.describe());
            for p in &action.pipelines {
                for stage in &p.stages {
                    let state = if stage.participates(env) { "active" } else { "gated out" };
                    match stage.gate() {
                        Some(gate) => println!("      stage {} ({gate}): {state}", stage.name()),
                        None => println!("      stage {}: {state}", stage.name()),
                    }
                }
            }
        }
    }

    println!();
    println!("watch rules ({}):", cfg.watch_rules().len());
    for rule in cfg.watch_rules() {
        println!("  - {:?} -> {:?}", rule.patterns, rule.tasks);
        if !rule.exclude.is_empty() {
            println!("      exclude: {:?}", rule.exclude);
        }
    }

    debug!("dry-run complete (no execution)");
}
