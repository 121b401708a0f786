// src/watch/watcher.rs

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, RecommendedCache};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;
use crate::watch::event_handler::dispatch_batch;
use crate::watch::rules::WatchDispatcher;

/// Keeps the debounced watcher alive. Dropping it stops watching.
pub struct WatcherHandle {
    _inner: Debouncer<RecommendedWatcher, RecommendedCache>,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch `root` recursively and send one `RuntimeEvent::RunRequested` per
/// debounced batch whose paths match a rule of `dispatcher`.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    dispatcher: WatchDispatcher,
    debounce: Duration,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or(root);

    // Bridge from the debouncer thread into the async world.
    let (batch_tx, mut batch_rx) = mpsc::unbounded_channel();

    let mut debouncer = new_debouncer(debounce, None, move |res: DebounceEventResult| {
        match res {
            Ok(events) => {
                // Receiver gone means the runtime is shutting down.
                let _ = batch_tx.send(events);
            }
            Err(errors) => {
                for err in errors {
                    warn!(error = %err, "file watch error");
                }
            }
        }
    })
    .context("creating file watcher")?;

    debouncer
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("watching {}", root.display()))?;

    info!(root = ?root, rules = dispatcher.rules().len(), ?debounce, "file watcher started");

    tokio::spawn(async move {
        while let Some(batch) = batch_rx.recv().await {
            let events: Vec<Event> = batch.into_iter().map(|e| e.event).collect();
            debug!(count = events.len(), "debounced watch batch");
            if !dispatch_batch(&root, &events, &dispatcher, &runtime_tx).await {
                debug!("runtime gone; stopping watcher loop");
                break;
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: debouncer })
}
