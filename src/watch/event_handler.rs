// src/watch/event_handler.rs

//! Turning one debounced batch of filesystem events into a run request.

use std::path::Path;

use notify::{Event, EventKind};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::engine::{RuntimeEvent, TaskName, TriggerReason};
use crate::watch::path_utils::relative_str;
use crate::watch::rules::WatchDispatcher;

/// Relative paths touched by `events`, skipping pure access events.
pub fn changed_paths(root: &Path, events: &[Event]) -> Vec<String> {
    let mut rels: Vec<String> = Vec::new();
    for event in events {
        if matches!(event.kind, EventKind::Access(_)) {
            continue;
        }
        for path in &event.paths {
            match relative_str(root, path) {
                Some(rel) if !rels.contains(&rel) => rels.push(rel),
                Some(_) => {}
                None => warn!(?path, ?root, "could not relativize path"),
            }
        }
    }
    rels
}

/// Tasks to request for a batch of changed paths.
pub fn tasks_for_batch(dispatcher: &WatchDispatcher, rel_paths: &[String]) -> Vec<TaskName> {
    dispatcher.tasks_for(rel_paths.iter().map(String::as_str))
}

/// Send at most one `RunRequested` for the batch. Returns `false` once the
/// runtime is gone.
pub async fn dispatch_batch(
    root: &Path,
    events: &[Event],
    dispatcher: &WatchDispatcher,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) -> bool {
    let rels = changed_paths(root, events);
    if rels.is_empty() {
        return true;
    }

    let tasks = tasks_for_batch(dispatcher, &rels);
    if tasks.is_empty() {
        debug!(paths = ?rels, "no watch rule matched");
        return true;
    }

    debug!(paths = ?rels, ?tasks, "watch match -> requesting run");
    runtime_tx
        .send(RuntimeEvent::RunRequested {
            tasks,
            reason: TriggerReason::FileWatch,
        })
        .await
        .is_ok()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use notify::event::{AccessKind, CreateKind, ModifyKind};

    use super::*;
    use crate::watch::WatchRule;

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    fn dispatcher() -> WatchDispatcher {
        let mut d = WatchDispatcher::new();
        d.add_rule(
            WatchRule::new(&["templates/src/*".to_string()], &[], vec!["static:build".into()])
                .unwrap(),
        );
        d
    }

    #[test]
    fn access_events_are_ignored() {
        let events = vec![
            event(EventKind::Access(AccessKind::Any), "/p/templates/src/a.html"),
            event(EventKind::Modify(ModifyKind::Any), "/p/templates/src/b.html"),
            event(EventKind::Create(CreateKind::File), "/p/templates/src/b.html"),
        ];
        assert_eq!(
            changed_paths(Path::new("/p"), &events),
            vec!["templates/src/b.html".to_string()]
        );
    }

    #[tokio::test]
    async fn one_batch_sends_one_request() {
        let (tx, mut rx) = mpsc::channel(4);
        let events = vec![
            event(EventKind::Modify(ModifyKind::Any), "/p/templates/src/a.html"),
            event(EventKind::Modify(ModifyKind::Any), "/p/templates/src/b.html"),
            event(EventKind::Modify(ModifyKind::Any), "/p/README.md"),
        ];
        assert!(dispatch_batch(Path::new("/p"), &events, &dispatcher(), &tx).await);
        drop(tx);

        match rx.recv().await {
            Some(RuntimeEvent::RunRequested { tasks, reason }) => {
                assert_eq!(tasks, vec!["static:build".to_string()]);
                assert_eq!(reason, TriggerReason::FileWatch);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn unmatched_batch_sends_nothing() {
        let (tx, mut rx) = mpsc::channel(4);
        let events = vec![event(EventKind::Modify(ModifyKind::Any), "/p/README.md")];
        assert!(dispatch_batch(Path::new("/p"), &events, &dispatcher(), &tx).await);
        drop(tx);
        assert!(rx.recv().await.is_none());
    }
}
