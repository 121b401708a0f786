// src/engine/queue.rs

use std::collections::{BTreeSet, VecDeque};

use tracing::debug;

use crate::engine::TaskName;
use crate::types::TriggerWhileRunningBehaviour;

/// Requests that arrive for tasks which already started in the active run.
///
/// Each entry is a *batch* of task names that becomes one future run.
/// `max_runs` (`[config].queue_length`) bounds the number of batches; the
/// default of 1 means repeated triggers coalesce into a single pending rerun.
///
/// - `Queue`: a batch whose tasks are all already queued is dropped; when the
///   queue is full the batch is merged into the last one, so no trigger is
///   ever lost.
/// - `Cancel`: only the latest batch is kept.
#[derive(Debug)]
pub struct TriggerQueue {
    behaviour: TriggerWhileRunningBehaviour,
    max_runs: usize,
    runs: VecDeque<BTreeSet<TaskName>>,
}

impl TriggerQueue {
    /// `max_runs` is clamped to at least 1.
    pub fn new(behaviour: TriggerWhileRunningBehaviour, max_runs: usize) -> Self {
        Self {
            behaviour,
            max_runs: max_runs.max(1),
            runs: VecDeque::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Number of pending runs.
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Remember `tasks` for a future run.
    pub fn record_batch(&mut self, tasks: Vec<TaskName>) {
        if tasks.is_empty() {
            return;
        }
        let batch: BTreeSet<TaskName> = tasks.into_iter().collect();

        match self.behaviour {
            TriggerWhileRunningBehaviour::Queue => {
                if self.runs.iter().any(|queued| batch.is_subset(queued)) {
                    debug!(tasks = ?batch, "coalesced into an already queued run");
                    return;
                }
                if self.runs.len() < self.max_runs {
                    debug!(tasks = ?batch, queued = self.runs.len() + 1, "queued run");
                    self.runs.push_back(batch);
                } else if let Some(last) = self.runs.back_mut() {
                    debug!(tasks = ?batch, "queue full; merged into last queued run");
                    last.extend(batch);
                }
            }
            TriggerWhileRunningBehaviour::Cancel => {
                debug!(tasks = ?batch, "replacing queued runs with the latest request");
                self.runs.clear();
                self.runs.push_back(batch);
            }
        }
    }

    /// Take the oldest pending batch, if any.
    pub fn next_batch(&mut self) -> Option<Vec<TaskName>> {
        self.runs.pop_front().map(|b| b.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(names: &[&str]) -> Vec<TaskName> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn repeated_triggers_coalesce_to_one_rerun() {
        let mut q = TriggerQueue::new(TriggerWhileRunningBehaviour::Queue, 1);
        q.record_batch(batch(&["spawn"]));
        q.record_batch(batch(&["spawn"]));
        q.record_batch(batch(&["static:css"]));
        assert_eq!(q.len(), 1);
        assert_eq!(q.next_batch(), Some(batch(&["spawn", "static:css"])));
        assert!(q.is_empty());
    }

    #[test]
    fn longer_queue_keeps_batches_in_order() {
        let mut q = TriggerQueue::new(TriggerWhileRunningBehaviour::Queue, 2);
        q.record_batch(batch(&["a"]));
        q.record_batch(batch(&["b"]));
        q.record_batch(batch(&["a"]));
        assert_eq!(q.next_batch(), Some(batch(&["a"])));
        assert_eq!(q.next_batch(), Some(batch(&["b"])));
        assert_eq!(q.next_batch(), None);
    }

    #[test]
    fn cancel_keeps_only_latest() {
        let mut q = TriggerQueue::new(TriggerWhileRunningBehaviour::Cancel, 3);
        q.record_batch(batch(&["a"]));
        q.record_batch(batch(&["b"]));
        assert_eq!(q.next_batch(), Some(batch(&["b"])));
        assert!(q.is_empty());
    }
}
