use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use devpipe::dag::ScheduledTask;
use devpipe::engine::{RuntimeEvent, TaskOutcome};
use devpipe::exec::{BackendFuture, ExecutorBackend};
use tokio::sync::mpsc;

type Shared<T> = Arc<Mutex<T>>;

/// Executor that runs nothing. Every dispatched task completes at once with
/// `Success`, or with the outcome registered through [`FakeExecutor::with_outcome`].
#[derive(Debug)]
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    outcomes: HashMap<String, TaskOutcome>,
    executed: Shared<Vec<String>>,
    batches: Shared<Vec<Vec<String>>>,
    shutdowns: Shared<usize>,
}

impl FakeExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            runtime_tx,
            outcomes: HashMap::new(),
            executed: Shared::default(),
            batches: Shared::default(),
            shutdowns: Shared::default(),
        }
    }

    pub fn with_outcome(mut self, task: &str, outcome: TaskOutcome) -> Self {
        self.outcomes.insert(task.to_string(), outcome);
        self
    }

    /// Every dispatched task name, in dispatch order.
    pub fn executed(&self) -> Shared<Vec<String>> {
        Arc::clone(&self.executed)
    }

    /// Dispatched task names grouped per `spawn_ready_tasks` call.
    pub fn batches(&self) -> Shared<Vec<Vec<String>>> {
        Arc::clone(&self.batches)
    }

    /// How often `shutdown` was called.
    pub fn shutdowns(&self) -> Shared<usize> {
        Arc::clone(&self.shutdowns)
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(&mut self, tasks: Vec<ScheduledTask>) -> BackendFuture<'_> {
        Box::pin(async move {
            let names: Vec<String> = tasks.into_iter().map(|t| t.name).collect();
            self.batches.lock().unwrap().push(names.clone());
            self.executed.lock().unwrap().extend(names.iter().cloned());

            for task in names {
                let outcome = self
                    .outcomes
                    .get(&task)
                    .copied()
                    .unwrap_or(TaskOutcome::Success);
                self.runtime_tx
                    .send(RuntimeEvent::TaskCompleted { task, outcome })
                    .await
                    .map_err(|e| anyhow::anyhow!("runtime channel closed: {e}"))?;
            }
            Ok(())
        })
    }

    fn shutdown(&mut self) -> BackendFuture<'_> {
        *self.shutdowns.lock().unwrap() += 1;
        Box::pin(async { Ok(()) })
    }
}
