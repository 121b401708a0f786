// tests/scheduler_property.rs

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;

use devpipe::config::ConfigFile;
use devpipe::dag::{Scheduler, TaskRegistry, TaskRunState};
use devpipe::engine::TaskOutcome;
use devpipe_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};

// Acyclic by construction: task N may only depend on tasks 0..N-1.
fn dag_config_strategy(max_tasks: usize) -> impl Strategy<Value = ConfigFile> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        )
        .prop_map(move |raw_deps| {
            let mut builder = ConfigFileBuilder::new();
            for (i, potential_deps) in raw_deps.into_iter().enumerate() {
                let name = format!("task_{i}");
                let mut task = TaskConfigBuilder::new().cmd(&format!("echo {name}"));

                let mut valid = HashSet::new();
                for dep in potential_deps {
                    if i > 0 {
                        valid.insert(dep % i);
                    }
                }
                for dep in valid {
                    task = task.after(&format!("task_{dep}"));
                }
                builder = builder.with_task(&name, task.build());
            }
            builder.build()
        })
    })
}

proptest! {
    #[test]
    fn every_run_terminates_and_respects_dependencies(
        cfg in dag_config_strategy(10),
        requested in proptest::collection::vec(0..10usize, 1..4),
        failing in proptest::collection::vec(0..10usize, 0..3),
    ) {
        let registry = TaskRegistry::from_config(&cfg).unwrap();
        let deps: HashMap<String, Vec<String>> = registry
            .tasks()
            .into_iter()
            .map(|t| (t.to_string(), registry.dependencies_of(t).to_vec()))
            .collect();
        let mut scheduler = Scheduler::new(registry);
        let names: Vec<String> = scheduler.task_names().iter().map(|s| s.to_string()).collect();

        let requested: Vec<String> = requested
            .iter()
            .filter(|&&i| i < names.len())
            .map(|&i| names[i].clone())
            .collect();
        prop_assume!(!requested.is_empty());
        let failing: HashSet<String> = failing
            .iter()
            .filter(|&&i| i < names.len())
            .map(|&i| names[i].clone())
            .collect();

        let mut outcomes: HashMap<String, TaskOutcome> = HashMap::new();
        let mut running: Vec<String> = scheduler
            .handle_request(&requested)
            .into_iter()
            .map(|t| t.name)
            .collect();
        let mut finished = None;
        let mut steps = 0;

        while let Some(task) = running.pop() {
            steps += 1;
            prop_assert!(steps <= 100, "scheduler did not converge");

            // A task only starts once every dependency succeeded.
            for dep in &deps[&task] {
                prop_assert!(
                    outcomes.get(dep).is_some_and(|o| o.satisfies_dependents()),
                    "{task} started before {dep} succeeded"
                );
            }

            let outcome = if failing.contains(&task) {
                TaskOutcome::Failed(1)
            } else {
                TaskOutcome::Success
            };
            outcomes.insert(task.clone(), outcome);

            let step = scheduler.step_completion(&task, outcome);
            running.extend(step.newly_scheduled.into_iter().map(|t| t.name));
            if step.finished.is_some() {
                finished = step.finished;
            }
        }

        let summary = finished.expect("run must finish once nothing is running");
        prop_assert!(scheduler.is_idle());

        // Requested tasks end up in exactly one bucket of the summary.
        for task in &requested {
            let buckets = [
                summary.succeeded.contains(task),
                summary.failed.contains(task),
                summary.skipped.contains(task),
            ];
            prop_assert_eq!(buckets.iter().filter(|b| **b).count(), 1);
        }
        prop_assert_eq!(summary.is_success(), summary.failed.is_empty());

        for name in &names {
            prop_assert_ne!(scheduler.run_state_of(name), Some(TaskRunState::Pending));
            prop_assert_ne!(scheduler.run_state_of(name), Some(TaskRunState::Running));
        }
    }
}
