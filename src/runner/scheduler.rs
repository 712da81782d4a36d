//! Dependency scheduler: topological execution with maximum concurrency.
//!
//! Decision-making is single-threaded: one loop owns every DAG state
//! transition and receives step completions over a channel. Work is not:
//! every ready step is dispatched on its own worker thread the moment its
//! predecessors succeed, with no hard concurrency cap — the execution
//! environment's capacity governs.
//!
//! A step becomes ready only when all predecessors reached Success (or
//! failed with `allow_failure`). Any other terminal predecessor state
//! marks the step's transitive dependents Skipped without execution;
//! independent branches keep running. When the global deadline fires, no
//! further step is dispatched and in-flight steps resolve TimedOut.

use std::collections::{HashMap, VecDeque};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use tracing::{debug, warn};

use crate::runner::dependency::DependencyGraph;
use crate::steps::{ExecutionResult, ResolvedStep, StepResult};

/// Executes a single dispatched step.
///
/// Implementations must respect `deadline`: a step still running when it
/// passes is expected to terminate its work and report promptly.
pub trait StepRunner: Sync {
    fn run(&self, step: &ResolvedStep, deadline: Option<Instant>) -> StepResult;
}

/// What the scheduler resolved the DAG to.
#[derive(Debug)]
pub struct SchedulerOutcome {
    /// One terminal result per step, in declaration order.
    pub results: Vec<StepResult>,

    /// Whether the global deadline fired while steps were still pending
    /// or running.
    pub deadline_expired: bool,
}

impl SchedulerOutcome {
    /// Look up a step's result by id.
    pub fn result_of(&self, id: &str) -> Option<&StepResult> {
        self.results.iter().find(|r| r.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Slot {
    Pending,
    Running,
    Done,
}

/// Execute the DAG to completion.
///
/// Liveness: for any acyclic graph every step reaches a terminal result,
/// because each received completion either unlocks dependents or skips
/// them, and dispatched work always reports back.
pub fn execute(
    steps: &[ResolvedStep],
    graph: &DependencyGraph,
    runner: &dyn StepRunner,
    deadline: Option<Instant>,
) -> SchedulerOutcome {
    let index: HashMap<&str, &ResolvedStep> =
        steps.iter().map(|s| (s.id.as_str(), s)).collect();

    let mut in_degree: HashMap<&str, usize> = steps
        .iter()
        .map(|s| {
            let degree = graph.predecessors_of(&s.id).map_or(0, |p| p.len());
            (s.id.as_str(), degree)
        })
        .collect();

    let mut state: HashMap<&str, Slot> =
        steps.iter().map(|s| (s.id.as_str(), Slot::Pending)).collect();

    let mut completed: HashMap<String, StepResult> = HashMap::new();
    let mut deadline_expired = false;

    thread::scope(|scope| {
        let (tx, rx) = mpsc::channel::<StepResult>();
        let mut running = 0usize;

        let mut ready: VecDeque<&str> = steps
            .iter()
            .filter(|s| in_degree[s.id.as_str()] == 0)
            .map(|s| s.id.as_str())
            .collect();

        loop {
            // Single dispatch point. After the deadline fires, pending
            // steps resolve Skipped instead of starting.
            while let Some(id) = ready.pop_front() {
                if state[id] != Slot::Pending {
                    continue;
                }

                if deadline_expired {
                    state.insert(id, Slot::Done);
                    completed.insert(
                        id.to_string(),
                        StepResult::skipped(
                            id,
                            "pipeline deadline expired before step started".to_string(),
                        ),
                    );
                    continue;
                }

                debug!(step = id, "dispatching step");
                state.insert(id, Slot::Running);
                running += 1;

                let step = index[id];
                let tx = tx.clone();
                scope.spawn(move || {
                    let _ = tx.send(runner.run(step, deadline));
                });
            }

            if running == 0 {
                break;
            }

            let received = match deadline {
                Some(d) if !deadline_expired => {
                    let wait = d.saturating_duration_since(Instant::now());
                    match rx.recv_timeout(wait) {
                        Ok(result) => Some(result),
                        Err(mpsc::RecvTimeoutError::Timeout) => {
                            warn!("global deadline expired with steps still running");
                            deadline_expired = true;
                            None
                        }
                        Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    }
                }
                _ => match rx.recv() {
                    Ok(result) => Some(result),
                    Err(_) => break,
                },
            };

            let Some(mut result) = received else {
                continue;
            };
            running -= 1;

            // A step that was still in flight when the deadline fired is
            // timed out regardless of how its runner reported it.
            if deadline_expired {
                result = StepResult::timed_out(&result.id, result.duration);
            }

            let id = result.id.clone();
            let satisfied = result.execution.is_success()
                || (matches!(result.execution, ExecutionResult::Failure { .. })
                    && index.get(id.as_str()).is_some_and(|s| s.allow_failure));

            if let Some(slot) = state.get_mut(id.as_str()) {
                *slot = Slot::Done;
            }

            if satisfied {
                if let Some(dependents) = graph.dependents_of(&id) {
                    for dependent in dependents {
                        if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                            *degree = degree.saturating_sub(1);
                            if *degree == 0 {
                                // Re-borrow as a key of `state`, which owns
                                // &str slices tied to `steps`.
                                if let Some(step) = index.get(dependent.as_str()) {
                                    ready.push_back(step.id.as_str());
                                }
                            }
                        }
                    }
                }
            } else {
                for affected in graph.transitive_dependents(&id) {
                    let Some(step) = index.get(affected.as_str()) else {
                        continue;
                    };
                    let key = step.id.as_str();
                    if state[key] == Slot::Pending {
                        state.insert(key, Slot::Done);
                        completed.insert(
                            key.to_string(),
                            StepResult::skipped(
                                key,
                                format!("predecessor '{}' did not succeed", id),
                            ),
                        );
                    }
                }
            }

            completed.insert(id, result);
        }
    });

    // Anything still pending was starved by the deadline: dependents of
    // in-flight steps that never resolved to Success.
    for step in steps {
        if state[step.id.as_str()] == Slot::Pending {
            completed.insert(
                step.id.clone(),
                StepResult::skipped(
                    &step.id,
                    "pipeline deadline expired before step started".to_string(),
                ),
            );
        }
    }

    let results = steps
        .iter()
        .filter_map(|s| completed.remove(&s.id))
        .collect();

    SchedulerOutcome {
        results,
        deadline_expired,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::dependency::DependencyGraphBuilder;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted runner: per-step latency and outcome, with a dispatch log.
    struct ScriptedRunner {
        latency: HashMap<String, Duration>,
        failures: HashMap<String, i32>,
        dispatched: Mutex<Vec<(String, Instant)>>,
        honor_deadline: bool,
    }

    impl ScriptedRunner {
        fn new() -> Self {
            Self {
                latency: HashMap::new(),
                failures: HashMap::new(),
                dispatched: Mutex::new(Vec::new()),
                honor_deadline: true,
            }
        }

        fn with_latency(mut self, id: &str, latency: Duration) -> Self {
            self.latency.insert(id.to_string(), latency);
            self
        }

        fn with_failure(mut self, id: &str, exit_code: i32) -> Self {
            self.failures.insert(id.to_string(), exit_code);
            self
        }

        fn dispatch_times(&self) -> HashMap<String, Instant> {
            self.dispatched
                .lock()
                .unwrap()
                .iter()
                .cloned()
                .collect()
        }
    }

    impl StepRunner for ScriptedRunner {
        fn run(&self, step: &ResolvedStep, deadline: Option<Instant>) -> StepResult {
            let start = Instant::now();
            self.dispatched
                .lock()
                .unwrap()
                .push((step.id.clone(), start));

            let latency = self
                .latency
                .get(&step.id)
                .copied()
                .unwrap_or(Duration::from_millis(5));

            if self.honor_deadline {
                if let Some(d) = deadline {
                    if start + latency >= d {
                        std::thread::sleep(d.saturating_duration_since(start));
                        return StepResult::timed_out(&step.id, start.elapsed());
                    }
                }
            }
            std::thread::sleep(latency);

            match self.failures.get(&step.id) {
                Some(&code) => {
                    StepResult::failure(&step.id, start.elapsed(), Some(code), None)
                }
                None => StepResult::success(&step.id, start.elapsed()),
            }
        }
    }

    fn step(id: &str, wait_for: &[&str]) -> ResolvedStep {
        ResolvedStep {
            id: id.to_string(),
            unit: "test".to_string(),
            entrypoint: None,
            args: vec![],
            env: HashMap::new(),
            volumes: vec![],
            wait_for: wait_for.iter().map(|s| s.to_string()).collect(),
            starts_immediately: wait_for.is_empty(),
            allow_failure: false,
        }
    }

    fn build_graph(steps: &[ResolvedStep]) -> DependencyGraph {
        let mut builder = DependencyGraphBuilder::new();
        for s in steps {
            builder = builder.add_step(s.id.clone(), s.wait_for.clone());
        }
        builder.build().unwrap()
    }

    fn execution_of(outcome: &SchedulerOutcome, id: &str) -> ExecutionResult {
        outcome.result_of(id).unwrap().execution
    }

    #[test]
    fn empty_dag_resolves_immediately() {
        let steps: Vec<ResolvedStep> = vec![];
        let graph = build_graph(&steps);
        let runner = ScriptedRunner::new();

        let outcome = execute(&steps, &graph, &runner, None);

        assert!(outcome.results.is_empty());
        assert!(!outcome.deadline_expired);
    }

    #[test]
    fn every_step_reaches_a_terminal_result() {
        let steps = vec![
            step("a", &[]),
            step("b", &["a"]),
            step("c", &["a"]),
            step("d", &["b", "c"]),
        ];
        let graph = build_graph(&steps);
        let runner = ScriptedRunner::new();

        let outcome = execute(&steps, &graph, &runner, None);

        assert_eq!(outcome.results.len(), 4);
        for result in &outcome.results {
            assert_eq!(result.execution, ExecutionResult::Success);
        }
    }

    #[test]
    fn results_come_back_in_declaration_order() {
        let steps = vec![step("z", &[]), step("a", &["z"]), step("m", &["z"])];
        let graph = build_graph(&steps);
        let runner = ScriptedRunner::new();

        let outcome = execute(&steps, &graph, &runner, None);

        let ids: Vec<&str> = outcome.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
    }

    #[test]
    fn independent_roots_dispatch_concurrently() {
        let steps = vec![
            step("copy_config", &[]),
            step("copy_build_cache", &[]),
            step("decrypt_secrets", &[]),
        ];
        let graph = build_graph(&steps);
        let runner = ScriptedRunner::new()
            .with_latency("copy_config", Duration::from_millis(80))
            .with_latency("copy_build_cache", Duration::from_millis(80))
            .with_latency("decrypt_secrets", Duration::from_millis(80));

        let start = Instant::now();
        let outcome = execute(&steps, &graph, &runner, None);
        let elapsed = start.elapsed();

        assert!(outcome.results.iter().all(|r| r.execution.is_success()));
        // Serial execution would need ~240ms.
        assert!(
            elapsed < Duration::from_millis(200),
            "roots did not run concurrently: {:?}",
            elapsed
        );

        let times = runner.dispatch_times();
        let spread = [
            times["copy_config"],
            times["copy_build_cache"],
            times["decrypt_secrets"],
        ];
        let earliest = *spread.iter().min().unwrap();
        let latest = *spread.iter().max().unwrap();
        assert!(latest.duration_since(earliest) < Duration::from_millis(50));
    }

    #[test]
    fn dependent_waits_for_all_predecessors() {
        let steps = vec![
            step("decrypt_secrets", &[]),
            step("copy_build_cache", &[]),
            step("extract_build_cache", &["copy_build_cache"]),
            step("build", &["decrypt_secrets", "extract_build_cache"]),
        ];
        let graph = build_graph(&steps);
        let runner = ScriptedRunner::new()
            .with_latency("decrypt_secrets", Duration::from_millis(20))
            .with_latency("copy_build_cache", Duration::from_millis(40))
            .with_latency("extract_build_cache", Duration::from_millis(40));

        let outcome = execute(&steps, &graph, &runner, None);
        assert!(outcome.results.iter().all(|r| r.execution.is_success()));

        let times = runner.dispatch_times();
        assert!(times["build"] >= times["extract_build_cache"] + Duration::from_millis(40));
        assert!(times["build"] >= times["decrypt_secrets"] + Duration::from_millis(20));
    }

    #[test]
    fn failure_skips_transitive_dependents_only() {
        let steps = vec![
            step("build", &[]),
            step("unit_tests", &["build"]),
            step("deploy_to_play", &["unit_tests"]),
            step("deploy_to_beta", &["unit_tests"]),
            step("save_config", &[]),
        ];
        let graph = build_graph(&steps);
        let runner = ScriptedRunner::new()
            .with_failure("build", 1)
            .with_latency("save_config", Duration::from_millis(40));

        let outcome = execute(&steps, &graph, &runner, None);

        assert_eq!(
            execution_of(&outcome, "build"),
            ExecutionResult::Failure { exit_code: Some(1) }
        );
        assert_eq!(execution_of(&outcome, "unit_tests"), ExecutionResult::Skipped);
        assert_eq!(
            execution_of(&outcome, "deploy_to_play"),
            ExecutionResult::Skipped
        );
        assert_eq!(
            execution_of(&outcome, "deploy_to_beta"),
            ExecutionResult::Skipped
        );
        // Independent branch is unaffected.
        assert_eq!(execution_of(&outcome, "save_config"), ExecutionResult::Success);
    }

    #[test]
    fn skipped_steps_never_dispatch() {
        let steps = vec![step("a", &[]), step("b", &["a"]), step("c", &["b"])];
        let graph = build_graph(&steps);
        let runner = ScriptedRunner::new().with_failure("a", 2);

        let outcome = execute(&steps, &graph, &runner, None);

        assert_eq!(execution_of(&outcome, "b"), ExecutionResult::Skipped);
        assert_eq!(execution_of(&outcome, "c"), ExecutionResult::Skipped);

        let times = runner.dispatch_times();
        assert!(!times.contains_key("b"));
        assert!(!times.contains_key("c"));
    }

    #[test]
    fn skip_reason_names_the_failed_predecessor() {
        let steps = vec![step("build", &[]), step("unit_tests", &["build"])];
        let graph = build_graph(&steps);
        let runner = ScriptedRunner::new().with_failure("build", 1);

        let outcome = execute(&steps, &graph, &runner, None);

        let detail = outcome
            .result_of("unit_tests")
            .unwrap()
            .detail
            .clone()
            .unwrap();
        assert!(detail.contains("build"));
    }

    #[test]
    fn allow_failure_satisfies_dependents() {
        let mut lint = step("lint", &[]);
        lint.allow_failure = true;
        let steps = vec![lint, step("build", &["lint"])];
        let graph = build_graph(&steps);
        let runner = ScriptedRunner::new().with_failure("lint", 1);

        let outcome = execute(&steps, &graph, &runner, None);

        assert!(matches!(
            execution_of(&outcome, "lint"),
            ExecutionResult::Failure { .. }
        ));
        assert_eq!(execution_of(&outcome, "build"), ExecutionResult::Success);
    }

    #[test]
    fn deadline_times_out_running_and_skips_pending() {
        let steps = vec![step("slow", &[]), step("after", &["slow"])];
        let graph = build_graph(&steps);
        let runner = ScriptedRunner::new().with_latency("slow", Duration::from_secs(5));

        let deadline = Instant::now() + Duration::from_millis(100);
        let start = Instant::now();
        let outcome = execute(&steps, &graph, &runner, Some(deadline));

        assert!(outcome.deadline_expired);
        assert_eq!(execution_of(&outcome, "slow"), ExecutionResult::TimedOut);
        assert_eq!(execution_of(&outcome, "after"), ExecutionResult::Skipped);
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn deadline_overrides_late_success_reports() {
        // A runner that ignores the deadline and reports Success late
        // still counts as timed out: it was running when the deadline fired.
        let mut runner = ScriptedRunner::new().with_latency("slow", Duration::from_millis(300));
        runner.honor_deadline = false;

        let steps = vec![step("slow", &[])];
        let graph = build_graph(&steps);
        let deadline = Instant::now() + Duration::from_millis(50);

        let outcome = execute(&steps, &graph, &runner, Some(deadline));

        assert!(outcome.deadline_expired);
        assert_eq!(execution_of(&outcome, "slow"), ExecutionResult::TimedOut);
    }

    #[test]
    fn unrelated_branch_finishes_before_deadline_counts_as_success() {
        let steps = vec![step("fast", &[]), step("slow", &[])];
        let graph = build_graph(&steps);
        let runner = ScriptedRunner::new()
            .with_latency("fast", Duration::from_millis(10))
            .with_latency("slow", Duration::from_secs(5));

        let deadline = Instant::now() + Duration::from_millis(150);
        let outcome = execute(&steps, &graph, &runner, Some(deadline));

        assert_eq!(execution_of(&outcome, "fast"), ExecutionResult::Success);
        assert_eq!(execution_of(&outcome, "slow"), ExecutionResult::TimedOut);
    }
}
