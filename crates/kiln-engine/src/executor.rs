//! Parallel execution of a task graph closure.
//!
//! The calling thread schedules; actions run on a rayon thread pool and report
//! back over a channel. A task is dispatched only once every predecessor has
//! succeeded and fewer than `workers` actions are in flight.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::action::{ActionFailure, ActionOutput, TaskAction, TaskContext};
use crate::artifact::Product;
use crate::error::EngineError;
use crate::graph::{TaskGraph, TaskState};

/// What happens to independent work after a task fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop dispatching after the first failure; running tasks finish.
    #[default]
    FailFast,
    /// Keep running every task whose predecessors succeeded.
    Continue,
}

/// Options controlling a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorOptions {
    /// Maximum number of actions running at once. Zero is treated as one.
    pub workers: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().map_or(1, usize::from),
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Result of one task in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskOutcome {
    pub name: String,
    pub state: TaskState,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    /// Why the task failed, was skipped or did not run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
}

impl TaskOutcome {
    fn without_run(name: &str, state: TaskState, cause: String) -> Self {
        Self {
            name: name.to_owned(),
            state,
            duration_ms: 0,
            diagnostic: None,
            cause: Some(cause),
            product: None,
        }
    }
}

/// Outcomes of every task in a run, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<TaskOutcome>,
}

impl RunReport {
    pub fn outcome(&self, name: &str) -> Option<&TaskOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    pub fn state(&self, name: &str) -> Option<TaskState> {
        self.outcome(name).map(|o| o.state)
    }

    /// Tasks that ended `failed`.
    pub fn failures(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.state == TaskState::Failed)
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| o.state == TaskState::Succeeded)
    }

    pub fn count(&self, state: TaskState) -> usize {
        self.outcomes.iter().filter(|o| o.state == state).count()
    }

    /// Render the report as pretty JSON.
    ///
    /// # Errors
    /// Returns `EngineError::Report` if serialization fails.
    pub fn to_json(&self) -> Result<String, EngineError> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::Report {
            message: e.to_string(),
        })
    }
}

struct Completion {
    name: String,
    result: Result<ActionOutput, ActionFailure>,
    elapsed: Duration,
}

/// Run every non-terminal task in `closure` (already in execution order).
pub(crate) fn execute(
    graph: &mut TaskGraph,
    closure: &[String],
    options: &ExecutorOptions,
) -> Result<RunReport, EngineError> {
    let workers = options.workers.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("kiln-worker-{i}"))
        .build()
        .map_err(|e| EngineError::WorkerPool {
            message: e.to_string(),
        })?;

    let (tx, rx) = mpsc::channel::<Completion>();
    let mut in_flight = 0usize;
    let mut halted = false;

    tracing::debug!(tasks = closure.len(), workers, "starting run");

    loop {
        for name in closure {
            if graph.state(name) != Some(TaskState::Pending) {
                continue;
            }
            match readiness(graph, name) {
                Readiness::Blocked(cause) => {
                    tracing::info!(task = %name, %cause, "task skipped");
                    graph.states.insert(name.clone(), TaskState::Skipped);
                    graph.outcomes.insert(
                        name.clone(),
                        TaskOutcome::without_run(name, TaskState::Skipped, cause),
                    );
                }
                Readiness::Ready if !halted && in_flight < workers => {
                    if dispatch(graph, name, &pool, tx.clone()) {
                        in_flight += 1;
                    }
                }
                Readiness::Ready | Readiness::Waiting => {}
            }
        }

        if in_flight == 0 {
            break;
        }

        let completion = rx.recv().map_err(|e| EngineError::WorkerPool {
            message: e.to_string(),
        })?;
        in_flight -= 1;
        if record(graph, completion) == TaskState::Failed
            && options.failure_policy == FailurePolicy::FailFast
        {
            halted = true;
        }
    }

    let outcomes = closure
        .iter()
        .map(|name| {
            graph.outcomes.get(name).cloned().unwrap_or_else(|| {
                TaskOutcome::without_run(
                    name,
                    TaskState::Pending,
                    "not run: an earlier task failed".to_owned(),
                )
            })
        })
        .collect();
    Ok(RunReport { outcomes })
}

enum Readiness {
    Ready,
    Waiting,
    Blocked(String),
}

fn readiness(graph: &TaskGraph, name: &str) -> Readiness {
    let Some(task) = graph.tasks.get(name) else {
        return Readiness::Waiting;
    };
    let mut ready = true;
    for pred in &task.predecessors {
        match graph.state(pred) {
            Some(TaskState::Failed) => {
                return Readiness::Blocked(format!("predecessor `{pred}` failed"));
            }
            Some(TaskState::Skipped) => {
                return Readiness::Blocked(format!("predecessor `{pred}` was skipped"));
            }
            Some(TaskState::Succeeded) => {}
            _ => ready = false,
        }
    }
    if ready {
        Readiness::Ready
    } else {
        Readiness::Waiting
    }
}

fn dispatch(
    graph: &mut TaskGraph,
    name: &str,
    pool: &rayon::ThreadPool,
    tx: mpsc::Sender<Completion>,
) -> bool {
    let Some(task) = graph.tasks.get(name) else {
        return false;
    };
    let action: Arc<dyn TaskAction> = Arc::clone(&task.action);
    let ctx = TaskContext {
        task: name.to_owned(),
        project_root: graph.project_root.clone(),
        build_dir: graph.build_dir.clone(),
        output_dir: graph.build_dir.join(name),
        dependencies: task.dependencies.clone(),
    };
    graph.states.insert(name.to_owned(), TaskState::Running);
    tracing::info!(task = %name, "task started");

    pool.spawn(move || {
        let started = Instant::now();
        let result = run_action(action.as_ref(), &ctx);
        // A closed channel means the scheduler already returned.
        let _ = tx.send(Completion {
            name: ctx.task,
            result,
            elapsed: started.elapsed(),
        });
    });
    true
}

fn run_action(action: &dyn TaskAction, ctx: &TaskContext) -> Result<ActionOutput, ActionFailure> {
    std::fs::create_dir_all(&ctx.output_dir).map_err(|e| {
        ActionFailure::new(format!(
            "cannot create output directory {}: {e}",
            ctx.output_dir.display()
        ))
    })?;

    match catch_unwind(AssertUnwindSafe(|| action.execute(ctx))) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_owned());
            Err(ActionFailure::new(format!("task action panicked: {message}")))
        }
    }
}

fn record(graph: &mut TaskGraph, completion: Completion) -> TaskState {
    let duration_ms = u64::try_from(completion.elapsed.as_millis()).unwrap_or(u64::MAX);
    let outcome = match completion.result {
        Ok(output) => {
            tracing::info!(task = %completion.name, duration_ms, "task succeeded");
            TaskOutcome {
                name: completion.name.clone(),
                state: TaskState::Succeeded,
                duration_ms,
                diagnostic: output.diagnostic,
                cause: None,
                product: output.product,
            }
        }
        Err(failure) => {
            tracing::warn!(task = %completion.name, error = %failure, "task failed");
            TaskOutcome {
                name: completion.name.clone(),
                state: TaskState::Failed,
                duration_ms,
                diagnostic: failure.diagnostic,
                cause: Some(failure.message),
                product: None,
            }
        }
    };
    let state = outcome.state;
    graph.states.insert(completion.name.clone(), state);
    graph.outcomes.insert(completion.name, outcome);
    state
}
