//! The task graph: registration, validation, and memoized task states.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::action::TaskAction;
use crate::error::EngineError;
use crate::executor::{ExecutorOptions, RunReport, TaskOutcome};
use crate::resolve::ResolvedSet;

/// Lifecycle of a task. `Succeeded`, `Failed` and `Skipped` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named unit of work with explicit predecessors.
#[derive(Clone)]
pub struct Task {
    pub name: String,
    pub predecessors: Vec<String>,
    pub action: Arc<dyn TaskAction>,
    /// Resolved dependencies of the build target this task works on.
    pub dependencies: Option<Arc<ResolvedSet>>,
    pub description: Option<String>,
}

impl Task {
    pub fn new(name: &str, action: impl TaskAction + 'static) -> Self {
        Self {
            name: name.to_owned(),
            predecessors: Vec::new(),
            action: Arc::new(action),
            dependencies: None,
            description: None,
        }
    }

    /// Builder method: this task runs only after `predecessor` succeeded.
    pub fn after(mut self, predecessor: &str) -> Self {
        if !self.predecessors.iter().any(|p| p == predecessor) {
            self.predecessors.push(predecessor.to_owned());
        }
        self
    }

    pub fn with_dependencies(mut self, dependencies: Arc<ResolvedSet>) -> Self {
        self.dependencies = Some(dependencies);
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_owned());
        self
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("predecessors", &self.predecessors)
            .field("action", &self.action.describe())
            .field("dependencies", &self.dependencies)
            .field("description", &self.description)
            .finish()
    }
}

/// Collects tasks; nothing is validated until [`TaskGraphBuilder::build`].
#[derive(Debug)]
pub struct TaskGraphBuilder {
    project_root: PathBuf,
    build_dir: PathBuf,
    tasks: Vec<Task>,
}

impl TaskGraphBuilder {
    pub fn new(project_root: &Path, build_dir: &Path) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            build_dir: build_dir.to_path_buf(),
            tasks: Vec::new(),
        }
    }

    pub fn register(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    /// Validate the registered tasks and freeze them into a graph.
    ///
    /// # Errors
    /// Returns `DuplicateTask`, `UnknownTask` or `CyclicDependency`. No action
    /// is invoked in any of these cases.
    pub fn build(self) -> Result<TaskGraph, EngineError> {
        let mut tasks: BTreeMap<String, Task> = BTreeMap::new();
        for task in self.tasks {
            if tasks.contains_key(&task.name) {
                return Err(EngineError::DuplicateTask {
                    name: task.name.clone(),
                });
            }
            tasks.insert(task.name.clone(), task);
        }

        for task in tasks.values() {
            if let Some(missing) = task
                .predecessors
                .iter()
                .find(|p| !tasks.contains_key(p.as_str()))
            {
                return Err(EngineError::UnknownTask {
                    name: missing.clone(),
                    referenced_by: Some(task.name.clone()),
                });
            }
        }

        let edges: BTreeMap<String, Vec<String>> = tasks
            .iter()
            .map(|(name, t)| (name.clone(), t.predecessors.clone()))
            .collect();
        let order = dependency_order(&edges).map_err(|cycle| EngineError::CyclicDependency {
            kind: "task",
            cycle,
        })?;

        let states = tasks
            .keys()
            .map(|name| (name.clone(), TaskState::Pending))
            .collect();

        tracing::debug!(tasks = tasks.len(), "task graph built");
        Ok(TaskGraph {
            project_root: self.project_root,
            build_dir: self.build_dir,
            tasks,
            order,
            states,
            outcomes: BTreeMap::new(),
        })
    }
}

/// A validated, acyclic task graph.
///
/// Terminal task states persist across [`TaskGraph::run`] calls, so a task
/// that already succeeded, failed or was skipped is never invoked again.
#[derive(Debug)]
pub struct TaskGraph {
    pub(crate) project_root: PathBuf,
    pub(crate) build_dir: PathBuf,
    pub(crate) tasks: BTreeMap<String, Task>,
    pub(crate) order: Vec<String>,
    pub(crate) states: BTreeMap<String, TaskState>,
    pub(crate) outcomes: BTreeMap<String, TaskOutcome>,
}

impl TaskGraph {
    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn state(&self, name: &str) -> Option<TaskState> {
        self.states.get(name).copied()
    }

    /// All task names, predecessors before dependents.
    pub fn execution_order(&self) -> &[String] {
        &self.order
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// `targets` plus all of their transitive predecessors, in execution order.
    ///
    /// # Errors
    /// Returns `UnknownTask` if a target is not registered.
    pub fn closure<S: AsRef<str>>(&self, targets: &[S]) -> Result<Vec<String>, EngineError> {
        let mut wanted: BTreeSet<&str> = BTreeSet::new();
        let mut stack: Vec<&str> = Vec::new();
        for target in targets {
            let target = target.as_ref();
            let Some((name, _)) = self.tasks.get_key_value(target) else {
                return Err(EngineError::UnknownTask {
                    name: target.to_owned(),
                    referenced_by: None,
                });
            };
            stack.push(name.as_str());
        }

        while let Some(name) = stack.pop() {
            if !wanted.insert(name) {
                continue;
            }
            if let Some(task) = self.tasks.get(name) {
                stack.extend(task.predecessors.iter().map(String::as_str));
            }
        }

        Ok(self
            .order
            .iter()
            .filter(|name| wanted.contains(name.as_str()))
            .cloned()
            .collect())
    }

    /// Run `targets` and everything they depend on.
    ///
    /// Unknown targets are rejected before anything runs. Task failures do
    /// not produce an `Err`; they are recorded in the returned report.
    ///
    /// # Errors
    /// Returns `UnknownTask` for an unregistered target and `WorkerPool` if
    /// the worker threads cannot be started.
    pub fn run<S: AsRef<str>>(
        &mut self,
        targets: &[S],
        options: &ExecutorOptions,
    ) -> Result<RunReport, EngineError> {
        let closure = self.closure(targets)?;
        crate::executor::execute(self, &closure, options)
    }
}

/// Order the nodes of `edges` (node -> predecessors) so that every node comes
/// after its predecessors. Predecessors missing from `edges` are ignored.
///
/// Returns the cycle as `"a -> b -> a"` if one exists.
pub(crate) fn dependency_order(edges: &BTreeMap<String, Vec<String>>) -> Result<Vec<String>, String> {
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut stack: Vec<&str> = Vec::new();
    let mut order: Vec<String> = Vec::with_capacity(edges.len());

    for node in edges.keys() {
        visit(node, edges, &mut marks, &mut stack, &mut order)?;
    }
    Ok(order)
}

/// Three-color marking: absent = white, `Visiting` = gray, `Done` = black.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

fn visit<'a>(
    node: &'a str,
    edges: &'a BTreeMap<String, Vec<String>>,
    marks: &mut HashMap<&'a str, Mark>,
    stack: &mut Vec<&'a str>,
    order: &mut Vec<String>,
) -> Result<(), String> {
    match marks.get(node) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            let start = stack.iter().position(|n| *n == node).unwrap_or(0);
            let mut cycle: Vec<&str> = stack.get(start..).unwrap_or(stack.as_slice()).to_vec();
            cycle.push(node);
            return Err(cycle.join(" -> "));
        }
        None => {}
    }

    marks.insert(node, Mark::Visiting);
    stack.push(node);
    if let Some(predecessors) = edges.get(node) {
        for pred in predecessors {
            if edges.contains_key(pred) {
                visit(pred, edges, marks, stack, order)?;
            }
        }
    }
    stack.pop();
    marks.insert(node, Mark::Done);
    order.push(node.to_owned());
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use proptest::prelude::*;

    use super::*;
    use crate::action::{ActionFailure, ActionOutput, NoopAction, TaskContext};

    fn edges(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(n, preds)| {
                (
                    (*n).to_owned(),
                    preds.iter().map(|p| (*p).to_owned()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn order_puts_predecessors_first() {
        let order = dependency_order(&edges(&[
            ("jar", &["compileJava"]),
            ("compileJava", &["spotlessApply"]),
            ("spotlessApply", &[]),
        ]))
        .unwrap();
        assert_eq!(order, vec!["spotlessApply", "compileJava", "jar"]);
    }

    #[test]
    fn order_reports_cycle() {
        let cycle = dependency_order(&edges(&[("a", &["b"]), ("b", &["a"])])).unwrap_err();
        assert_eq!(cycle, "a -> b -> a");
    }

    #[test]
    fn self_loop_is_cycle() {
        let cycle = dependency_order(&edges(&[("a", &["a"])])).unwrap_err();
        assert_eq!(cycle, "a -> a");
    }

    #[test]
    fn duplicate_task_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let err = TaskGraphBuilder::new(tmp.path(), tmp.path())
            .register(Task::new("jar", NoopAction::new("x")))
            .register(Task::new("jar", NoopAction::new("y")))
            .build()
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateTask { name } if name == "jar"));
    }

    #[test]
    fn unknown_predecessor_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let err = TaskGraphBuilder::new(tmp.path(), tmp.path())
            .register(Task::new("jar", NoopAction::new("x")).after("compileJava"))
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown task `compileJava` referenced by `jar`"
        );
    }

    #[test]
    fn cycle_rejected_before_any_action_runs() {
        let tmp = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counting = |calls: Arc<AtomicUsize>| {
            move |_: &TaskContext| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ActionFailure>(ActionOutput::default())
            }
        };

        let err = TaskGraphBuilder::new(tmp.path(), tmp.path())
            .register(Task::new("a", counting(Arc::clone(&calls))).after("b"))
            .register(Task::new("b", counting(Arc::clone(&calls))).after("a"))
            .build()
            .unwrap_err();

        assert!(err.to_string().contains("cyclic task dependency"), "{err}");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn closure_collects_transitive_predecessors() {
        let tmp = tempfile::tempdir().unwrap();
        let graph = TaskGraphBuilder::new(tmp.path(), tmp.path())
            .register(Task::new("spotlessApply", NoopAction::new("x")))
            .register(Task::new("compileJava", NoopAction::new("x")).after("spotlessApply"))
            .register(Task::new("jar", NoopAction::new("x")).after("compileJava"))
            .register(Task::new("javadoc", NoopAction::new("x")).after("compileJava"))
            .build()
            .unwrap();

        assert_eq!(
            graph.closure(&["jar"]).unwrap(),
            vec!["spotlessApply", "compileJava", "jar"]
        );
    }

    #[test]
    fn closure_rejects_unknown_target() {
        let tmp = tempfile::tempdir().unwrap();
        let graph = TaskGraphBuilder::new(tmp.path(), tmp.path())
            .register(Task::new("jar", NoopAction::new("x")))
            .build()
            .unwrap();
        let err = graph.closure(&["shadowJar"]).unwrap_err();
        assert_eq!(err.to_string(), "unknown task `shadowJar`");
    }

    #[test]
    fn new_graph_is_all_pending() {
        let tmp = tempfile::tempdir().unwrap();
        let graph = TaskGraphBuilder::new(tmp.path(), tmp.path())
            .register(Task::new("a", NoopAction::new("x")))
            .register(Task::new("b", NoopAction::new("x")).after("a"))
            .build()
            .unwrap();
        assert_eq!(graph.state("a"), Some(TaskState::Pending));
        assert_eq!(graph.state("b"), Some(TaskState::Pending));
        assert_eq!(graph.state("c"), None);
    }

    proptest! {
        #[test]
        fn dag_order_respects_every_edge(n in 1usize..12, seed in proptest::collection::vec(any::<bool>(), 0..144)) {
            // Edges only point from higher to lower index, so the graph is acyclic.
            let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for i in 0..n {
                let preds = (0..i)
                    .filter(|j| seed.get(i * n + j).copied().unwrap_or(false))
                    .map(|j| format!("t{j}"))
                    .collect();
                map.insert(format!("t{i}"), preds);
            }

            let order = dependency_order(&map).unwrap();
            prop_assert_eq!(order.len(), n);
            let position: HashMap<&str, usize> =
                order.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();
            for (node, preds) in &map {
                for pred in preds {
                    let before = position.get(pred.as_str()).unwrap();
                    let after = position.get(node.as_str()).unwrap();
                    prop_assert!(before < after);
                }
            }
        }
    }
}
