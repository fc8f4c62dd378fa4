//! The task action boundary and the built-in actions.

#[cfg(test)]
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use kiln_util::archive::{write_jar, ArchiveEntry};

use crate::artifact::{Classifier, Product};
use crate::resolve::ResolvedSet;

/// Number of output lines kept as a task's diagnostic.
const DIAGNOSTIC_LINES: usize = 20;

/// What an action is handed when it runs.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Name of the running task.
    pub task: String,
    pub project_root: PathBuf,
    pub build_dir: PathBuf,
    /// Directory owned by this task alone; created before the action runs.
    pub output_dir: PathBuf,
    /// Resolved dependency set of the task's build target, if it has one.
    pub dependencies: Option<Arc<ResolvedSet>>,
}

impl TaskContext {
    /// Output directory of another task.
    pub fn output_of(&self, task: &str) -> PathBuf {
        self.build_dir.join(task)
    }
}

/// Successful result of an action.
#[derive(Debug, Clone, Default)]
pub struct ActionOutput {
    pub diagnostic: Option<String>,
    /// Archive or metadata file the action wrote, if any.
    pub product: Option<Product>,
}

impl ActionOutput {
    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostic = Some(diagnostic.into());
        self
    }

    pub fn with_product(mut self, product: Product) -> Self {
        self.product = Some(product);
        self
    }
}

/// An action reported failure. The task ends `failed` and its dependents `skipped`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ActionFailure {
    pub message: String,
    /// Tool output that explains the failure.
    pub diagnostic: Option<String>,
}

impl ActionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            diagnostic: None,
        }
    }
}

/// A unit of work run by the executor, possibly on a worker thread.
pub trait TaskAction: Send + Sync {
    /// Run the action.
    ///
    /// # Errors
    /// Returns an `ActionFailure` when the underlying tool reports failure.
    fn execute(&self, ctx: &TaskContext) -> Result<ActionOutput, ActionFailure>;

    /// Short human-readable description, shown by `kiln graph`.
    fn describe(&self) -> String {
        "custom action".to_owned()
    }
}

impl<F> TaskAction for F
where
    F: Fn(&TaskContext) -> Result<ActionOutput, ActionFailure> + Send + Sync,
{
    fn execute(&self, ctx: &TaskContext) -> Result<ActionOutput, ActionFailure> {
        self(ctx)
    }
}

/// Runs an external program (compiler, formatter, linter, doc generator).
///
/// `{out}`, `{build}` and `{project}` in arguments are replaced by the task's
/// output directory, the build directory and the project root. The program
/// runs in the project root with `KILN_TASK`, `KILN_OUTPUT_DIR` and
/// `KILN_DEPENDENCIES` set.
#[derive(Debug, Clone)]
pub struct CommandAction {
    program: String,
    args: Vec<String>,
}

impl CommandAction {
    /// Build from a non-empty argv; `None` when `argv` is empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn substitute(arg: &str, ctx: &TaskContext) -> String {
        arg.replace("{out}", &ctx.output_dir.display().to_string())
            .replace("{build}", &ctx.build_dir.display().to_string())
            .replace("{project}", &ctx.project_root.display().to_string())
    }
}

impl TaskAction for CommandAction {
    fn execute(&self, ctx: &TaskContext) -> Result<ActionOutput, ActionFailure> {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args.iter().map(|a| Self::substitute(a, ctx)))
            .current_dir(&ctx.project_root)
            .env("KILN_TASK", &ctx.task)
            .env("KILN_OUTPUT_DIR", &ctx.output_dir)
            .env(
                "KILN_DEPENDENCIES",
                ctx.dependencies
                    .as_deref()
                    .map(ResolvedSet::to_env_value)
                    .unwrap_or_default(),
            );

        let output = kiln_util::process::run_command(&mut cmd)
            .map_err(|e| ActionFailure::new(e.to_string()))?;

        if !output.success {
            let status = output
                .exit_code
                .map_or_else(|| "a signal".to_owned(), |c| format!("code {c}"));
            return Err(ActionFailure {
                message: format!("`{}` exited with {status}", self.program),
                diagnostic: Some(output.tail(DIAGNOSTIC_LINES)).filter(|d| !d.is_empty()),
            });
        }

        let mut result = ActionOutput::default();
        if !output.stderr.trim().is_empty() {
            result = result.with_diagnostic(output.tail(DIAGNOSTIC_LINES));
        }
        Ok(result)
    }

    fn describe(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Where an archive takes its files from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveInput {
    /// Directory relative to the project root.
    Project(PathBuf),
    /// Output directory of a predecessor task.
    TaskOutput(String),
}

impl ArchiveInput {
    /// Parse a `from` entry: `task:<name>` or a project-relative path.
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix("task:") {
            Some(task) => Self::TaskOutput(task.to_owned()),
            None => Self::Project(PathBuf::from(raw)),
        }
    }

    fn directory(&self, ctx: &TaskContext) -> PathBuf {
        match self {
            Self::Project(rel) => ctx.project_root.join(rel),
            Self::TaskOutput(task) => ctx.output_of(task),
        }
    }
}

/// Writes `{base}-{version}[-{classifier}].jar` into the task's output directory.
#[derive(Debug, Clone)]
pub struct ArchiveAction {
    pub inputs: Vec<ArchiveInput>,
    /// Glob applied inside every input directory.
    pub include: String,
    pub base_name: String,
    pub version: String,
    pub classifier: Option<Classifier>,
}

impl ArchiveAction {
    fn collect_entries(&self, ctx: &TaskContext) -> Result<Vec<ArchiveEntry>, ActionFailure> {
        let mut entries = Vec::new();
        for input in &self.inputs {
            let dir = input.directory(ctx);
            let files = kiln_util::fs::glob_relative(&dir, &self.include)
                .map_err(|e| ActionFailure::new(e.to_string()))?;
            entries.extend(files.iter().map(|rel| ArchiveEntry::under(&dir, rel)));
        }
        Ok(entries)
    }
}

impl TaskAction for ArchiveAction {
    fn execute(&self, ctx: &TaskContext) -> Result<ActionOutput, ActionFailure> {
        let product = Product {
            path: PathBuf::new(),
            base_name: self.base_name.clone(),
            version: self.version.clone(),
            classifier: self.classifier,
            extension: "jar".to_owned(),
        };
        let dest = ctx.output_dir.join(product.file_name());
        let entries = self.collect_entries(ctx)?;

        write_jar(&dest, &entries).map_err(|e| ActionFailure::new(e.to_string()))?;
        tracing::debug!(task = %ctx.task, entries = entries.len(), path = %dest.display(), "archive written");

        Ok(ActionOutput::default()
            .with_diagnostic(format!("{} entries", entries.len()))
            .with_product(Product {
                path: dest,
                ..product
            }))
    }

    fn describe(&self) -> String {
        let label = match self.classifier {
            Some(c) => format!("{}-{}-{c}.jar", self.base_name, self.version),
            None => format!("{}-{}.jar", self.base_name, self.version),
        };
        format!("archive {label}")
    }
}

/// Stands in for a disabled or purely aggregating task.
#[derive(Debug, Clone)]
pub struct NoopAction {
    reason: String,
}

impl NoopAction {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl TaskAction for NoopAction {
    fn execute(&self, _ctx: &TaskContext) -> Result<ActionOutput, ActionFailure> {
        Ok(ActionOutput::default().with_diagnostic(self.reason.clone()))
    }

    fn describe(&self) -> String {
        format!("no-op ({})", self.reason)
    }
}

/// Context for running an action outside the executor.
#[cfg(test)]
pub(crate) fn context_for(task: &str, project_root: &Path, build_dir: &Path) -> TaskContext {
    TaskContext {
        task: task.to_owned(),
        project_root: project_root.to_path_buf(),
        build_dir: build_dir.to_path_buf(),
        output_dir: build_dir.join(task),
        dependencies: None,
    }
}
