#![forbid(unsafe_code)]

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kiln_config::manifest::{Manifest, MANIFEST_FILE};
use kiln_engine::diagnostics::{print_report, summary};
use kiln_engine::signing::SigningError;
use kiln_engine::{EngineError, ExecutorOptions, FailurePolicy, Pipeline, PipelineOutcome};

type CliResult = Result<(), Box<dyn Error>>;

/// Exit code for task failures and runtime errors.
const EXIT_FAILED: i32 = 1;
/// Exit code for configuration errors detected before anything ran.
const EXIT_CONFIG: i32 = 2;
/// Exit code for a release that requires signing but has no signing key.
const EXIT_SIGNING: i32 = 3;

#[derive(Debug, Parser)]
#[command(name = "kiln", about = "Build and release orchestration for JVM libraries")]
#[command(version)]
struct Cli {
    /// Show debug logs and tool output of successful tasks
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a new Kiln project
    Init {
        /// Project name (defaults to the current directory's name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Run tasks and everything they depend on
    Run {
        /// Tasks to run
        #[arg(required = true)]
        tasks: Vec<String>,
        #[command(flatten)]
        exec: ExecArgs,
        /// Print the run report as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Build, sign and publish the library
    Release {
        #[command(flatten)]
        exec: ExecArgs,
    },
    /// Print the validated task execution order
    Graph {
        /// Option override, e.g. `-P dev=true` (repeatable)
        #[arg(short = 'P', value_name = "KEY=VALUE")]
        properties: Vec<String>,
    },
    /// Print the resolved dependencies of a build target
    Deps {
        /// Build target name, e.g. `main`
        target: String,
    },
    /// Remove the build directory
    Clean,
}

#[derive(Debug, Args)]
struct ExecArgs {
    /// Maximum number of tasks running at once (defaults to available cores)
    #[arg(long)]
    workers: Option<usize>,
    /// Keep running independent tasks after a failure
    #[arg(long = "continue")]
    keep_going: bool,
    /// Do everything except uploading
    #[arg(long)]
    dry_run: bool,
    /// Option override, e.g. `-P dev=true` (repeatable)
    #[arg(short = 'P', value_name = "KEY=VALUE")]
    properties: Vec<String>,
}

impl ExecArgs {
    fn executor(&self) -> ExecutorOptions {
        let defaults = ExecutorOptions::default();
        ExecutorOptions {
            workers: self.workers.unwrap_or(defaults.workers),
            failure_policy: if self.keep_going {
                FailurePolicy::Continue
            } else {
                FailurePolicy::FailFast
            },
        }
    }

    fn overrides(&self) -> Vec<String> {
        let mut overrides = self.properties.clone();
        if self.dry_run {
            overrides.push(format!("{}=true", kiln_config::options::DRY_RUN));
        }
        overrides
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let verbose = cli.verbose;
    let result = match cli.command {
        Command::Init { name } => cmd_init(name),
        Command::Run { tasks, exec, json } => cmd_run(&tasks, &exec, json, verbose),
        Command::Release { exec } => cmd_release(&exec, verbose),
        Command::Graph { properties } => cmd_graph(&properties),
        Command::Deps { target } => cmd_deps(&target),
        Command::Clean => cmd_clean(),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        process::exit(exit_code(&*err));
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "kiln=debug" } else { "kiln=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn exit_code(err: &(dyn Error + 'static)) -> i32 {
    match err.downcast_ref::<EngineError>() {
        Some(e) if e.is_configuration_error() => EXIT_CONFIG,
        Some(EngineError::Signing(SigningError::CredentialMissing)) => EXIT_SIGNING,
        _ => EXIT_FAILED,
    }
}

/// Find the project root by looking for `kiln.toml` in the current directory.
fn project_root() -> Result<PathBuf, Box<dyn Error>> {
    let cwd = std::env::current_dir()?;
    if !cwd.join(MANIFEST_FILE).exists() {
        return Err(
            "no kiln.toml found in current directory — run `kiln init` to create a project".into(),
        );
    }
    Ok(cwd)
}

fn cmd_init(name: Option<String>) -> CliResult {
    let cwd = std::env::current_dir()?;

    let project_name = name.unwrap_or_else(|| {
        cwd.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("my-library")
            .to_owned()
    });
    let project_dir = cwd.join(&project_name);

    kiln_engine::init_project(&project_name, &project_dir)?;

    eprintln!(
        "     Created library `{project_name}` at {}",
        project_dir.display()
    );
    eprintln!();
    eprintln!("  To get started:");
    eprintln!("    cd {project_name}");
    eprintln!("    kiln run build");
    Ok(())
}

fn cmd_run(tasks: &[String], exec: &ExecArgs, json: bool, verbose: bool) -> CliResult {
    let root = project_root()?;
    let mut pipeline = Pipeline::load(&root, &exec.overrides())?;
    tracing::debug!(?tasks, workers = exec.executor().workers, "running tasks");

    let outcome = pipeline.run_tasks(tasks, &exec.executor())?;
    if json {
        println!("{}", outcome.report().to_json()?);
    } else {
        print_report(outcome.report(), verbose);
    }
    finish(&outcome)
}

fn cmd_release(exec: &ExecArgs, verbose: bool) -> CliResult {
    let root = project_root()?;
    let mut pipeline = Pipeline::load(&root, &exec.overrides())?;
    let signer = pipeline.signer();
    let publisher = pipeline.publisher();
    let dry_run = pipeline.is_dry_run();
    let version = pipeline.manifest().package.version.clone();

    eprintln!("   Releasing {} {version}", pipeline.manifest().package.name);
    let outcome = pipeline.release(&exec.executor(), &signer, &publisher)?;
    print_report(outcome.report(), verbose);

    if let PipelineOutcome::Succeeded { published, .. } = &outcome {
        let verb = if dry_run { "Would publish" } else { "Published" };
        for file in published {
            eprintln!("{verb:>12} {file}");
        }
    }
    finish(&outcome)
}

fn finish(outcome: &PipelineOutcome) -> CliResult {
    match outcome {
        PipelineOutcome::Succeeded { report, .. } => {
            eprintln!("    Finished {}", summary(report));
            Ok(())
        }
        PipelineOutcome::TasksFailed { report, failures } => {
            eprintln!("    Finished {}", summary(report));
            for failure in failures {
                eprintln!("error: task {failure}");
            }
            Err(format!("{} task(s) failed", failures.len()).into())
        }
    }
}

fn cmd_graph(properties: &[String]) -> CliResult {
    let root = project_root()?;
    let pipeline = Pipeline::load(&root, properties)?;
    let graph = pipeline.graph();

    for name in graph.execution_order() {
        let Some(task) = graph.task(name) else {
            continue;
        };
        let description = task
            .description
            .clone()
            .unwrap_or_else(|| task.action.describe());
        if task.predecessors.is_empty() {
            println!("{name}  # {description}");
        } else {
            println!(
                "{name} <- {}  # {description}",
                task.predecessors.join(", ")
            );
        }
    }
    Ok(())
}

fn cmd_deps(target: &str) -> CliResult {
    let root = project_root()?;
    let no_overrides: &[&str] = &[];
    let pipeline = Pipeline::load(&root, no_overrides)?;
    let set = pipeline
        .resolved(target)
        .ok_or_else(|| format!("unknown build target `{target}`"))?;

    if set.dependencies.is_empty() {
        eprintln!("target `{target}` has no dependencies");
    }
    for dep in &set.dependencies {
        match &dep.inherited_from {
            Some(from) => println!("{}:{} ({}, exposed by {from})", dep.name, dep.version, dep.scope),
            None => println!("{}:{} ({})", dep.name, dep.version, dep.scope),
        }
    }
    Ok(())
}

fn cmd_clean() -> CliResult {
    let root = project_root()?;
    clean(&root)?;
    eprintln!("     Cleaned build directory");
    Ok(())
}

fn clean(root: &Path) -> CliResult {
    let manifest = Manifest::from_path(&root.join(MANIFEST_FILE))?;
    let build_dir = root.join(&manifest.package.build_dir);
    tracing::debug!(path = %build_dir.display(), "removing build directory");
    kiln_util::fs::remove_dir_all_if_exists(&build_dir)?;
    Ok(())
}
