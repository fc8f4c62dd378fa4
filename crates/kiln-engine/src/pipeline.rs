//! The end-to-end pipeline: configuration, task execution and release.
//!
//! Everything that can be checked from `kiln.toml` alone is checked in
//! [`Pipeline::from_manifest`], before any task runs.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_config::manifest::{Manifest, PackagingConfig, TaskConfig, MANIFEST_FILE};
use kiln_config::options::{Options, DRY_RUN};
use kiln_targets::TargetSelector;

use crate::action::{ArchiveAction, ArchiveInput, CommandAction, NoopAction};
use crate::artifact::{Classifier, Product};
use crate::error::EngineError;
use crate::executor::{ExecutorOptions, RunReport};
use crate::graph::{Task, TaskGraph, TaskGraphBuilder, TaskState};
use crate::package::PackagingStage;
use crate::pom::{PomAction, POM_TASK};
use crate::publish::{Publication, Publisher, RepositoryPublisher};
use crate::resolve::{BuildTarget, DependencyResolver, ResolvedSet};
use crate::signing::{GpgSigner, Signer, SigningCredential, SigningError, SigningPolicy};

/// A task that did not succeed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task: String,
    pub cause: String,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.task, self.cause)
    }
}

/// How a pipeline run ended, when configuration was valid.
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    Succeeded {
        report: RunReport,
        /// File names sent to the publication target (empty for plain runs).
        published: Vec<String>,
    },
    TasksFailed {
        report: RunReport,
        failures: Vec<TaskFailure>,
    },
}

impl PipelineOutcome {
    fn from_report(report: RunReport) -> Self {
        if report.all_succeeded() {
            return Self::Succeeded {
                report,
                published: Vec::new(),
            };
        }
        let failures = report
            .outcomes
            .iter()
            .filter(|o| o.state == TaskState::Failed)
            .map(|o| TaskFailure {
                task: o.name.clone(),
                cause: o.cause.clone().unwrap_or_else(|| "failed".to_owned()),
            })
            .collect();
        Self::TasksFailed { report, failures }
    }

    pub fn report(&self) -> &RunReport {
        match self {
            Self::Succeeded { report, .. } | Self::TasksFailed { report, .. } => report,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// A fully validated project, ready to run tasks or release.
#[derive(Debug)]
pub struct Pipeline {
    project_root: PathBuf,
    manifest: Manifest,
    options: Options,
    graph: TaskGraph,
    resolved: BTreeMap<String, Arc<ResolvedSet>>,
    selector: TargetSelector,
    packaging: Option<PackagingStage>,
    signing: SigningPolicy,
    dry_run: bool,
}

impl Pipeline {
    /// Read `kiln.toml` from `project_root` and validate it.
    ///
    /// # Errors
    /// Returns an error if the manifest cannot be read or any configuration
    /// check fails.
    pub fn load<S: AsRef<str>>(project_root: &Path, overrides: &[S]) -> Result<Self, EngineError> {
        let manifest = Manifest::from_path(&project_root.join(MANIFEST_FILE))?;
        Self::from_manifest(project_root, manifest, overrides)
    }

    /// Validate `manifest` and build the task graph.
    ///
    /// Options (with `-P` overrides), the version catalog, every target's
    /// dependency set, the task graph, packaging and publication targets are
    /// all checked here. No action runs.
    ///
    /// # Errors
    /// Returns the first configuration error found.
    pub fn from_manifest<S: AsRef<str>>(
        project_root: &Path,
        manifest: Manifest,
        overrides: &[S],
    ) -> Result<Self, EngineError> {
        let options = manifest.options().with_overrides(overrides)?;
        let signing = SigningPolicy::from_options(&options)?;
        let dry_run = options.flag(DRY_RUN, false)?;

        let catalog = manifest.catalog()?;
        let resolver = DependencyResolver::new(
            &catalog,
            manifest
                .targets
                .iter()
                .map(|(name, config)| BuildTarget::from_config(name, config)),
        )?;
        let resolved: BTreeMap<String, Arc<ResolvedSet>> = resolver
            .expand_all()?
            .into_iter()
            .map(|(name, set)| (name, Arc::new(set)))
            .collect();

        let build_dir = project_root.join(&manifest.package.build_dir);
        let mut builder = TaskGraphBuilder::new(project_root, &build_dir);
        for (name, config) in &manifest.tasks {
            builder = builder.register(task_from_config(name, config, &manifest, &options, &resolved)?);
        }

        let packaging = match &manifest.packaging {
            Some(config) => {
                check_packaging_names(&manifest, config)?;
                let mut stage = PackagingStage::new(&config.primary);
                if let Some(task) = &config.sources {
                    stage = stage.with(Classifier::Sources, task);
                }
                if let Some(task) = &config.javadoc {
                    stage = stage.with(Classifier::Javadoc, task);
                }
                if let Some(pom) = &manifest.publishing.pom {
                    builder = builder.register(
                        Task::new(POM_TASK, PomAction::new(manifest.package.clone(), pom.clone()))
                            .with_description("Generate the Maven POM"),
                    );
                    stage = stage.with_pom(POM_TASK);
                }
                stage.validate()?;
                Some(stage)
            }
            None => None,
        };

        let graph = builder.build()?;
        if let Some(stage) = &packaging {
            if let Some(missing) = stage.tasks().into_iter().find(|t| !graph.contains(t)) {
                return Err(EngineError::UnknownTask {
                    name: missing,
                    referenced_by: Some("packaging".to_owned()),
                });
            }
        }

        let selector = TargetSelector::new(manifest.publishing.repositories.clone())?;

        tracing::debug!(
            tasks = graph.execution_order().len(),
            targets = resolved.len(),
            dry_run,
            "pipeline configured"
        );
        Ok(Self {
            project_root: project_root.to_path_buf(),
            manifest,
            options,
            graph,
            resolved,
            selector,
            packaging,
            signing,
            dry_run,
        })
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Resolved dependency set of a build target.
    pub fn resolved(&self, target: &str) -> Option<&ResolvedSet> {
        self.resolved.get(target).map(AsRef::as_ref)
    }

    pub fn signing_policy(&self) -> SigningPolicy {
        self.signing
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// The signer configured under `[signing]`.
    pub fn signer(&self) -> GpgSigner {
        GpgSigner::new(&self.manifest.signing.program)
    }

    /// The repository publisher for this project's group.
    pub fn publisher(&self) -> RepositoryPublisher {
        RepositoryPublisher::new(&self.manifest.package.group, self.dry_run)
    }

    /// Run the named tasks and their predecessors.
    ///
    /// # Errors
    /// Returns `UnknownTask` before anything runs if a name is not registered.
    pub fn run_tasks<S: AsRef<str>>(
        &mut self,
        names: &[S],
        options: &ExecutorOptions,
    ) -> Result<PipelineOutcome, EngineError> {
        let report = self.graph.run(names, options)?;
        Ok(PipelineOutcome::from_report(report))
    }

    /// Build, package, sign and publish the release.
    ///
    /// The publication target is selected and the signing credential checked
    /// before any task runs. Task failures end the release with
    /// `TasksFailed` and nothing is published.
    ///
    /// # Errors
    /// Returns configuration, signing and publication errors.
    pub fn release(
        &mut self,
        options: &ExecutorOptions,
        signer: &dyn Signer,
        publisher: &dyn Publisher,
    ) -> Result<PipelineOutcome, EngineError> {
        let stage = self
            .packaging
            .clone()
            .ok_or_else(|| EngineError::InvalidPackaging {
                reason: "kiln.toml has no [packaging] section".to_owned(),
            })?;
        let version = self.manifest.package.version.clone();
        let target = self.selector.select(&version)?.clone();
        tracing::info!(%version, target_name = %target.name, "publication target selected");

        let credential = SigningCredential::from_env_or(self.manifest.signing.key_id.as_deref());
        if self.signing.is_required() && credential.is_none() {
            return Err(SigningError::CredentialMissing.into());
        }

        let report = self.graph.run(&stage.tasks(), options)?;
        if !report.all_succeeded() {
            return Ok(PipelineOutcome::from_report(report));
        }

        let artifacts = stage.package(&report)?;
        let signed = self.signing.apply(artifacts, credential.as_ref(), signer)?;
        let published = Publication::new(publisher).publish_all(&signed, &target)?;

        Ok(PipelineOutcome::Succeeded { report, published })
    }
}

/// Archive a task is configured to write, or `None` for non-archive tasks.
fn configured_archive(manifest: &Manifest, task: &str) -> Result<Option<Product>, EngineError> {
    let Some(archive) = manifest.tasks.get(task).and_then(|t| t.archive.as_ref()) else {
        return Ok(None);
    };
    let classifier = archive
        .classifier
        .as_deref()
        .map(str::parse::<Classifier>)
        .transpose()
        .map_err(|reason| EngineError::InvalidTask {
            task: task.to_owned(),
            reason,
        })?;
    Ok(Some(Product {
        path: PathBuf::new(),
        base_name: archive
            .base_name
            .clone()
            .unwrap_or_else(|| manifest.package.name.clone()),
        version: archive
            .version
            .clone()
            .unwrap_or_else(|| manifest.package.version.clone()),
        classifier,
        extension: "jar".to_owned(),
    }))
}

/// Compare the archive names the `[packaging]` producers are configured to
/// write against the primary's, so a mismatch fails before any task runs.
///
/// Producers that are not archive tasks are checked after the run instead.
fn check_packaging_names(manifest: &Manifest, config: &PackagingConfig) -> Result<(), EngineError> {
    let check = |task: &str, expected: Product, found: Product| {
        if expected.file_name() == found.file_name() {
            Ok(())
        } else {
            Err(EngineError::ArtifactNamingMismatch {
                task: task.to_owned(),
                expected: expected.file_name(),
                found: found.file_name(),
            })
        }
    };

    let package_identity = Product {
        path: PathBuf::new(),
        base_name: manifest.package.name.clone(),
        version: manifest.package.version.clone(),
        classifier: None,
        extension: "jar".to_owned(),
    };

    // The generated POM is named after the package, so the primary must be too.
    let mut reference = manifest.publishing.pom.as_ref().map(|_| package_identity);
    if let Some(primary) = configured_archive(manifest, &config.primary)? {
        let expected = reference.clone().unwrap_or_else(|| Product {
            classifier: None,
            ..primary.clone()
        });
        check(&config.primary, expected.clone(), primary)?;
        reference = Some(expected);
    }

    let classified = [
        (Classifier::Sources, config.sources.as_deref()),
        (Classifier::Javadoc, config.javadoc.as_deref()),
    ];
    for (classifier, task) in classified {
        let Some(task) = task else {
            continue;
        };
        let Some(found) = configured_archive(manifest, task)? else {
            continue;
        };
        let base = reference.clone().unwrap_or_else(|| found.clone());
        let expected = Product {
            classifier: Some(classifier),
            ..base
        };
        check(task, expected, found)?;
    }
    Ok(())
}

fn task_from_config(
    name: &str,
    config: &TaskConfig,
    manifest: &Manifest,
    options: &Options,
    resolved: &BTreeMap<String, Arc<ResolvedSet>>,
) -> Result<Task, EngineError> {
    let invalid = |reason: String| EngineError::InvalidTask {
        task: name.to_owned(),
        reason,
    };

    let mut task = match (&config.command, &config.archive) {
        (Some(_), Some(_)) => {
            return Err(invalid("sets both `command` and `archive`".to_owned()));
        }
        (Some(argv), None) => {
            let action = CommandAction::from_argv(argv)
                .ok_or_else(|| invalid("`command` is empty".to_owned()))?;
            Task::new(name, action)
        }
        (None, Some(archive)) => {
            let inputs: Vec<ArchiveInput> = archive.from.iter().map(|f| ArchiveInput::parse(f)).collect();
            for input in &inputs {
                if let ArchiveInput::TaskOutput(source) = input {
                    if !config.depends_on.contains(source) {
                        return Err(invalid(format!(
                            "archive input `task:{source}` must also be listed in `depends_on`"
                        )));
                    }
                }
            }
            let classifier = archive
                .classifier
                .as_deref()
                .map(str::parse::<Classifier>)
                .transpose()
                .map_err(invalid)?;
            Task::new(
                name,
                ArchiveAction {
                    inputs,
                    include: archive.include.clone(),
                    base_name: archive
                        .base_name
                        .clone()
                        .unwrap_or_else(|| manifest.package.name.clone()),
                    version: archive
                        .version
                        .clone()
                        .unwrap_or_else(|| manifest.package.version.clone()),
                    classifier,
                },
            )
        }
        (None, None) => Task::new(name, NoopAction::new("aggregate task")),
    };

    if let Some(target) = &config.target {
        let set = resolved.get(target).ok_or_else(|| EngineError::UnknownTarget {
            name: target.clone(),
            referenced_by: name.to_owned(),
        })?;
        task = task.with_dependencies(Arc::clone(set));
    }

    if !config.enabled {
        task.action = Arc::new(NoopAction::new("disabled"));
    } else if let Some(option) = &config.only_if {
        if !options.flag(option, false)? {
            task.action = Arc::new(NoopAction::new(format!("option `{option}` is off")));
        }
    }

    for pred in &config.depends_on {
        task = task.after(pred);
    }
    if let Some(description) = &config.description {
        task = task.with_description(description);
    }
    Ok(task)
}
