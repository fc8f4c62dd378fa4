//! Error types for kiln-engine.

use kiln_config::catalog::CatalogError;

use crate::publish::PublishError;
use crate::signing::SigningError;

/// Errors produced by engine operations.
///
/// See [`EngineError::is_configuration_error`] for the variants raised from
/// `kiln.toml` alone, before any task runs.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A filesystem operation failed.
    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// A utility operation failed.
    #[error("{0}")]
    Util(#[from] kiln_util::error::UtilError),

    /// A manifest operation failed.
    #[error("{0}")]
    Manifest(#[from] kiln_config::manifest::ManifestError),

    /// An option had an unusable value.
    #[error("{0}")]
    Options(#[from] kiln_config::options::OptionsError),

    /// The version catalog itself is malformed.
    #[error("{0}")]
    Catalog(#[from] CatalogError),

    /// A build target declares a dependency the catalog does not pin.
    #[error("cannot resolve dependencies of target `{target}`: {source}")]
    UnresolvedDependency {
        target: String,
        #[source]
        source: CatalogError,
    },

    /// A build target or task references a build target that does not exist.
    #[error("unknown build target `{name}` referenced by `{referenced_by}`")]
    UnknownTarget { name: String, referenced_by: String },

    /// A build target name was declared twice.
    #[error("build target `{name}` is declared more than once")]
    DuplicateTarget { name: String },

    /// Task or target edges form a cycle.
    #[error("cyclic {kind} dependency: {cycle}")]
    CyclicDependency { kind: &'static str, cycle: String },

    /// A task name was registered twice.
    #[error("task `{name}` is registered more than once")]
    DuplicateTask { name: String },

    /// A task (or requested run target) names a task that does not exist.
    #[error("unknown task `{name}`{}", .referenced_by.as_ref().map(|r| format!(" referenced by `{r}`")).unwrap_or_default())]
    UnknownTask {
        name: String,
        referenced_by: Option<String>,
    },

    /// A task's configuration cannot be turned into an action.
    #[error("invalid task `{task}`: {reason}")]
    InvalidTask { task: String, reason: String },

    /// The packaging section is missing or inconsistent.
    #[error("invalid packaging configuration: {reason}")]
    InvalidPackaging { reason: String },

    /// A classified artifact does not carry the primary artifact's name and version.
    #[error("artifact produced by `{task}` is named {found}, expected {expected}")]
    ArtifactNamingMismatch {
        task: String,
        expected: String,
        found: String,
    },

    /// An artifact's producing task has not succeeded.
    #[error("artifact producer `{task}` has not succeeded (state: {state})")]
    ArtifactNotReady { task: String, state: String },

    /// A packaging task succeeded without producing an archive.
    #[error("task `{task}` did not produce an archive")]
    MissingArchive { task: String },

    /// Publication target selection failed.
    #[error("{0}")]
    Select(#[from] kiln_targets::SelectError),

    /// The signing gate refused the release.
    #[error("{0}")]
    Signing(#[from] SigningError),

    /// An upload failed.
    #[error("{0}")]
    Publish(#[from] PublishError),

    /// The worker thread pool could not be started.
    #[error("cannot start worker pool: {message}")]
    WorkerPool { message: String },

    /// A project already exists at the target path.
    #[error("kiln.toml already exists at {path} — cannot initialize over an existing project")]
    ProjectExists { path: String },

    /// A report could not be serialized.
    #[error("cannot serialize report: {message}")]
    Report { message: String },
}

impl EngineError {
    /// Whether this error was detected before execution from configuration alone.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::Manifest(_)
                | Self::Options(_)
                | Self::Catalog(_)
                | Self::UnresolvedDependency { .. }
                | Self::UnknownTarget { .. }
                | Self::DuplicateTarget { .. }
                | Self::CyclicDependency { .. }
                | Self::DuplicateTask { .. }
                | Self::UnknownTask { .. }
                | Self::InvalidTask { .. }
                | Self::InvalidPackaging { .. }
                | Self::ArtifactNamingMismatch { .. }
                | Self::Select(_)
                | Self::ProjectExists { .. }
        )
    }
}
