//! Task graph execution, packaging, signing and publication for Kiln.

pub mod action;
pub mod artifact;
pub mod diagnostics;
pub mod error;
pub mod executor;
pub mod graph;
pub mod init;
pub mod package;
pub mod pipeline;
pub mod pom;
pub mod publish;
pub mod resolve;
pub mod signing;

pub use action::{ActionFailure, ActionOutput, TaskAction, TaskContext};
pub use artifact::{Artifact, Classifier, Product};
pub use error::EngineError;
pub use executor::{ExecutorOptions, FailurePolicy, RunReport, TaskOutcome};
pub use graph::{Task, TaskGraph, TaskGraphBuilder, TaskState};
pub use init::init_project;
pub use package::PackagingStage;
pub use pipeline::{Pipeline, PipelineOutcome, TaskFailure};
pub use publish::{Publication, Publisher, RepositoryPublisher};
pub use resolve::{BuildTarget, DependencyResolver, ResolvedDependency, ResolvedSet};
pub use signing::{GpgSigner, SignedArtifact, Signer, SigningCredential, SigningPolicy};
