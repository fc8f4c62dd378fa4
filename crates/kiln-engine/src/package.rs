//! Collecting the primary and classified artifacts of a release.

use std::collections::BTreeSet;

use crate::artifact::{Artifact, Classifier};
use crate::error::EngineError;
use crate::executor::RunReport;
use crate::graph::TaskState;

/// Names the tasks whose archives make up a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagingStage {
    primary: String,
    classified: Vec<(Classifier, String)>,
    pom: Option<String>,
}

impl PackagingStage {
    pub fn new(primary: &str) -> Self {
        Self {
            primary: primary.to_owned(),
            classified: Vec::new(),
            pom: None,
        }
    }

    /// Builder method requesting a classified artifact produced by `task`.
    pub fn with(mut self, classifier: Classifier, task: &str) -> Self {
        self.classified.push((classifier, task.to_owned()));
        self
    }

    /// Builder method adding the task that writes the project's POM.
    pub fn with_pom(mut self, task: &str) -> Self {
        self.pom = Some(task.to_owned());
        self
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    /// Every producing task, primary first.
    pub fn tasks(&self) -> Vec<String> {
        let mut tasks = vec![self.primary.clone()];
        tasks.extend(self.classified.iter().map(|(_, t)| t.clone()));
        tasks.extend(self.pom.iter().cloned());
        tasks
    }

    /// Check that every producer is distinct and each classifier is requested once.
    ///
    /// # Errors
    /// Returns `InvalidPackaging` describing the conflict.
    pub fn validate(&self) -> Result<(), EngineError> {
        let mut seen = BTreeSet::new();
        for task in self.tasks() {
            if !seen.insert(task.clone()) {
                return Err(EngineError::InvalidPackaging {
                    reason: format!("task `{task}` produces more than one artifact"),
                });
            }
        }
        let mut classifiers = BTreeSet::new();
        for (classifier, _) in &self.classified {
            if !classifiers.insert(classifier.as_str()) {
                return Err(EngineError::InvalidPackaging {
                    reason: format!("classifier `{classifier}` is requested more than once"),
                });
            }
        }
        Ok(())
    }

    /// Collect the artifacts from a finished run: the unclassified primary
    /// archive, then one per classifier, then the POM.
    ///
    /// # Errors
    /// Returns `ArtifactNotReady` if a producer did not succeed,
    /// `MissingArchive` if it produced nothing, and `ArtifactNamingMismatch`
    /// if a file does not carry the primary's base name and version.
    pub fn package(&self, report: &RunReport) -> Result<Vec<Artifact>, EngineError> {
        self.validate()?;

        let primary = produced(report, &self.primary)?;
        if primary.classifier.is_some() {
            return Err(EngineError::ArtifactNamingMismatch {
                task: self.primary.clone(),
                expected: format!("{}-{}.jar", primary.base_name, primary.version),
                found: primary.file_name(),
            });
        }

        let mut artifacts = Vec::with_capacity(self.classified.len() + 2);
        for (classifier, task) in &self.classified {
            let artifact = produced(report, task)?;
            let expected = Artifact {
                classifier: Some(*classifier),
                extension: artifact.extension.clone(),
                ..primary.clone()
            };
            check_name(task, &expected, &artifact)?;
            artifacts.push(artifact);
        }

        if let Some(task) = &self.pom {
            let artifact = produced(report, task)?;
            let expected = Artifact {
                extension: "pom".to_owned(),
                ..primary.clone()
            };
            check_name(task, &expected, &artifact)?;
            artifacts.push(artifact);
        }

        artifacts.insert(0, primary);
        tracing::debug!(count = artifacts.len(), "artifacts packaged");
        Ok(artifacts)
    }
}

fn produced(report: &RunReport, task: &str) -> Result<Artifact, EngineError> {
    let outcome = report
        .outcome(task)
        .ok_or_else(|| EngineError::ArtifactNotReady {
            task: task.to_owned(),
            state: "not run".to_owned(),
        })?;
    if outcome.state != TaskState::Succeeded {
        return Err(EngineError::ArtifactNotReady {
            task: task.to_owned(),
            state: outcome.state.to_string(),
        });
    }
    let product = outcome
        .product
        .as_ref()
        .ok_or_else(|| EngineError::MissingArchive {
            task: task.to_owned(),
        })?;
    Ok(Artifact::from_product(product, task))
}

fn check_name(task: &str, expected: &Artifact, found: &Artifact) -> Result<(), EngineError> {
    if expected.file_name() != found.file_name() {
        return Err(EngineError::ArtifactNamingMismatch {
            task: task.to_owned(),
            expected: expected.file_name(),
            found: found.file_name(),
        });
    }
    Ok(())
}
