//! Classified build artifacts.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use kiln_util::maven::MavenCoordinate;

/// Distinguishes artifacts built from the same source and version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Classifier {
    Sources,
    Javadoc,
}

impl Classifier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sources => "sources",
            Self::Javadoc => "javadoc",
        }
    }
}

impl fmt::Display for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Classifier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sources" => Ok(Self::Sources),
            "javadoc" => Ok(Self::Javadoc),
            other => Err(format!(
                "unknown classifier \"{other}\" — expected \"sources\" or \"javadoc\""
            )),
        }
    }
}

/// A file written by a task action that may become an [`Artifact`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub path: PathBuf,
    pub base_name: String,
    pub version: String,
    pub classifier: Option<Classifier>,
    /// `"jar"` or `"pom"`.
    pub extension: String,
}

impl Product {
    /// `"{base}-{version}[-{classifier}].{extension}"`.
    pub fn file_name(&self) -> String {
        file_name(
            &self.base_name,
            &self.version,
            self.classifier,
            &self.extension,
        )
    }
}

/// A packaged artifact whose producing task has succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub base_name: String,
    pub classifier: Option<Classifier>,
    pub version: String,
    pub extension: String,
    /// Name of the task that produced the file.
    pub produced_by: String,
    pub path: PathBuf,
}

impl Artifact {
    pub(crate) fn from_product(product: &Product, produced_by: &str) -> Self {
        Self {
            base_name: product.base_name.clone(),
            classifier: product.classifier,
            version: product.version.clone(),
            extension: product.extension.clone(),
            produced_by: produced_by.to_owned(),
            path: product.path.clone(),
        }
    }

    pub fn file_name(&self) -> String {
        file_name(
            &self.base_name,
            &self.version,
            self.classifier,
            &self.extension,
        )
    }

    /// The Maven coordinate of this artifact under `group`.
    pub fn coordinate(&self, group: &str) -> MavenCoordinate {
        MavenCoordinate::new(group, &self.base_name, &self.version)
            .with_classifier(self.classifier.map(Classifier::as_str))
            .with_extension(&self.extension)
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

fn file_name(base: &str, version: &str, classifier: Option<Classifier>, ext: &str) -> String {
    match classifier {
        Some(c) => format!("{base}-{version}-{c}.{ext}"),
        None => format!("{base}-{version}.{ext}"),
    }
}
