//! Maven coordinates and the repository layout that publications are written to.

use crate::error::UtilError;

/// Version suffix marking a snapshot build.
pub const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

/// A Maven coordinate identifying one published file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MavenCoordinate {
    /// Group identifier, e.g. `"io.github.shiruka"`.
    pub group_id: String,
    /// Artifact identifier, e.g. `"api"`.
    pub artifact_id: String,
    /// Artifact version, e.g. `"1.0.0-SNAPSHOT"`.
    pub version: String,
    /// Optional classifier, e.g. `"sources"`.
    pub classifier: Option<String>,
    /// File extension (defaults to `"jar"`).
    pub extension: String,
}

impl MavenCoordinate {
    /// Create a new unclassified `jar` coordinate.
    pub fn new(group_id: &str, artifact_id: &str, version: &str) -> Self {
        Self {
            group_id: group_id.to_owned(),
            artifact_id: artifact_id.to_owned(),
            version: version.to_owned(),
            classifier: None,
            extension: "jar".to_owned(),
        }
    }

    /// Builder method to set the classifier.
    pub fn with_classifier(mut self, classifier: Option<&str>) -> Self {
        self.classifier = classifier.map(str::to_owned);
        self
    }

    /// Builder method to override the extension.
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.to_owned();
        self
    }

    /// `"{artifact}-{version}[-{classifier}].{extension}"`.
    pub fn filename(&self) -> String {
        match &self.classifier {
            Some(c) => format!(
                "{}-{}-{}.{}",
                self.artifact_id, self.version, c, self.extension
            ),
            None => format!("{}-{}.{}", self.artifact_id, self.version, self.extension),
        }
    }

    /// The repository-relative path: `"{group/path}/{artifact}/{version}/{filename}"`.
    pub fn repository_path(&self) -> String {
        let group_path = self.group_id.replace('.', "/");
        format!(
            "{}/{}/{}/{}",
            group_path,
            self.artifact_id,
            self.version,
            self.filename()
        )
    }

    /// The full URL of this file inside `repository`, tolerating a trailing `/`.
    pub fn to_url(&self, repository: &str) -> String {
        let base = repository.trim_end_matches('/');
        format!("{}/{}", base, self.repository_path())
    }
}

/// Whether `version` follows the `-SNAPSHOT` convention.
pub fn is_snapshot_version(version: &str) -> bool {
    version.ends_with(SNAPSHOT_SUFFIX)
}

/// Validate that a version string is safe for filesystem paths and URLs.
///
/// Allows only `[a-zA-Z0-9._-]`. Must be non-empty.
///
/// # Errors
/// Returns `UtilError::InvalidVersion` if the string is empty or contains
/// characters outside the allowed set.
pub fn validate_version(version: &str) -> Result<(), UtilError> {
    if version.is_empty()
        || !version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
    {
        return Err(UtilError::InvalidVersion {
            version: version.to_owned(),
        });
    }
    Ok(())
}
