use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use kiln_targets::PublicationTarget;

use crate::catalog::{CatalogError, VersionCatalog};
use crate::dependency::DependencyTable;
use crate::options::{OptionValue, Options};

/// File name of the project manifest.
pub const MANIFEST_FILE: &str = "kiln.toml";

/// The `kiln.toml` project manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub package: Package,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, OptionValue>,
    /// The version catalog.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub versions: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub targets: BTreeMap<String, TargetConfig>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tasks: BTreeMap<String, TaskConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packaging: Option<PackagingConfig>,
    #[serde(default)]
    pub signing: SigningConfig,
    #[serde(default)]
    pub publishing: PublishingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Package {
    pub group: String,
    pub name: String,
    pub version: String,
    /// Directory (relative to the project root) holding per-task outputs.
    #[serde(default = "default_build_dir")]
    pub build_dir: String,
}

fn default_build_dir() -> String {
    "build".to_owned()
}

/// A build target (a source set or sub-project) and its declared dependencies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// Other targets this one consumes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub dependencies: DependencyTable,
}

/// A `[tasks.<name>]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Build target whose resolved dependencies are handed to the action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// External command; `{out}` and `{project}` are substituted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    /// Jar produced from project directories or predecessor outputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<ArchiveConfig>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Option name that must be true for the task to do any work.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_if: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            depends_on: Vec::new(),
            target: None,
            command: None,
            archive: None,
            enabled: true,
            only_if: None,
            description: None,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Inputs: a path relative to the project root, or `task:<name>` for a
    /// predecessor's output directory.
    pub from: Vec<String>,
    #[serde(default = "default_include")]
    pub include: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
    /// Defaults to `package.name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_name: Option<String>,
    /// Defaults to `package.version`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

fn default_include() -> String {
    "**/*".to_owned()
}

/// Which tasks produce the published archives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackagingConfig {
    pub primary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub javadoc: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SigningConfig {
    /// GPG key id; `KILN_SIGNING_KEY_ID` takes precedence when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(default = "default_gpg")]
    pub program: String,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            key_id: None,
            program: default_gpg(),
        }
    }
}

fn default_gpg() -> String {
    "gpg".to_owned()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishingConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<PublicationTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pom: Option<PomConfig>,
}

/// Project metadata rendered into the published POM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PomConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub licenses: Vec<License>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub developers: Vec<Developer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scm: Option<Scm>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct License {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Developer {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scm {
    pub connection: String,
    pub developer_connection: String,
    pub url: String,
}

impl Manifest {
    /// Read and parse a `kiln.toml` from the given path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or contains invalid TOML.
    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|e| ManifestError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse manifest content; `origin` names the source in error messages.
    ///
    /// # Errors
    /// Returns an error if the content is not a valid manifest.
    pub fn parse(content: &str, origin: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = toml::from_str(content).map_err(|e| ManifestError::Parse {
            path: origin.to_owned(),
            source: e,
        })?;
        kiln_util::maven::validate_version(&manifest.package.version).map_err(|_| {
            ManifestError::InvalidPackageVersion {
                version: manifest.package.version.clone(),
            }
        })?;
        Ok(manifest)
    }

    /// Serialize back to TOML.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ManifestError> {
        toml::to_string_pretty(self).map_err(|e| ManifestError::Serialize { source: e })
    }

    /// Build the version catalog from `[versions]`.
    ///
    /// # Errors
    /// Returns an error if a pinned version is unsafe.
    pub fn catalog(&self) -> Result<VersionCatalog, CatalogError> {
        VersionCatalog::from_entries(
            self.versions
                .iter()
                .map(|(name, version)| (name.as_str(), version.as_str())),
        )
    }

    /// The `[options]` table as an [`Options`] value.
    pub fn options(&self) -> Options {
        Options::new(self.options.clone())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid kiln.toml at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("cannot serialize manifest: {source}")]
    Serialize { source: toml::ser::Error },
    #[error("invalid package version \"{version}\": only alphanumeric characters, dots, hyphens, and underscores are allowed")]
    InvalidPackageVersion { version: String },
}
