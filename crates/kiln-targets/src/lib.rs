//! Publication targets and the rule that picks one for a release version.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use kiln_util::maven::is_snapshot_version;

/// Which versions a repository accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Applicability {
    /// Versions ending in `-SNAPSHOT`.
    Snapshot,
    /// Every version that is not a snapshot.
    Release,
    /// Any version.
    #[default]
    Always,
}

impl Applicability {
    fn accepts(self, version: &str) -> bool {
        match self {
            Self::Snapshot => is_snapshot_version(version),
            Self::Release => !is_snapshot_version(version),
            Self::Always => true,
        }
    }
}

/// A destination repository and the predicate that selects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationTarget {
    /// Display name, e.g. `"sonatype-snapshots"`.
    pub name: String,
    /// Repository base URL (`https://...` or `file://...`).
    pub url: String,
    /// Prefix of the `{PREFIX}_USERNAME` / `{PREFIX}_PASSWORD` environment variables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    #[serde(default)]
    pub applies_to: Applicability,
    /// Optional glob the version must also match, e.g. `"2.*"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl PublicationTarget {
    /// The local directory of a `file://` repository, if this is one.
    pub fn local_path(&self) -> Option<PathBuf> {
        self.url.strip_prefix("file://").map(PathBuf::from)
    }
}

impl fmt::Display for PublicationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.url)
    }
}

/// Picks exactly one [`PublicationTarget`] for a version.
#[derive(Debug)]
pub struct TargetSelector {
    targets: Vec<(PublicationTarget, Option<glob::Pattern>)>,
}

impl TargetSelector {
    /// Validate the configured targets and compile their version patterns.
    ///
    /// # Errors
    /// Returns an error if two targets share a name or a pattern is not a valid glob.
    pub fn new(targets: Vec<PublicationTarget>) -> Result<Self, SelectError> {
        let mut compiled: Vec<(PublicationTarget, Option<glob::Pattern>)> =
            Vec::with_capacity(targets.len());
        for target in targets {
            if compiled.iter().any(|(t, _)| t.name == target.name) {
                return Err(SelectError::DuplicateTarget { name: target.name });
            }
            let pattern = match &target.pattern {
                Some(p) => Some(glob::Pattern::new(p).map_err(|e| {
                    SelectError::InvalidPattern {
                        target: target.name.clone(),
                        pattern: p.clone(),
                        message: e.to_string(),
                    }
                })?),
                None => None,
            };
            compiled.push((target, pattern));
        }
        Ok(Self { targets: compiled })
    }

    /// All configured targets, in declaration order.
    pub fn targets(&self) -> impl Iterator<Item = &PublicationTarget> {
        self.targets.iter().map(|(t, _)| t)
    }

    /// Select the single target whose predicate accepts `version`.
    ///
    /// # Errors
    /// Returns `NoPublicationTarget` if nothing matches and
    /// `AmbiguousPublicationTarget` if more than one target matches.
    pub fn select(&self, version: &str) -> Result<&PublicationTarget, SelectError> {
        let matching: Vec<&PublicationTarget> = self
            .targets
            .iter()
            .filter(|(target, pattern)| {
                target.applies_to.accepts(version)
                    && pattern.as_ref().is_none_or(|p| p.matches(version))
            })
            .map(|(target, _)| target)
            .collect();

        match matching.as_slice() {
            [single] => Ok(*single),
            [] => Err(SelectError::NoPublicationTarget {
                version: version.to_owned(),
            }),
            many => Err(SelectError::AmbiguousPublicationTarget {
                version: version.to_owned(),
                targets: many
                    .iter()
                    .map(|t| t.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error("no publication target accepts version {version} — add a repository whose `applies_to`/`pattern` matches it")]
    NoPublicationTarget { version: String },

    #[error("version {version} matches more than one publication target ({targets}) — narrow their `applies_to`/`pattern`")]
    AmbiguousPublicationTarget { version: String, targets: String },

    #[error("publication target `{name}` is declared more than once")]
    DuplicateTarget { name: String },

    #[error("invalid version pattern `{pattern}` for publication target `{target}`: {message}")]
    InvalidPattern {
        target: String,
        pattern: String,
        message: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn target(name: &str, applies_to: Applicability, pattern: Option<&str>) -> PublicationTarget {
        PublicationTarget {
            name: name.to_owned(),
            url: format!("https://repo.example/{name}"),
            credential: None,
            applies_to,
            pattern: pattern.map(str::to_owned),
        }
    }

    fn sonatype() -> TargetSelector {
        TargetSelector::new(vec![
            target("snapshots", Applicability::Snapshot, None),
            target("releases", Applicability::Release, None),
        ])
        .unwrap()
    }

    #[test]
    fn snapshot_version_selects_snapshot_repository() {
        assert_eq!(sonatype().select("2.0-SNAPSHOT").unwrap().name, "snapshots");
    }

    #[test]
    fn release_version_selects_release_repository() {
        assert_eq!(sonatype().select("2.0").unwrap().name, "releases");
    }

    #[test]
    fn overlapping_predicates_are_ambiguous() {
        let selector = TargetSelector::new(vec![
            target("releases", Applicability::Release, None),
            target("custom", Applicability::Always, Some("2.*")),
        ])
        .unwrap();
        let err = selector.select("2.0").unwrap_err();
        assert!(
            matches!(err, SelectError::AmbiguousPublicationTarget { ref targets, .. } if targets == "releases, custom"),
            "{err}"
        );
        // The custom pattern does not cover 1.x, so 1.0 is unambiguous.
        assert_eq!(selector.select("1.0").unwrap().name, "releases");
    }

    #[test]
    fn no_match_is_an_error() {
        let selector =
            TargetSelector::new(vec![target("snapshots", Applicability::Snapshot, None)]).unwrap();
        let err = selector.select("2.0").unwrap_err();
        assert!(matches!(err, SelectError::NoPublicationTarget { .. }));
        assert!(err.to_string().contains("2.0"));
    }

    #[test]
    fn empty_selector_matches_nothing() {
        let selector = TargetSelector::new(Vec::new()).unwrap();
        assert!(matches!(
            selector.select("1.0"),
            Err(SelectError::NoPublicationTarget { .. })
        ));
    }

    #[test]
    fn pattern_narrows_applicability() {
        let selector = TargetSelector::new(vec![
            target("legacy", Applicability::Release, Some("1.*")),
            target("current", Applicability::Release, Some("2.*")),
        ])
        .unwrap();
        assert_eq!(selector.select("1.4.2").unwrap().name, "legacy");
        assert_eq!(selector.select("2.0").unwrap().name, "current");
    }

    #[test]
    fn duplicate_names_rejected() {
        let err = TargetSelector::new(vec![
            target("repo", Applicability::Snapshot, None),
            target("repo", Applicability::Release, None),
        ])
        .unwrap_err();
        assert!(matches!(err, SelectError::DuplicateTarget { .. }));
    }

    #[test]
    fn invalid_pattern_rejected() {
        let err =
            TargetSelector::new(vec![target("bad", Applicability::Always, Some("[1.*"))])
                .unwrap_err();
        assert!(err.to_string().contains("bad"), "{err}");
    }

    #[test]
    fn deserializes_from_toml() {
        let t: PublicationTarget = toml::from_str(
            "name = \"sonatype\"\nurl = \"https://s01.oss.sonatype.org/\"\ncredential = \"SONATYPE\"\napplies_to = \"snapshot\"\n",
        )
        .unwrap();
        assert_eq!(t.applies_to, Applicability::Snapshot);
        assert_eq!(t.credential.as_deref(), Some("SONATYPE"));
        assert!(t.pattern.is_none());
    }

    #[test]
    fn applies_to_defaults_to_always() {
        let t: PublicationTarget =
            toml::from_str("name = \"local\"\nurl = \"file:///tmp/repo\"\n").unwrap();
        assert_eq!(t.applies_to, Applicability::Always);
        assert_eq!(t.local_path(), Some(PathBuf::from("/tmp/repo")));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod proptests {
    use super::{Applicability, PublicationTarget, TargetSelector};

    use proptest::prelude::proptest;

    proptest! {
        /// Snapshot and release predicates partition every version string.
        #[test]
        fn snapshot_and_release_partition_versions(version in "[0-9a-zA-Z.\\-]{0,24}") {
            let selector = TargetSelector::new(vec![
                PublicationTarget {
                    name: "snapshots".to_owned(),
                    url: "https://repo.example/s".to_owned(),
                    credential: None,
                    applies_to: Applicability::Snapshot,
                    pattern: None,
                },
                PublicationTarget {
                    name: "releases".to_owned(),
                    url: "https://repo.example/r".to_owned(),
                    credential: None,
                    applies_to: Applicability::Release,
                    pattern: None,
                },
            ])
            .unwrap();
            assert!(selector.select(&version).is_ok());
        }
    }
}
