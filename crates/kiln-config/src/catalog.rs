//! The version catalog: one pinned version per logical dependency name.

use std::collections::BTreeMap;

/// A logical dependency name and the version it is pinned to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionEntry {
    pub name: String,
    pub version: String,
}

/// Frozen mapping from logical dependency name to [`VersionEntry`].
///
/// Built once when the manifest is loaded and only read afterwards, so it is
/// shared by reference across resolver calls and worker threads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionCatalog {
    entries: BTreeMap<String, VersionEntry>,
}

impl VersionCatalog {
    /// Build a catalog from `(name, version)` pairs.
    ///
    /// # Errors
    /// Returns an error if a name is declared twice or a version contains
    /// characters that are unsafe in repository paths.
    pub fn from_entries<I, N, V>(entries: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (name, version) in entries {
            let name = name.into();
            let version = version.into();
            kiln_util::maven::validate_version(&version).map_err(|_| {
                CatalogError::InvalidVersion {
                    name: name.clone(),
                    version: version.clone(),
                }
            })?;
            if map.contains_key(&name) {
                return Err(CatalogError::DuplicateEntry { name });
            }
            map.insert(name.clone(), VersionEntry { name, version });
        }
        Ok(Self { entries: map })
    }

    /// Look up the pinned version of `name`.
    ///
    /// # Errors
    /// Returns `CatalogError::UnknownDependency` if `name` is not in the catalog.
    pub fn resolve(&self, name: &str) -> Result<&VersionEntry, CatalogError> {
        self.entries
            .get(name)
            .ok_or_else(|| CatalogError::UnknownDependency {
                name: name.to_owned(),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &VersionEntry> {
        self.entries.values()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("unknown dependency `{name}` — add it to the [versions] table")]
    UnknownDependency { name: String },

    #[error("dependency `{name}` is declared more than once in [versions]")]
    DuplicateEntry { name: String },

    #[error("invalid version \"{version}\" for dependency `{name}`")]
    InvalidVersion { name: String, version: String },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn catalog() -> VersionCatalog {
        VersionCatalog::from_entries([
            ("lombok", "1.18.24"),
            ("guava", "31.1-jre"),
            ("netty", "4.1.77.Final"),
        ])
        .unwrap()
    }

    #[test]
    fn resolve_known_name() {
        let entry = catalog().resolve("guava").unwrap().clone();
        assert_eq!(
            entry,
            VersionEntry {
                name: "guava".to_owned(),
                version: "31.1-jre".to_owned()
            }
        );
    }

    #[test]
    fn resolve_unknown_name() {
        let err = catalog().resolve("log4j").unwrap_err();
        assert_eq!(
            err,
            CatalogError::UnknownDependency {
                name: "log4j".to_owned()
            }
        );
        assert!(err.to_string().contains("log4j"));
    }

    #[test]
    fn duplicate_rejected() {
        let err = VersionCatalog::from_entries([("a", "1"), ("a", "2")]).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateEntry { .. }));
    }

    #[test]
    fn unsafe_version_rejected() {
        let err = VersionCatalog::from_entries([("a", "../1")]).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidVersion { .. }));
    }

    #[test]
    fn iteration_is_sorted() {
        let cat = catalog();
        let names: Vec<&str> = cat.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["guava", "lombok", "netty"]);
        assert_eq!(catalog().len(), 3);
    }

    #[test]
    fn catalog_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<VersionCatalog>();
    }
}
