//! Expansion of dependency declarations into concrete, versioned dependency sets.

use std::collections::BTreeMap;

use serde::Serialize;

use kiln_config::catalog::VersionCatalog;
use kiln_config::dependency::{DependencyDeclaration, Scope};
use kiln_config::manifest::TargetConfig;

use crate::error::EngineError;
use crate::graph::dependency_order;

/// A build target (source set or sub-project) with its declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    pub name: String,
    /// Targets whose outputs this target consumes.
    pub depends_on: Vec<String>,
    pub declarations: Vec<DependencyDeclaration>,
}

impl BuildTarget {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            depends_on: Vec::new(),
            declarations: Vec::new(),
        }
    }

    /// Builder method adding a target this one depends on.
    pub fn depends_on(mut self, target: &str) -> Self {
        self.depends_on.push(target.to_owned());
        self
    }

    /// Builder method adding a declaration.
    pub fn declare(mut self, name: &str, scope: Scope) -> Self {
        self.declarations
            .push(DependencyDeclaration::new(name, scope));
        self
    }

    /// Convert a `[targets.<name>]` entry.
    pub fn from_config(name: &str, config: &TargetConfig) -> Self {
        Self {
            name: name.to_owned(),
            depends_on: config.depends_on.clone(),
            declarations: config.dependencies.declarations(),
        }
    }
}

/// One dependency of a target, pinned and scoped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDependency {
    pub name: String,
    pub version: String,
    pub scope: Scope,
    /// The target that exposed this dependency, when it was inherited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherited_from: Option<String>,
}

/// The concrete dependency set of one build target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedSet {
    pub target: String,
    pub dependencies: Vec<ResolvedDependency>,
}

impl ResolvedSet {
    /// Find the dependency `name` resolved with `scope`.
    pub fn get(&self, name: &str, scope: Scope) -> Option<&ResolvedDependency> {
        self.dependencies
            .iter()
            .find(|d| d.name == name && d.scope == scope)
    }

    pub fn contains(&self, name: &str, scope: Scope) -> bool {
        self.get(name, scope).is_some()
    }

    /// Dependencies resolved with `scope`.
    pub fn with_scope(&self, scope: Scope) -> impl Iterator<Item = &ResolvedDependency> {
        self.dependencies.iter().filter(move |d| d.scope == scope)
    }

    /// `name:version:scope` entries joined with commas, handed to external tools.
    pub fn to_env_value(&self) -> String {
        self.dependencies
            .iter()
            .map(|d| format!("{}:{}:{}", d.name, d.version, d.scope))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Resolves build targets against a [`VersionCatalog`].
#[derive(Debug)]
pub struct DependencyResolver<'c> {
    catalog: &'c VersionCatalog,
    targets: BTreeMap<String, BuildTarget>,
}

impl<'c> DependencyResolver<'c> {
    /// Validate the target graph and prepare for resolution.
    ///
    /// # Errors
    /// Returns an error if a target is declared twice, depends on an unknown
    /// target, or the target edges form a cycle.
    pub fn new<I>(catalog: &'c VersionCatalog, targets: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = BuildTarget>,
    {
        let mut by_name: BTreeMap<String, BuildTarget> = BTreeMap::new();
        for target in targets {
            if by_name.contains_key(&target.name) {
                return Err(EngineError::DuplicateTarget {
                    name: target.name.clone(),
                });
            }
            by_name.insert(target.name.clone(), target);
        }

        for target in by_name.values() {
            if let Some(missing) = target
                .depends_on
                .iter()
                .find(|dep| !by_name.contains_key(dep.as_str()))
            {
                return Err(EngineError::UnknownTarget {
                    name: missing.clone(),
                    referenced_by: target.name.clone(),
                });
            }
        }

        let edges: BTreeMap<String, Vec<String>> = by_name
            .iter()
            .map(|(name, t)| (name.clone(), t.depends_on.clone()))
            .collect();
        dependency_order(&edges).map_err(|cycle| EngineError::CyclicDependency {
            kind: "target",
            cycle,
        })?;

        Ok(Self {
            catalog,
            targets: by_name,
        })
    }

    /// Resolve the dependency set of `target`.
    ///
    /// Own declarations come first. Each `compile-only-exposed` declaration of
    /// a directly depended-on target is then added as `compile-only`, unless
    /// the same name is already resolved as `compile-only`.
    ///
    /// # Errors
    /// Returns `UnknownTarget` if `target` does not exist and
    /// `UnresolvedDependency` if any referenced name is missing from the catalog.
    pub fn expand(&self, target: &str) -> Result<ResolvedSet, EngineError> {
        let build_target = self
            .targets
            .get(target)
            .ok_or_else(|| EngineError::UnknownTarget {
                name: target.to_owned(),
                referenced_by: "resolver".to_owned(),
            })?;

        let mut resolved = ResolvedSet {
            target: target.to_owned(),
            dependencies: Vec::new(),
        };

        for decl in &build_target.declarations {
            let entry = self.lookup(target, &decl.name)?;
            if !resolved.contains(&decl.name, decl.scope) {
                resolved.dependencies.push(ResolvedDependency {
                    name: entry.name.clone(),
                    version: entry.version.clone(),
                    scope: decl.scope,
                    inherited_from: None,
                });
            }
        }

        for upstream_name in &build_target.depends_on {
            let Some(upstream) = self.targets.get(upstream_name) else {
                continue;
            };
            for decl in upstream.declarations.iter().filter(|d| d.scope.is_exposed()) {
                let entry = self.lookup(upstream_name, &decl.name)?;
                if !resolved.contains(&decl.name, Scope::CompileOnly) {
                    resolved.dependencies.push(ResolvedDependency {
                        name: entry.name.clone(),
                        version: entry.version.clone(),
                        scope: Scope::CompileOnly,
                        inherited_from: Some(upstream_name.clone()),
                    });
                }
            }
        }

        tracing::debug!(
            target_name = %target,
            count = resolved.dependencies.len(),
            "resolved dependencies"
        );
        Ok(resolved)
    }

    /// Resolve every target. Run before any task so that a missing catalog
    /// entry aborts the pipeline up front.
    ///
    /// # Errors
    /// Returns the first resolution error, in target-name order.
    pub fn expand_all(&self) -> Result<BTreeMap<String, ResolvedSet>, EngineError> {
        self.targets
            .keys()
            .map(|name| Ok((name.clone(), self.expand(name)?)))
            .collect()
    }

    fn lookup(
        &self,
        target: &str,
        name: &str,
    ) -> Result<&'c kiln_config::catalog::VersionEntry, EngineError> {
        self.catalog
            .resolve(name)
            .map_err(|source| EngineError::UnresolvedDependency {
                target: target.to_owned(),
                source,
            })
    }
}
