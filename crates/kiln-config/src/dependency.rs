//! Dependency declarations and their scopes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The visibility a dependency has within a build target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    /// Needed to compile, not packaged, not visible to dependents.
    CompileOnly,
    /// Like `CompileOnly`, and inherited as `CompileOnly` by direct dependents.
    CompileOnlyExposed,
    AnnotationProcessor,
    TestOnly,
    TestAnnotationProcessor,
}

impl Scope {
    /// Every scope, in declaration order.
    pub const ALL: [Scope; 5] = [
        Scope::CompileOnly,
        Scope::CompileOnlyExposed,
        Scope::AnnotationProcessor,
        Scope::TestOnly,
        Scope::TestAnnotationProcessor,
    ];

    /// The configuration key used in `kiln.toml`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CompileOnly => "compile-only",
            Self::CompileOnlyExposed => "compile-only-exposed",
            Self::AnnotationProcessor => "annotation-processor",
            Self::TestOnly => "test-only",
            Self::TestAnnotationProcessor => "test-annotation-processor",
        }
    }

    /// Whether dependents of the declaring target inherit this dependency.
    pub fn is_exposed(self) -> bool {
        self == Self::CompileOnlyExposed
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logical dependency name declared with a scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyDeclaration {
    pub name: String,
    pub scope: Scope,
}

impl DependencyDeclaration {
    pub fn new(name: &str, scope: Scope) -> Self {
        Self {
            name: name.to_owned(),
            scope,
        }
    }
}

/// The `[targets.<name>.dependencies]` table: one list of catalog names per scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DependencyTable {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compile_only: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compile_only_exposed: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotation_processor: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test_only: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test_annotation_processor: Vec<String>,
}

impl DependencyTable {
    fn names(&self, scope: Scope) -> &[String] {
        match scope {
            Scope::CompileOnly => &self.compile_only,
            Scope::CompileOnlyExposed => &self.compile_only_exposed,
            Scope::AnnotationProcessor => &self.annotation_processor,
            Scope::TestOnly => &self.test_only,
            Scope::TestAnnotationProcessor => &self.test_annotation_processor,
        }
    }

    /// Flatten the table into declarations, ordered by scope then by position.
    pub fn declarations(&self) -> Vec<DependencyDeclaration> {
        Scope::ALL
            .iter()
            .flat_map(|&scope| {
                self.names(scope)
                    .iter()
                    .map(move |name| DependencyDeclaration::new(name, scope))
            })
            .collect()
    }
}
