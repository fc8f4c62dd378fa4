//! Parse and validate `kiln.toml`: options, the version catalog, build targets and tasks.

pub mod catalog;
pub mod dependency;
pub mod manifest;
pub mod options;

pub use catalog::{CatalogError, VersionCatalog, VersionEntry};
pub use dependency::{DependencyDeclaration, Scope};
pub use manifest::Manifest;
pub use options::Options;
