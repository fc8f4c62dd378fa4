//! Project scaffolding for `kiln init`.

use std::collections::BTreeMap;
use std::path::Path;

use kiln_config::dependency::DependencyTable;
use kiln_config::manifest::{
    ArchiveConfig, Manifest, Package, PackagingConfig, PomConfig, PublishingConfig, SigningConfig,
    TargetConfig, TaskConfig, MANIFEST_FILE,
};
use kiln_config::options::{OptionValue, DEV};
use kiln_targets::{Applicability, PublicationTarget};

use crate::error::EngineError;

fn command(parts: &[&str]) -> Option<Vec<String>> {
    Some(parts.iter().map(|p| (*p).to_owned()).collect())
}

fn names(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| (*p).to_owned()).collect()
}

fn archive(from: &[&str], include: &str, classifier: Option<&str>) -> Option<ArchiveConfig> {
    Some(ArchiveConfig {
        from: names(from),
        include: include.to_owned(),
        classifier: classifier.map(str::to_owned),
        base_name: None,
        version: None,
    })
}

fn starter_tasks() -> BTreeMap<String, TaskConfig> {
    let mut tasks = BTreeMap::new();
    tasks.insert(
        "spotlessApply".to_owned(),
        TaskConfig {
            only_if: Some("spotless.apply".to_owned()),
            command: command(&[
                "sh",
                "-c",
                "google-java-format --replace $(find src -name '*.java')",
            ]),
            description: Some("Format sources in place".to_owned()),
            ..TaskConfig::default()
        },
    );
    tasks.insert(
        "compileJava".to_owned(),
        TaskConfig {
            depends_on: names(&["spotlessApply"]),
            target: Some("main".to_owned()),
            command: command(&[
                "sh",
                "-c",
                "javac -d {out} $(find src/main/java -name '*.java')",
            ]),
            ..TaskConfig::default()
        },
    );
    tasks.insert(
        "javadoc".to_owned(),
        TaskConfig {
            depends_on: names(&["compileJava"]),
            target: Some("main".to_owned()),
            command: command(&[
                "sh",
                "-c",
                "javadoc -quiet -d {out} $(find src/main/java -name '*.java')",
            ]),
            ..TaskConfig::default()
        },
    );
    tasks.insert(
        "jar".to_owned(),
        TaskConfig {
            depends_on: names(&["compileJava"]),
            archive: archive(&["task:compileJava"], "**/*", None),
            ..TaskConfig::default()
        },
    );
    tasks.insert(
        "sourcesJar".to_owned(),
        TaskConfig {
            archive: archive(&["src/main/java"], "**/*.java", Some("sources")),
            ..TaskConfig::default()
        },
    );
    tasks.insert(
        "javadocJar".to_owned(),
        TaskConfig {
            depends_on: names(&["javadoc"]),
            archive: archive(&["task:javadoc"], "**/*", Some("javadoc")),
            ..TaskConfig::default()
        },
    );
    tasks.insert(
        "build".to_owned(),
        TaskConfig {
            depends_on: names(&["jar", "sourcesJar", "javadocJar"]),
            description: Some("Assemble all archives".to_owned()),
            ..TaskConfig::default()
        },
    );
    tasks
}

fn starter_manifest(name: &str) -> Manifest {
    let mut targets = BTreeMap::new();
    targets.insert(
        "main".to_owned(),
        TargetConfig {
            depends_on: Vec::new(),
            dependencies: DependencyTable {
                compile_only: names(&["lombok"]),
                annotation_processor: names(&["lombok"]),
                ..DependencyTable::default()
            },
        },
    );
    targets.insert(
        "test".to_owned(),
        TargetConfig {
            depends_on: names(&["main"]),
            dependencies: DependencyTable {
                test_only: names(&["junit"]),
                ..DependencyTable::default()
            },
        },
    );

    let mut options = BTreeMap::new();
    options.insert(DEV.to_owned(), OptionValue::Bool(false));
    options.insert("spotless.apply".to_owned(), OptionValue::Bool(false));

    let mut versions = BTreeMap::new();
    versions.insert("lombok".to_owned(), "1.18.24".to_owned());
    versions.insert("junit".to_owned(), "5.9.1".to_owned());

    Manifest {
        package: Package {
            group: "com.example".to_owned(),
            name: name.to_owned(),
            version: "0.1.0-SNAPSHOT".to_owned(),
            build_dir: "build".to_owned(),
        },
        options,
        versions,
        targets,
        tasks: starter_tasks(),
        packaging: Some(PackagingConfig {
            primary: "jar".to_owned(),
            sources: Some("sourcesJar".to_owned()),
            javadoc: Some("javadocJar".to_owned()),
        }),
        signing: SigningConfig::default(),
        publishing: PublishingConfig {
            repositories: vec![
                PublicationTarget {
                    name: "snapshots".to_owned(),
                    url: "https://s01.oss.sonatype.org/content/repositories/snapshots/".to_owned(),
                    credential: Some("SONATYPE".to_owned()),
                    applies_to: Applicability::Snapshot,
                    pattern: None,
                },
                PublicationTarget {
                    name: "releases".to_owned(),
                    url: "https://s01.oss.sonatype.org/service/local/staging/deploy/maven2/"
                        .to_owned(),
                    credential: Some("SONATYPE".to_owned()),
                    applies_to: Applicability::Release,
                    pattern: None,
                },
            ],
            pom: Some(PomConfig {
                name: Some(name.to_owned()),
                ..PomConfig::default()
            }),
        },
    }
}

/// Scaffold a new Kiln project.
///
/// Creates the project directory (if it doesn't exist), a `kiln.toml` wired
/// for compile, format, jars, signing and publishing, a Java source file and
/// a `.gitignore`.
///
/// # Errors
/// Returns an error if:
/// - A `kiln.toml` already exists in `dir`
/// - The directory or files cannot be created
/// - The manifest cannot be serialized
pub fn init_project(name: &str, dir: &Path) -> Result<(), EngineError> {
    let manifest_path = dir.join(MANIFEST_FILE);
    if manifest_path.exists() {
        return Err(EngineError::ProjectExists {
            path: manifest_path.display().to_string(),
        });
    }

    let src_dir = dir.join("src").join("main").join("java");
    kiln_util::fs::ensure_dir(&src_dir)?;

    let toml_content = starter_manifest(name).to_toml()?;
    write(&manifest_path, &toml_content)?;

    write(
        &src_dir.join("Library.java"),
        &format!(
            "/** Entry point of the {name} library. */\npublic final class Library {{\n  private Library() {{}}\n\n  public static String greet(final String who) {{\n    return \"Hello, \" + who + \"!\";\n  }}\n}}\n"
        ),
    )?;

    write(&dir.join(".gitignore"), "build/\n")?;
    Ok(())
}

fn write(path: &Path, content: &str) -> Result<(), EngineError> {
    std::fs::write(path, content).map_err(|source| EngineError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use super::*;
    use crate::pipeline::Pipeline;

    #[test]
    fn creates_project_structure() {
        let tmp = tempfile::tempdir().unwrap();
        let project_dir = tmp.path().join("api");

        init_project("api", &project_dir).unwrap();

        assert!(project_dir.join("kiln.toml").exists());
        assert!(project_dir.join("src/main/java/Library.java").exists());
        let gitignore = fs::read_to_string(project_dir.join(".gitignore")).unwrap();
        assert!(gitignore.contains("build/"));
    }

    #[test]
    fn manifest_parses_back() {
        let tmp = tempfile::tempdir().unwrap();
        let project_dir = tmp.path().join("api");

        init_project("api", &project_dir).unwrap();

        let manifest = Manifest::from_path(&project_dir.join("kiln.toml")).unwrap();
        assert_eq!(manifest.package.name, "api");
        assert_eq!(manifest.package.version, "0.1.0-SNAPSHOT");
        assert_eq!(manifest.publishing.repositories.len(), 2);
        assert!(manifest.tasks.contains_key("javadocJar"));
    }

    #[test]
    fn starter_project_passes_configuration_checks() {
        let tmp = tempfile::tempdir().unwrap();
        let project_dir = tmp.path().join("api");
        init_project("api", &project_dir).unwrap();

        let pipeline = Pipeline::load(&project_dir, &[] as &[&str]).unwrap();
        let order = pipeline.graph().execution_order();
        let pos = |name: &str| order.iter().position(|n| n == name).unwrap();
        assert!(pos("spotlessApply") < pos("compileJava"));
        assert!(pos("javadoc") < pos("javadocJar"));
        assert!(pipeline.graph().contains("generatePom"));
    }

    #[test]
    fn refuses_existing_project() {
        let tmp = tempfile::tempdir().unwrap();
        let project_dir = tmp.path().join("existing");
        fs::create_dir_all(&project_dir).unwrap();
        fs::write(project_dir.join("kiln.toml"), "").unwrap();

        let err = init_project("existing", &project_dir).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn creates_parent_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let project_dir = tmp.path().join("deep").join("nested").join("project");

        init_project("project", &project_dir).unwrap();

        assert!(project_dir.join("kiln.toml").exists());
    }
}
