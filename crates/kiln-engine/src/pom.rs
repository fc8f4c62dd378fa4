//! Maven POM generation for the published library.

use std::fmt::Write as _;
use std::path::PathBuf;

use kiln_config::manifest::{Package, PomConfig};

use crate::action::{ActionFailure, ActionOutput, TaskAction, TaskContext};
use crate::artifact::Product;

/// Name of the built-in task that writes the POM.
pub const POM_TASK: &str = "generatePom";

/// Render the POM for `package` with the metadata in `config`.
pub fn render(package: &Package, config: &PomConfig) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(
        "<project xmlns=\"http://maven.apache.org/POM/4.0.0\" \
         xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
         xsi:schemaLocation=\"http://maven.apache.org/POM/4.0.0 \
         https://maven.apache.org/xsd/maven-4.0.0.xsd\">\n",
    );
    element(&mut xml, 1, "modelVersion", "4.0.0");
    element(&mut xml, 1, "groupId", &package.group);
    element(&mut xml, 1, "artifactId", &package.name);
    element(&mut xml, 1, "version", &package.version);
    element(&mut xml, 1, "packaging", "jar");
    optional(&mut xml, 1, "name", config.name.as_deref());
    optional(&mut xml, 1, "description", config.description.as_deref());
    optional(&mut xml, 1, "url", config.url.as_deref());

    if !config.licenses.is_empty() {
        xml.push_str("  <licenses>\n");
        for license in &config.licenses {
            xml.push_str("    <license>\n");
            element(&mut xml, 3, "name", &license.name);
            element(&mut xml, 3, "url", &license.url);
            xml.push_str("    </license>\n");
        }
        xml.push_str("  </licenses>\n");
    }

    if !config.developers.is_empty() {
        xml.push_str("  <developers>\n");
        for dev in &config.developers {
            xml.push_str("    <developer>\n");
            element(&mut xml, 3, "id", &dev.id);
            element(&mut xml, 3, "name", &dev.name);
            optional(&mut xml, 3, "email", dev.email.as_deref());
            xml.push_str("    </developer>\n");
        }
        xml.push_str("  </developers>\n");
    }

    if let Some(scm) = &config.scm {
        xml.push_str("  <scm>\n");
        element(&mut xml, 2, "connection", &scm.connection);
        element(&mut xml, 2, "developerConnection", &scm.developer_connection);
        element(&mut xml, 2, "url", &scm.url);
        xml.push_str("  </scm>\n");
    }

    xml.push_str("</project>\n");
    xml
}

fn element(xml: &mut String, depth: usize, tag: &str, text: &str) {
    let indent = "  ".repeat(depth);
    let _ = writeln!(xml, "{indent}<{tag}>{}</{tag}>", escape(text));
}

fn optional(xml: &mut String, depth: usize, tag: &str, text: Option<&str>) {
    if let Some(text) = text {
        element(xml, depth, tag, text);
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Writes `{name}-{version}.pom` into the task's output directory.
#[derive(Debug, Clone)]
pub struct PomAction {
    package: Package,
    config: PomConfig,
}

impl PomAction {
    pub fn new(package: Package, config: PomConfig) -> Self {
        Self { package, config }
    }
}

impl TaskAction for PomAction {
    fn execute(&self, ctx: &TaskContext) -> Result<ActionOutput, ActionFailure> {
        let mut product = Product {
            path: PathBuf::new(),
            base_name: self.package.name.clone(),
            version: self.package.version.clone(),
            classifier: None,
            extension: "pom".to_owned(),
        };
        product.path = ctx.output_dir.join(product.file_name());

        let xml = render(&self.package, &self.config);
        kiln_util::fs::write_atomic(&product.path, xml.as_bytes())
            .map_err(|e| ActionFailure::new(e.to_string()))?;
        Ok(ActionOutput::default().with_product(product))
    }

    fn describe(&self) -> String {
        format!("pom {}-{}.pom", self.package.name, self.package.version)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use kiln_config::manifest::{Developer, License, Scm};

    use super::*;
    use crate::action::context_for;

    fn package() -> Package {
        Package {
            group: "io.github.shiruka".to_owned(),
            name: "api".to_owned(),
            version: "1.0.0".to_owned(),
            build_dir: "build".to_owned(),
        }
    }

    fn config() -> PomConfig {
        PomConfig {
            name: Some("Api & Tools".to_owned()),
            description: Some("Server <api>".to_owned()),
            url: Some("https://github.com/shiruka/api".to_owned()),
            licenses: vec![License {
                name: "MIT License".to_owned(),
                url: "https://mit-license.org/license.txt".to_owned(),
            }],
            developers: vec![Developer {
                id: "portlek".to_owned(),
                name: "Hasan Demirtaş".to_owned(),
                email: Some("portlek@example.com".to_owned()),
            }],
            scm: Some(Scm {
                connection: "scm:git:git://github.com/shiruka/api.git".to_owned(),
                developer_connection: "scm:git:ssh://github.com/shiruka/api.git".to_owned(),
                url: "https://github.com/shiruka/api".to_owned(),
            }),
        }
    }

    fn child_text<'a>(node: roxmltree::Node<'a, 'a>, tag: &str) -> Option<&'a str> {
        node.children()
            .find(|n| n.has_tag_name(tag))
            .and_then(|n| n.text())
    }

    #[test]
    fn rendered_pom_is_well_formed() {
        let xml = render(&package(), &config());
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let root = doc.root_element();
        assert!(root.has_tag_name("project"));
        assert_eq!(child_text(root, "groupId"), Some("io.github.shiruka"));
        assert_eq!(child_text(root, "artifactId"), Some("api"));
        assert_eq!(child_text(root, "version"), Some("1.0.0"));
        assert_eq!(child_text(root, "name"), Some("Api & Tools"));
        assert_eq!(child_text(root, "description"), Some("Server <api>"));
    }

    #[test]
    fn licenses_developers_and_scm_rendered() {
        let xml = render(&package(), &config());
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let developer = doc
            .descendants()
            .find(|n| n.has_tag_name("developer"))
            .unwrap();
        assert_eq!(child_text(developer, "name"), Some("Hasan Demirtaş"));
        let scm = doc.descendants().find(|n| n.has_tag_name("scm")).unwrap();
        assert_eq!(
            child_text(scm, "developerConnection"),
            Some("scm:git:ssh://github.com/shiruka/api.git")
        );
        assert!(doc.descendants().any(|n| n.has_tag_name("license")));
    }

    #[test]
    fn empty_sections_omitted() {
        let xml = render(&package(), &PomConfig::default());
        assert!(!xml.contains("<licenses>"));
        assert!(!xml.contains("<scm>"));
        assert!(roxmltree::Document::parse(&xml).is_ok());
    }

    #[test]
    fn action_writes_pom_product() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context_for(POM_TASK, tmp.path(), &tmp.path().join("build"));
        let output = PomAction::new(package(), config()).execute(&ctx).unwrap();
        let product = output.product.unwrap();
        assert_eq!(product.file_name(), "api-1.0.0.pom");
        assert!(product.path.exists());
    }
}
