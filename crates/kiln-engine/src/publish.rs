//! Publication of signed artifacts to the selected Maven repository.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use kiln_targets::PublicationTarget;
use kiln_util::upload::BasicAuth;

use crate::signing::SignedArtifact;

/// Uploads one signed artifact to one repository.
pub trait Publisher: Send + Sync {
    /// # Errors
    /// Returns a `PublishError` if any file of the artifact cannot be uploaded.
    fn publish(&self, artifact: &SignedArtifact, target: &PublicationTarget) -> Result<(), PublishError>;
}

/// Publishes into a Maven repository layout.
///
/// `file://` repositories are written on disk; `http(s)://` repositories get
/// one `PUT` per file. Every file is accompanied by a `.sha256` sidecar.
#[derive(Debug, Clone)]
pub struct RepositoryPublisher {
    group: String,
    dry_run: bool,
}

impl RepositoryPublisher {
    pub fn new(group: &str, dry_run: bool) -> Self {
        Self {
            group: group.to_owned(),
            dry_run,
        }
    }

    fn credentials(target: &PublicationTarget) -> Result<Option<BasicAuth>, PublishError> {
        let Some(prefix) = &target.credential else {
            return Ok(None);
        };
        let read = |suffix: &str| {
            let variable = format!("{prefix}_{suffix}");
            std::env::var(&variable).map_err(|_| PublishError::MissingCredentials {
                target: target.name.clone(),
                variable,
            })
        };
        Ok(Some(BasicAuth {
            username: read("USERNAME")?,
            password: read("PASSWORD")?,
        }))
    }

    /// `(local file, suffix)` for the artifact and its signature; the suffix
    /// is appended to the artifact's repository path or URL.
    fn files(artifact: &SignedArtifact) -> Vec<(PathBuf, &'static str)> {
        let mut files = vec![(artifact.artifact().path.clone(), "")];
        if let Some(signature) = artifact.signature() {
            files.push((signature.to_path_buf(), ".asc"));
        }
        files
    }
}

impl Publisher for RepositoryPublisher {
    fn publish(&self, artifact: &SignedArtifact, target: &PublicationTarget) -> Result<(), PublishError> {
        let coordinate = artifact.artifact().coordinate(&self.group);
        let files = Self::files(artifact);

        if self.dry_run {
            let repo_path = coordinate.repository_path();
            for (_, suffix) in &files {
                tracing::info!(target_name = %target.name, path = %format!("{repo_path}{suffix}"), "dry run: would publish");
            }
            return Ok(());
        }

        if let Some(root) = target.local_path() {
            let repo_path = coordinate.repository_path();
            for (src, suffix) in &files {
                let dest = root.join(format!("{repo_path}{suffix}"));
                kiln_util::fs::install_file(src, &dest)?;
                let checksum = kiln_util::hash::sha256_file(src)?;
                kiln_util::fs::write_atomic(&sidecar(&dest), checksum.as_bytes())?;
                tracing::debug!(path = %dest.display(), "published");
            }
            return Ok(());
        }

        if !(target.url.starts_with("https://") || target.url.starts_with("http://")) {
            return Err(PublishError::UnsupportedUrl {
                target: target.name.clone(),
                url: target.url.clone(),
            });
        }

        let auth = Self::credentials(target)?;
        let artifact_url = coordinate.to_url(&target.url);
        for (src, suffix) in &files {
            let body = std::fs::read(src).map_err(|source| PublishError::Read {
                path: src.display().to_string(),
                source,
            })?;
            let url = format!("{artifact_url}{suffix}");
            kiln_util::upload::put(&url, &body, auth.as_ref())?;
            let checksum = kiln_util::hash::sha256_bytes(&body);
            kiln_util::upload::put(&format!("{url}.sha256"), checksum.as_bytes(), auth.as_ref())?;
            tracing::debug!(%url, "published");
        }
        Ok(())
    }
}

fn sidecar(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".sha256");
    PathBuf::from(name)
}

/// Drives a [`Publisher`] so that each (artifact, target) pair is published
/// at most once, even if the same artifact is handed over again.
pub struct Publication<'p> {
    publisher: &'p dyn Publisher,
    published: BTreeSet<(String, PathBuf)>,
}

impl<'p> Publication<'p> {
    pub fn new(publisher: &'p dyn Publisher) -> Self {
        Self {
            publisher,
            published: BTreeSet::new(),
        }
    }

    /// Publish `artifacts` to `target`, returning the file names sent.
    ///
    /// # Errors
    /// Returns the first publisher error; artifacts after it are not attempted.
    pub fn publish_all(
        &mut self,
        artifacts: &[SignedArtifact],
        target: &PublicationTarget,
    ) -> Result<Vec<String>, PublishError> {
        let mut sent = Vec::new();
        for artifact in artifacts {
            let key = (target.name.clone(), artifact.artifact().path.clone());
            if !self.published.insert(key) {
                tracing::debug!(artifact = %artifact.artifact(), "already published");
                continue;
            }
            self.publisher.publish(artifact, target)?;
            tracing::info!(artifact = %artifact.artifact(), target_name = %target.name, "published");
            sent.push(artifact.artifact().file_name());
        }
        Ok(sent)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("publication target `{target}` needs credentials — set {variable}")]
    MissingCredentials { target: String, variable: String },

    #[error("publication target `{target}` has unsupported URL {url} — use https://, http:// or file://")]
    UnsupportedUrl { target: String, url: String },

    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("{0}")]
    Util(#[from] kiln_util::error::UtilError),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::Mutex;

    use kiln_targets::Applicability;

    use super::*;
    use crate::artifact::Artifact;
    use crate::signing::{Signer, SigningCredential, SigningError, SigningPolicy};

    struct FakeSigner;

    impl Signer for FakeSigner {
        fn sign(&self, file: &Path, _: &SigningCredential) -> Result<PathBuf, SigningError> {
            let mut sig = file.as_os_str().to_owned();
            sig.push(".asc");
            let sig = PathBuf::from(sig);
            std::fs::write(&sig, b"-----BEGIN PGP SIGNATURE-----").unwrap();
            Ok(sig)
        }
    }

    #[derive(Default)]
    struct CountingPublisher {
        calls: Mutex<Vec<String>>,
    }

    impl Publisher for CountingPublisher {
        fn publish(&self, artifact: &SignedArtifact, _: &PublicationTarget) -> Result<(), PublishError> {
            self.calls.lock().unwrap().push(artifact.artifact().file_name());
            Ok(())
        }
    }

    fn signed_jar(dir: &Path, policy: SigningPolicy) -> Vec<SignedArtifact> {
        let path = dir.join("api-1.0.jar");
        std::fs::write(&path, b"jar bytes").unwrap();
        let artifact = Artifact {
            base_name: "api".to_owned(),
            classifier: None,
            version: "1.0".to_owned(),
            extension: "jar".to_owned(),
            produced_by: "jar".to_owned(),
            path,
        };
        policy
            .apply(vec![artifact], Some(&SigningCredential::new("K")), &FakeSigner)
            .unwrap()
    }

    fn target(name: &str, url: &str, credential: Option<&str>) -> PublicationTarget {
        PublicationTarget {
            name: name.to_owned(),
            url: url.to_owned(),
            credential: credential.map(str::to_owned),
            applies_to: Applicability::Always,
            pattern: None,
        }
    }

    #[test]
    fn local_repository_gets_maven_layout_with_sidecars() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path().join("repo");
        let artifacts = signed_jar(tmp.path(), SigningPolicy::Required);
        let target = target("local", &format!("file://{}", repo.display()), None);

        RepositoryPublisher::new("io.github.shiruka", false)
            .publish(&artifacts[0], &target)
            .unwrap();

        let dir = repo.join("io/github/shiruka/api/1.0");
        assert!(dir.join("api-1.0.jar").exists());
        assert!(dir.join("api-1.0.jar.asc").exists());
        assert!(dir.join("api-1.0.jar.asc.sha256").exists());
        assert_eq!(
            std::fs::read_to_string(dir.join("api-1.0.jar.sha256")).unwrap(),
            kiln_util::hash::sha256_bytes(b"jar bytes")
        );
    }

    #[test]
    fn unsigned_artifacts_have_no_signature_file() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path().join("repo");
        let artifacts = signed_jar(tmp.path(), SigningPolicy::Optional);
        let target = target("local", &format!("file://{}", repo.display()), None);

        RepositoryPublisher::new("io.github.shiruka", false)
            .publish(&artifacts[0], &target)
            .unwrap();
        assert!(!repo.join("io/github/shiruka/api/1.0/api-1.0.jar.asc").exists());
    }

    #[test]
    fn dry_run_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path().join("repo");
        let artifacts = signed_jar(tmp.path(), SigningPolicy::Required);
        let target = target("local", &format!("file://{}", repo.display()), None);

        RepositoryPublisher::new("io.github.shiruka", true)
            .publish(&artifacts[0], &target)
            .unwrap();
        assert!(!repo.exists());
    }

    /// Answers `requests` HTTP requests with `201 Created` and returns their request lines.
    fn accepting_repository(requests: usize) -> (String, std::thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = std::thread::spawn(move || {
            let mut seen = Vec::new();
            for stream in listener.incoming().take(requests) {
                let mut reader = BufReader::new(stream.unwrap());
                let mut request_line = String::new();
                reader.read_line(&mut request_line).unwrap();
                let mut length = 0usize;
                loop {
                    let mut header = String::new();
                    reader.read_line(&mut header).unwrap();
                    if header.trim().is_empty() {
                        break;
                    }
                    if let Some((name, value)) = header.split_once(':') {
                        if name.eq_ignore_ascii_case("content-length") {
                            length = value.trim().parse().unwrap();
                        }
                    }
                }
                let mut body = vec![0u8; length];
                reader.read_exact(&mut body).unwrap();
                reader
                    .get_mut()
                    .write_all(b"HTTP/1.1 201 Created\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                    .unwrap();
                seen.push(request_line.trim().to_owned());
            }
            seen
        });
        (base, handle)
    }

    #[test]
    fn http_repository_receives_maven_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let artifacts = signed_jar(tmp.path(), SigningPolicy::Optional);
        let (base, server) = accepting_repository(2);
        let target = target("releases", &format!("{base}/releases/"), None);

        RepositoryPublisher::new("io.github.shiruka", false)
            .publish(&artifacts[0], &target)
            .unwrap();

        let requests = server.join().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(
            requests[0].starts_with("PUT /releases/io/github/shiruka/api/1.0/api-1.0.jar "),
            "{requests:?}"
        );
        assert!(
            requests[1].starts_with("PUT /releases/io/github/shiruka/api/1.0/api-1.0.jar.sha256 "),
            "{requests:?}"
        );
    }

    #[test]
    fn missing_credentials_named() {
        let tmp = tempfile::tempdir().unwrap();
        let artifacts = signed_jar(tmp.path(), SigningPolicy::Optional);
        let target = target(
            "sonatype",
            "https://s01.oss.sonatype.org/content/repositories/snapshots/",
            Some("KILN_TEST_UNSET_REPO"),
        );

        let err = RepositoryPublisher::new("io.github.shiruka", false)
            .publish(&artifacts[0], &target)
            .unwrap_err();
        assert!(matches!(
            err,
            PublishError::MissingCredentials { ref variable, .. } if variable == "KILN_TEST_UNSET_REPO_USERNAME"
        ));
    }

    #[test]
    fn unsupported_scheme_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let artifacts = signed_jar(tmp.path(), SigningPolicy::Optional);
        let target = target("ftp", "ftp://example.com/repo", None);
        assert!(matches!(
            RepositoryPublisher::new("g", false).publish(&artifacts[0], &target),
            Err(PublishError::UnsupportedUrl { .. })
        ));
    }

    #[test]
    fn each_pair_published_at_most_once() {
        let tmp = tempfile::tempdir().unwrap();
        let artifacts = signed_jar(tmp.path(), SigningPolicy::Optional);
        let publisher = CountingPublisher::default();
        let snapshots = target("snapshots", "https://example.com/snapshots", None);
        let local = target("local", "file:///tmp/unused", None);

        let mut publication = Publication::new(&publisher);
        let first = publication.publish_all(&artifacts, &snapshots).unwrap();
        let again = publication.publish_all(&artifacts, &snapshots).unwrap();
        publication.publish_all(&artifacts, &local).unwrap();

        assert_eq!(first, vec!["api-1.0.jar"]);
        assert!(again.is_empty());
        assert_eq!(publisher.calls.lock().unwrap().len(), 2);
    }
}
