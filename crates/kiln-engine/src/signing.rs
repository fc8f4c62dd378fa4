//! The signing gate between packaging and publication.

use std::path::{Path, PathBuf};
use std::process::Command;

use kiln_config::options::{Options, OptionsError, DEV};

use crate::artifact::Artifact;

/// Environment variable holding the signing key id; wins over `[signing].key_id`.
pub const SIGNING_KEY_ENV: &str = "KILN_SIGNING_KEY_ID";

/// Whether artifacts must be signed before they may be published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningPolicy {
    Required,
    Optional,
}

impl SigningPolicy {
    /// Signing is required unless `dev` is set.
    pub fn from_dev_flag(dev: bool) -> Self {
        if dev {
            Self::Optional
        } else {
            Self::Required
        }
    }

    /// Read the `dev` option once.
    ///
    /// # Errors
    /// Returns an error if `dev` is not a boolean.
    pub fn from_options(options: &Options) -> Result<Self, OptionsError> {
        Ok(Self::from_dev_flag(options.flag(DEV, false)?))
    }

    pub fn is_required(self) -> bool {
        self == Self::Required
    }

    /// Pass `artifacts` through the gate.
    ///
    /// `Required` signs every artifact and fails if no credential is present;
    /// `Optional` signs nothing.
    ///
    /// # Errors
    /// Returns `CredentialMissing` before any signer call when signing is
    /// required without a credential, or the first signer failure.
    pub fn apply(
        self,
        artifacts: Vec<Artifact>,
        credential: Option<&SigningCredential>,
        signer: &dyn Signer,
    ) -> Result<Vec<SignedArtifact>, SigningError> {
        match self {
            Self::Optional => {
                tracing::debug!(count = artifacts.len(), "signing skipped");
                Ok(artifacts
                    .into_iter()
                    .map(|artifact| SignedArtifact {
                        artifact,
                        signature: None,
                    })
                    .collect())
            }
            Self::Required => {
                let credential = credential.ok_or(SigningError::CredentialMissing)?;
                artifacts
                    .into_iter()
                    .map(|artifact| {
                        let signature = signer.sign(&artifact.path, credential)?;
                        tracing::info!(artifact = %artifact, "signed");
                        Ok(SignedArtifact {
                            artifact,
                            signature: Some(signature),
                        })
                    })
                    .collect()
            }
        }
    }
}

/// Identifies the key used to sign artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningCredential {
    key_id: String,
}

impl SigningCredential {
    pub fn new(key_id: &str) -> Self {
        Self {
            key_id: key_id.to_owned(),
        }
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Take the key id from `KILN_SIGNING_KEY_ID`, falling back to `configured`.
    /// Blank values count as absent.
    pub fn from_env_or(configured: Option<&str>) -> Option<Self> {
        let from_env = std::env::var(SIGNING_KEY_ENV).ok();
        from_env
            .as_deref()
            .or(configured)
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(Self::new)
    }
}

/// An artifact that has passed the signing gate.
///
/// Only [`SigningPolicy::apply`] constructs this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedArtifact {
    artifact: Artifact,
    signature: Option<PathBuf>,
}

impl SignedArtifact {
    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    /// Detached `.asc` signature, when signing was required.
    pub fn signature(&self) -> Option<&Path> {
        self.signature.as_deref()
    }
}

/// Produces a detached signature for a file.
pub trait Signer: Send + Sync {
    /// Sign `file` and return the path of the signature.
    ///
    /// # Errors
    /// Returns `SignerFailed` when the signing tool fails.
    fn sign(&self, file: &Path, credential: &SigningCredential) -> Result<PathBuf, SigningError>;
}

/// Signs with GnuPG: an ASCII-armoured detached signature next to the file.
#[derive(Debug, Clone)]
pub struct GpgSigner {
    program: String,
}

impl GpgSigner {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_owned(),
        }
    }
}

impl Default for GpgSigner {
    fn default() -> Self {
        Self::new("gpg")
    }
}

impl Signer for GpgSigner {
    fn sign(&self, file: &Path, credential: &SigningCredential) -> Result<PathBuf, SigningError> {
        let mut signature = file.as_os_str().to_owned();
        signature.push(".asc");
        let signature = PathBuf::from(signature);

        let mut cmd = Command::new(&self.program);
        cmd.args(["--batch", "--yes", "--local-user", credential.key_id()])
            .args(["--armor", "--detach-sign", "--output"])
            .arg(&signature)
            .arg(file);

        let output = kiln_util::process::run_command(&mut cmd)?;
        if !output.success {
            return Err(SigningError::SignerFailed {
                path: file.display().to_string(),
                message: output.tail(10),
            });
        }
        Ok(signature)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("signing is required but no signing key is configured — set {SIGNING_KEY_ENV} or [signing].key_id, or pass -P dev=true")]
    CredentialMissing,

    #[error("cannot sign {path}: {message}")]
    SignerFailed { path: String, message: String },

    #[error("{0}")]
    Util(#[from] kiln_util::error::UtilError),
}
