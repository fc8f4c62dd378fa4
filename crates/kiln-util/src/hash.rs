//! SHA-256 digests for published files and their checksum sidecars.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::UtilError;

/// SHA-256 hex digest of `data`, as written into `.sha256` sidecars.
pub fn sha256_bytes(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// SHA-256 hex digest of a file, streamed so large jars are never held in memory.
///
/// # Errors
/// Returns an error if the file cannot be opened or read.
pub fn sha256_file(path: &Path) -> Result<String, UtilError> {
    let io_err = |source| UtilError::Io {
        path: path.display().to_string(),
        source,
    };
    let mut file = std::fs::File::open(path).map_err(io_err)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(io_err)?;
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn sha256_bytes_empty() {
        assert_eq!(
            sha256_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn sha256_bytes_different_input() {
        assert_ne!(sha256_bytes(b"api-1.0.jar"), sha256_bytes(b"api-1.1.jar"));
    }

    #[test]
    fn sha256_file_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("api-1.0.jar");
        fs::write(&file, b"PK\x03\x04").unwrap();

        assert_eq!(sha256_file(&file).unwrap(), sha256_bytes(b"PK\x03\x04"));
    }

    #[test]
    fn sha256_file_missing() {
        assert!(sha256_file(Path::new("/nonexistent/api.jar")).is_err());
    }
}
