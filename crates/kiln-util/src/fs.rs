//! Filesystem helpers: build directories, repository installs and include globs.

use std::path::{Path, PathBuf};

use crate::error::UtilError;

/// Create a directory and all parent directories if they do not exist.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> Result<(), UtilError> {
    std::fs::create_dir_all(path).map_err(|source| UtilError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Copy `src` into `dest`, replacing any previous file.
///
/// The copy lands under a temp name first, so a repository never exposes a
/// truncated artifact.
///
/// # Errors
/// Returns an error if the parent directory, the copy or the rename fails.
pub fn install_file(src: &Path, dest: &Path) -> Result<(), UtilError> {
    if let Some(parent) = dest.parent() {
        ensure_dir(parent)?;
    }
    let tmp_path = temp_sibling(dest);
    std::fs::copy(src, &tmp_path).map_err(|source| UtilError::Io {
        path: src.display().to_string(),
        source,
    })?;
    rename_into_place(&tmp_path, dest)
}

/// Write `content` to `path` through a sibling temp file and a rename.
///
/// Readers never observe a partially written file.
///
/// # Errors
/// Returns an error if the parent directory, the temp file, or the rename fails.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), UtilError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let tmp_path = temp_sibling(path);
    std::fs::write(&tmp_path, content).map_err(|source| UtilError::Io {
        path: tmp_path.display().to_string(),
        source,
    })?;
    rename_into_place(&tmp_path, path)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    path.with_file_name(tmp_name)
}

fn rename_into_place(tmp_path: &Path, path: &Path) -> Result<(), UtilError> {
    std::fs::rename(tmp_path, path).map_err(|source| {
        let _ = std::fs::remove_file(tmp_path);
        UtilError::Io {
            path: path.display().to_string(),
            source,
        }
    })
}

/// Remove a directory and all its contents. No error if the directory is absent.
///
/// # Errors
/// Returns an error if the directory exists but cannot be removed.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<(), UtilError> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(UtilError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Collect the files under `dir` matching the glob `pattern`, as paths relative
/// to `dir`, sorted for determinism.
///
/// A missing `dir` yields an empty list.
///
/// # Errors
/// Returns an error if the glob pattern is invalid.
pub fn glob_relative(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, UtilError> {
    let full_pattern = dir.join(pattern);
    let full_pattern_str = full_pattern.display().to_string();

    let mut files: Vec<PathBuf> = glob::glob(&full_pattern_str)
        .map_err(|e| UtilError::GlobPattern {
            pattern: full_pattern_str.clone(),
            message: e.to_string(),
        })?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .filter_map(|p| p.strip_prefix(dir).ok().map(Path::to_path_buf))
        .collect();

    files.sort();
    Ok(files)
}
