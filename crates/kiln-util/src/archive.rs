//! Jar (zip) archive writing.

use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::UtilError;

/// Path of the manifest every jar starts with.
pub const MANIFEST_ENTRY: &str = "META-INF/MANIFEST.MF";

/// One file to place in an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// File on disk.
    pub source: PathBuf,
    /// Entry name inside the archive, always `/`-separated.
    pub name: String,
}

impl ArchiveEntry {
    /// Build an entry for `relative` found under `root`.
    pub fn under(root: &Path, relative: &Path) -> Self {
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        Self {
            source: root.join(relative),
            name,
        }
    }
}

/// Write a jar at `dest` containing a generated manifest followed by `entries`
/// in the given order. The file is written to a temp path and renamed into place.
///
/// # Errors
/// Returns an error if a source file cannot be read, two entries share a name,
/// or the archive cannot be written.
pub fn write_jar(dest: &Path, entries: &[ArchiveEntry]) -> Result<(), UtilError> {
    if let Some(parent) = dest.parent() {
        crate::fs::ensure_dir(parent)?;
    }
    let tmp_path = dest.with_extension("jar.tmp");
    let result = write_zip(&tmp_path, entries);
    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }
    std::fs::rename(&tmp_path, dest).map_err(|source| UtilError::Io {
        path: dest.display().to_string(),
        source,
    })
}

fn write_zip(path: &Path, entries: &[ArchiveEntry]) -> Result<(), UtilError> {
    let archive_err = |message: String| UtilError::Archive {
        path: path.display().to_string(),
        message,
    };

    let file = std::fs::File::create(path).map_err(|source| UtilError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(MANIFEST_ENTRY, options)
        .map_err(|e| archive_err(e.to_string()))?;
    zip.write_all(b"Manifest-Version: 1.0\r\nCreated-By: kiln\r\n\r\n")
        .map_err(|e| archive_err(e.to_string()))?;

    for entry in entries {
        let data = std::fs::read(&entry.source).map_err(|source| UtilError::Io {
            path: entry.source.display().to_string(),
            source,
        })?;
        zip.start_file(entry.name.as_str(), options)
            .map_err(|e| archive_err(format!("entry `{}`: {e}", entry.name)))?;
        zip.write_all(&data)
            .map_err(|e| archive_err(format!("entry `{}`: {e}", entry.name)))?;
    }

    zip.finish().map_err(|e| archive_err(e.to_string()))?;
    Ok(())
}
