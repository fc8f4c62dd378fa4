//! Error types for kiln-util.

/// Errors produced by utility functions.
#[derive(Debug, thiserror::Error)]
pub enum UtilError {
    /// An I/O operation failed.
    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// A glob pattern was invalid.
    #[error("invalid glob pattern `{pattern}`: {message}")]
    GlobPattern { pattern: String, message: String },

    /// A command failed to execute.
    #[error("cannot execute `{program}`: {source}")]
    CommandExec {
        program: String,
        source: std::io::Error,
    },

    /// An archive could not be written.
    #[error("cannot write archive {path}: {message}")]
    Archive { path: String, message: String },

    /// An upload to a remote repository failed.
    #[error("upload to {url} failed: {message}")]
    Upload { url: String, message: String },

    /// A version string contains unsafe characters.
    #[error("invalid version \"{version}\": only alphanumeric characters, dots, hyphens, and underscores are allowed")]
    InvalidVersion { version: String },
}
