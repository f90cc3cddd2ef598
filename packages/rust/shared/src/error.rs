//! Error types for AOI Relay.
//!
//! Library crates use [`RelayError`] via `thiserror`.
//! App crates (cli/tui) wrap this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all AOI Relay operations.
///
/// Per-file failures are caught at the file boundary and consumed by the
/// polling loop; none of these is fatal to the worker.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Malformed or incomplete input file. The file is abandoned and no
    /// report is produced; truncated input is the expected failure mode.
    #[error("extraction error: {message}")]
    Extraction { message: String },

    /// Store unreachable or the enrichment query failed. Recoverable: the
    /// record proceeds with empty enrichment fields.
    #[error("lookup error: {0}")]
    Lookup(String),

    /// The program name resolves to neither side; no report is produced.
    #[error("unknown side in program name '{program}'")]
    UnknownSide { program: String },

    /// The report could not be persisted.
    #[error("report write error at {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The input file could not be relocated to the backup directory.
    #[error("archive error for {path:?}: {source}")]
    Archive {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Per-file processing exceeded the configured bound.
    #[error("processing of '{file}' timed out after {seconds}s")]
    Timeout { file: String, seconds: u64 },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an extraction error from any displayable message.
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a report-write failure with the target path.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Wrap an archive-move failure with the offending path.
    pub fn archive(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Archive {
            path: path.into(),
            source,
        }
    }
}
