//! Centralized error types for emlnorm.
//!
//! Malformed input never produces an error: undecodable parts, broken nested
//! messages and missing headers all degrade to empty or absent fields. What
//! remains here is I/O around the CLI and serializer defects.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the emlnorm library.
#[derive(Error, Debug)]
pub enum NormalizeError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// A normalized record could not be turned into JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An invalid path was provided.
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Convenience alias for `Result<T, NormalizeError>`.
pub type Result<T> = std::result::Result<T, NormalizeError>;

impl NormalizeError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (prefer `NormalizeError::io`).
impl From<std::io::Error> for NormalizeError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
