//! Error types for index loading, dumping, and region reconstruction.
//!
//! Per-candidate alignment outcomes are not errors; see
//! [`crate::index::pac::WindowReject`] for the recoverable tier.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Fatal index load / corruption failures.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Neither `<prefix>.par.bwt` nor `<prefix>.dau.bwt` can be paired up
    #[error("fail to locate the index files for prefix {0}")]
    NotFound(PathBuf),

    /// I/O error during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A text or binary index file is malformed
    #[error("malformed {file}: {reason}")]
    Format { file: PathBuf, reason: String },

    /// Two index files disagree with each other
    #[error("inconsistent index: {0}")]
    Inconsistent(String),

    /// A flattened region does not describe a well-formed index
    #[error("corrupted index region: {0}")]
    Corrupt(String),

    /// Flattened region written by an incompatible layout version
    #[error("unsupported index region version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// An operation needs a component the load mask left out
    #[error("index component not loaded: {0}")]
    MissingComponent(&'static str),
}

impl IndexError {
    pub(crate) fn format(file: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        IndexError::Format {
            file: file.into(),
            reason: reason.into(),
        }
    }
}
