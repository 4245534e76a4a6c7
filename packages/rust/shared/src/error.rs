//! Error types for docsmith.
//!
//! Library crates use [`DocsmithError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Why an operation stopped before finishing on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Cancellation {
    /// The execution context was cancelled explicitly.
    #[error("operation cancelled")]
    Cancelled,
    /// The execution context's deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Top-level error type for all docsmith operations.
#[derive(Debug, thiserror::Error)]
pub enum DocsmithError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level network error.
    #[error("network error: {0}")]
    Network(String),

    /// A remote endpoint answered with an unexpected status.
    #[error("unexpected HTTP status {status} from {url}")]
    Http { status: u16, url: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad input, malformed request, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Document tree structure error (illegal merge target, etc.).
    #[error("structural error: {message}")]
    Structural { message: String },

    /// Manifest or tool-output parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Version-control history could not be read.
    #[error("git error: {0}")]
    Git(String),

    /// A dispatched task aborted without producing a result.
    #[error("task error: {0}")]
    Task(String),

    /// The execution context was cancelled or timed out.
    #[error(transparent)]
    Cancelled(#[from] Cancellation),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocsmithError>;

impl DocsmithError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a structural (tree) error from any displayable message.
    pub fn structural(msg: impl Into<String>) -> Self {
        Self::Structural {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a network error from any displayable message.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error stems from cancellation or deadline expiry.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}
