//! Centralized error types for patchinbox.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the patchinbox library.
#[derive(Error, Debug)]
pub enum InboxError {
    /// I/O error from the raw message source, with the path involved.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A header, body or diff could not be parsed.
    ///
    /// `id` is the Message-ID when it is known, otherwise empty.
    #[error("Parse error in message '{id}': {reason}")]
    Parse { id: String, reason: String },

    /// The identifier is not present in the index or the source.
    #[error("Message not found: {0}")]
    NotFound(String),

    /// Walking up the reply chain came back to a message already visited.
    #[error("Reply cycle detected at message '{0}'")]
    CycleDetected(String),

    /// The reply chain is deeper than the configured bound.
    #[error("Reply chain from '{id}' exceeds maximum depth {depth}")]
    MaxDepthExceeded { id: String, depth: usize },

    /// The deadline passed before the operation finished.
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// An invalid archive path was provided.
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Convenience alias for `Result<T, InboxError>`.
pub type Result<T> = std::result::Result<T, InboxError>;

impl InboxError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `Parse` variant for the given message.
    pub fn parse(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// `true` for errors that only concern one message and may be skipped
    /// during a full archive scan.
    pub fn is_per_message(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}

impl From<std::io::Error> for InboxError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
