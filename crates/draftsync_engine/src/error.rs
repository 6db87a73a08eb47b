//! Error types for the sync engine.

use draftsync_diff::DiffError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors reported by a remote collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The remote rejected the request content.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The submitted version no longer matches the stored one.
    #[error("concurrent modification: expected version {expected}, current version {current}")]
    ConcurrentModification {
        /// Version the request was based on.
        expected: u64,
        /// Version currently stored by the remote.
        current: u64,
    },

    /// The addressed resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other remote failure.
    #[error("remote error: {0}")]
    Other(String),
}

impl RemoteError {
    /// Creates a generic remote error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Returns true if this is an optimistic concurrency conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, RemoteError::ConcurrentModification { .. })
    }
}

/// Errors that can occur while syncing drafts.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The draft cannot enter the pipeline.
    #[error("invalid draft: {0}")]
    InvalidDraft(String),

    /// A remote call failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Update actions could not be built.
    #[error(transparent)]
    Diff(#[from] DiffError),

    /// A deferred record could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl SyncError {
    /// Returns the remote error behind this error, if any.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            SyncError::Remote(err) => Some(err),
            _ => None,
        }
    }
}
