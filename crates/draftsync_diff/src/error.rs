//! Error types for diffing.

use thiserror::Error;

/// Result type for diff operations.
pub type DiffResult<T> = Result<T, DiffError>;

/// Errors that can occur while building update actions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiffError {
    /// Two elements of one collection share a key.
    #[error("duplicate key '{key}' in {collection}")]
    DuplicateKey {
        /// Name of the collection holding the duplicates.
        collection: String,
        /// The duplicated key.
        key: String,
    },

    /// The requested change cannot be expressed with update actions.
    #[error("unsupported change of {field}: {reason}")]
    UnsupportedChange {
        /// The field that changed.
        field: String,
        /// Why the change is unsupported.
        reason: String,
    },
}

impl DiffError {
    /// Creates a duplicate key error.
    pub fn duplicate_key(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self::DuplicateKey {
            collection: collection.into(),
            key: key.into(),
        }
    }

    /// Creates an unsupported change error.
    pub fn unsupported_change(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedChange {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
