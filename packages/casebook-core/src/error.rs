//! Synchronization and store error types.

use thiserror::Error;

use crate::record::RecordId;

/// Failures reported by a remote document store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Transport failure; the same request may succeed later
    #[error("Network error: {0}")]
    Network(String),

    /// The store refused the request (validation, permissions)
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Target document does not exist
    #[error("Document '{0}' not found")]
    NotFound(RecordId),
}

impl StoreError {
    /// Returns whether retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Network(_))
    }
}

/// Record synchronization errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Record absent at read time
    #[error("Record '{id}' not found")]
    NotFound { id: RecordId },

    /// Field path is not part of the record schema
    #[error("Field '{field}' is not defined by schema '{schema}'")]
    InvalidField { schema: String, field: String },

    /// Field declared twice within one schema level
    #[error("Field '{field}' already exists in schema '{schema}'")]
    DuplicateField { schema: String, field: String },

    /// Value does not match the declared field kind
    #[error("Field '{field}' expects {expected}, got {got}")]
    FieldTypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    /// Operation on a discarded edit session
    #[error("Edit session is closed")]
    SessionClosed,

    /// A save for this record is already in flight
    #[error("A write for record '{id}' is already pending")]
    Conflict { id: RecordId },

    /// The store failed a save; the cache has been rolled back
    #[error("Write for record '{id}' failed: {cause}")]
    WriteFailed {
        id: RecordId,
        #[source]
        cause: StoreError,
    },

    /// Store failure outside of a save
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A save was attempted outside of a Tokio runtime
    #[error("No async runtime available: {0}")]
    NoRuntime(String),

    /// The background write task ended abnormally
    #[error("Write task failed: {0}")]
    TaskFailed(String),
}

impl SyncError {
    /// Returns the store failure behind this error, if any.
    pub fn store_cause(&self) -> Option<&StoreError> {
        match self {
            SyncError::WriteFailed { cause, .. } => Some(cause),
            SyncError::Store(cause) => Some(cause),
            _ => None,
        }
    }
}
