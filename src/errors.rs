//! Bridge error types.
//!
//! Everything a backend adapter can fail with is described here. The
//! dispatch layer is the only consumer that turns these into native status
//! codes; adapter code returns them freely and never sees a raw code.
//! We use `thiserror` for ergonomic error definition and better messages.

use thiserror::Error;

use crate::types::{InvalidIdError, InvalidNameError};

/// the main error type for backend operations
#[derive(Debug, Error)]
pub enum BackendError {
    /// the requested key or reference does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// the target already exists and the operation was not forced
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// the stored value no longer matches the expected old value
    #[error("value changed since it was read: {0}")]
    Modified(String),

    /// the store is locked by another critical section
    #[error("store is locked")]
    Locked,

    /// the store is a frozen snapshot and cannot be mutated
    #[error("store is read-only")]
    ReadOnly,

    /// the backend declared no support for this operation
    #[error("operation not supported by this backend: {0}")]
    Unsupported(&'static str),

    /// invalid reference name
    #[error("invalid reference name: {0}")]
    InvalidName(#[from] InvalidNameError),

    /// invalid object identifier
    #[error("invalid object id: {0}")]
    InvalidId(#[from] InvalidIdError),

    /// invalid multivar match pattern
    #[error("invalid match pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// I/O error (filesystem level)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// anything else the adapter wants to surface verbatim
    #[error("{0}")]
    Message(String),
}

impl BackendError {
    /// check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }

    /// check if this error is a conflict with existing state
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            BackendError::AlreadyExists(_) | BackendError::Modified(_) | BackendError::Locked
        )
    }

    /// check if this error means the operation is not implemented
    pub fn is_unsupported(&self) -> bool {
        matches!(self, BackendError::Unsupported(_))
    }
}

/// result type alias for backend operations
pub type BackendResult<T> = Result<T, BackendError>;
